use anyhow::Result;
use clap::Args;
use colored::*;
use std::time::Instant;

#[derive(Args)]
pub struct ProbeArgs {
    /// Ask twice to show that the second answer comes from the cache
    #[arg(long)]
    pub twice: bool,
}

pub async fn handle_probe_command(args: ProbeArgs) -> Result<()> {
    let probe = docdb_auth::auth::platform_probe();
    println!("🔎 Probing {}", probe.endpoint().dimmed());

    let start = Instant::now();
    let on_platform = probe.is_running_on_platform().await;
    let elapsed = start.elapsed();

    if on_platform {
        println!("  {} Running on the cloud platform", "✓".bright_green());
    } else {
        println!("  {} Not running on the cloud platform", "✗".bright_red());
    }
    println!("  {} {:.0}ms", "Probe time:".dimmed(), elapsed.as_secs_f64() * 1000.0);

    if args.twice {
        let start = Instant::now();
        let cached = probe.is_running_on_platform().await;
        println!(
            "  {} {} in {:.2}ms",
            "Cached answer:".dimmed(),
            cached,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    Ok(())
}

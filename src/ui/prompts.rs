use crate::auth::CredentialPrompt;
use anyhow::{Context, Result};
use async_trait::async_trait;
use dialoguer::{Input, Password, Select};
use is_terminal::IsTerminal;

/// Prompts on the controlling terminal
///
/// dialoguer blocks on stdin, so every prompt runs on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }

    fn ensure_terminal() -> Result<()> {
        if !std::io::stdin().is_terminal() {
            anyhow::bail!("Interactive sign-in requires a terminal");
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialPrompt for TerminalPrompt {
    async fn prompt_username(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        Self::ensure_terminal()?;
        let prompt = prompt.to_string();
        let default = default.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let mut input = Input::<String>::new().with_prompt(prompt);
            if let Some(default) = default {
                input = input.default(default);
            }
            input.interact().context("Failed to read username")
        })
        .await
        .context("Username prompt was interrupted")?
    }

    async fn prompt_password(&self, prompt: &str) -> Result<String> {
        Self::ensure_terminal()?;
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || {
            Password::new()
                .with_prompt(prompt)
                .interact()
                .context("Failed to read password")
        })
        .await
        .context("Password prompt was interrupted")?
    }
}

/// Interactive confirmation prompt using arrow-key navigable selection
///
/// # Arguments
/// * `prompt` - The question to ask the user
/// * `default_yes` - Whether "Yes" should be the default selection (index 0)
///
/// # Returns
/// * `Ok(true)` if user selects "Yes"
/// * `Ok(false)` if user selects "No"
pub fn prompt_confirmation(prompt: &str, default_yes: bool) -> Result<bool> {
    let items = vec!["Yes", "No"];
    let default_index = if default_yes { 0 } else { 1 };

    let selection = Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(default_index)
        .interact()?;

    Ok(selection == 0)
}

pub fn prompt_retry_confirmation(target: &str) -> Result<bool> {
    prompt_confirmation(
        &format!("Connecting to '{}' failed. Enter credentials again?", target),
        true,
    )
}

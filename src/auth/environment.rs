//! Detection of whether this process runs inside the cloud platform
//!
//! The metadata service is only reachable from platform hosts, so a short
//! request against it answers the question. The answer never changes during
//! the lifetime of the process, which lets every caller share one probe.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Link-local metadata endpoint listing the supported API versions
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://169.254.169.254/metadata/versions";

/// Upper bound for the whole probe request
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

static PLATFORM_PROBE: OnceCell<Arc<PlatformProbe>> = OnceCell::new();

/// Get the process-wide probe, creating it with defaults on first use
pub fn platform_probe() -> Arc<PlatformProbe> {
    PLATFORM_PROBE
        .get_or_init(|| Arc::new(PlatformProbe::new(DEFAULT_METADATA_ENDPOINT, DEFAULT_PROBE_TIMEOUT)))
        .clone()
}

/// Check the process-wide probe
pub async fn is_running_on_platform() -> bool {
    platform_probe().is_running_on_platform().await
}

enum ProbeState {
    Unknown,
    Pending(Shared<BoxFuture<'static, bool>>),
    Resolved(bool),
}

/// Single-flight, memoized platform check
///
/// Concurrent callers that arrive while a probe is in flight await the same
/// request. Once resolved, the value is returned without I/O forever after.
pub struct PlatformProbe {
    endpoint: String,
    timeout: Duration,
    state: Mutex<ProbeState>,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    #[serde(rename = "apiVersions", default)]
    api_versions: Vec<String>,
}

impl PlatformProbe {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            state: Mutex::new(ProbeState::Unknown),
        }
    }

    /// A probe whose answer is already known; never performs I/O
    pub fn resolved(on_platform: bool) -> Self {
        Self {
            endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            timeout: DEFAULT_PROBE_TIMEOUT,
            state: Mutex::new(ProbeState::Resolved(on_platform)),
        }
    }

    /// Replace the process-wide probe before anything has used it.
    /// Returns the probe that ends up installed.
    pub fn install(probe: PlatformProbe) -> Arc<PlatformProbe> {
        let probe = Arc::new(probe);
        match PLATFORM_PROBE.set(probe.clone()) {
            Ok(()) => probe,
            Err(_) => {
                debug!("Platform probe already initialized, keeping existing instance");
                platform_probe()
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The cached answer, if the probe has completed
    pub fn cached(&self) -> Option<bool> {
        match &*self.lock_state() {
            ProbeState::Resolved(value) => Some(*value),
            _ => None,
        }
    }

    pub async fn is_running_on_platform(&self) -> bool {
        let pending = {
            let mut state = self.lock_state();
            match &*state {
                ProbeState::Resolved(value) => return *value,
                ProbeState::Pending(probe) => {
                    debug!("Platform probe already in flight, awaiting shared result");
                    probe.clone()
                }
                ProbeState::Unknown => {
                    let probe = run_probe(self.endpoint.clone(), self.timeout)
                        .boxed()
                        .shared();
                    *state = ProbeState::Pending(probe.clone());
                    probe
                }
            }
        };

        let on_platform = pending.await;

        let mut state = self.lock_state();
        if !matches!(*state, ProbeState::Resolved(_)) {
            *state = ProbeState::Resolved(on_platform);
        }
        on_platform
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ProbeState> {
        // State transitions are single assignments, a poisoned guard is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PlatformProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformProbe")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("cached", &self.cached())
            .finish()
    }
}

async fn run_probe(endpoint: String, timeout: Duration) -> bool {
    debug!("Probing platform metadata endpoint {}", endpoint);

    let on_platform = match fetch_versions(&endpoint, timeout).await {
        Ok(versions) if !versions.is_empty() => {
            debug!("Metadata endpoint reports {} API versions", versions.len());
            true
        }
        Ok(_) => {
            debug!("Metadata endpoint returned an empty version list");
            false
        }
        Err(e) => {
            // Reported at debug level only, the answer stays a plain boolean
            debug!("Platform probe failed: {:#}", e);
            false
        }
    };

    info!("Running on cloud platform: {}", on_platform);
    on_platform
}

async fn fetch_versions(endpoint: &str, timeout: Duration) -> anyhow::Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()?;

    let response = client
        .get(endpoint)
        .header("Metadata", "true")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("metadata endpoint returned {}", status);
    }

    let body: VersionsResponse = response.json().await?;
    Ok(body.api_versions)
}

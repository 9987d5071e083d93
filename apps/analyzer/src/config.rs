use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Url;

/// Remote analysis service used when `ANALYZER_ORIGIN` is not set.
pub const DEFAULT_ORIGIN: &str = "https://ai-resume-analyzer-htsu.onrender.com";

/// Interval between scheduled liveness probes.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Delay before the single retry scheduled after a non-2xx probe.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);
/// Hard timeout applied to every liveness probe attempt.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Client configuration. Only the origin and log level come from the environment;
/// timings are fixed at build time.
#[derive(Debug, Clone)]
pub struct Config {
    pub origin: String,
    pub rust_log: String,
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub probe_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let origin =
            std::env::var("ANALYZER_ORIGIN").unwrap_or_else(|_| DEFAULT_ORIGIN.to_string());

        Ok(Config {
            origin: normalize_origin(&origin)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            poll_interval: POLL_INTERVAL,
            retry_delay: RETRY_DELAY,
            probe_timeout: PROBE_TIMEOUT,
        })
    }

    /// Replaces the origin, e.g. from the `--origin` flag.
    pub fn with_origin(mut self, origin: &str) -> Result<Self> {
        self.origin = normalize_origin(origin)?;
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            origin: DEFAULT_ORIGIN.to_string(),
            rust_log: "info".to_string(),
            poll_interval: POLL_INTERVAL,
            retry_delay: RETRY_DELAY,
            probe_timeout: PROBE_TIMEOUT,
        }
    }
}

/// Validates an origin as an absolute http(s) URL and strips trailing slashes,
/// so endpoint paths can be appended with `format!("{origin}/...")`.
fn normalize_origin(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).with_context(|| format!("Invalid origin URL '{trimmed}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Origin '{trimmed}' must use http or https");
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

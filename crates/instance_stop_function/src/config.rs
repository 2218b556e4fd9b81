use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_COMPUTE_API_ENDPOINT: &str = "https://compute.googleapis.com";
pub const DEFAULT_STOP_DELAY_MS: u64 = 50;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{name} must be a non-negative integer, got '{value}'")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

/// Process-wide settings, read once at start-up and passed explicitly to the
/// compute client and the stopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfig {
    /// Not validated; an empty project surfaces as provider errors on first use.
    pub project: String,
    pub compute_endpoint: String,
    pub stop_delay: Duration,
    pub http_timeout: Duration,
    pub invocation_timeout: Option<Duration>,
    pub port: u16,
}

impl FunctionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let project = lookup("GCP_PROJECT").unwrap_or_default();
        let compute_endpoint = lookup("COMPUTE_API_ENDPOINT")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COMPUTE_API_ENDPOINT.to_string());

        let stop_delay_ms = parse_u64(&lookup, "STOP_DELAY_MS")?.unwrap_or(DEFAULT_STOP_DELAY_MS);
        let http_timeout_secs =
            parse_u64(&lookup, "HTTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        let invocation_timeout =
            parse_u64(&lookup, "INVOCATION_TIMEOUT_SECS")?.map(Duration::from_secs);
        let port = match parse_u64(&lookup, "PORT")? {
            Some(value) => u16::try_from(value).map_err(|_| ConfigError {
                name: "PORT",
                value: value.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            project,
            compute_endpoint: compute_endpoint.trim_end_matches('/').to_string(),
            stop_delay: Duration::from_millis(stop_delay_ms),
            http_timeout: Duration::from_secs(http_timeout_secs),
            invocation_timeout,
            port,
        })
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError { name, value: raw }),
    }
}

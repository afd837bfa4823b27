use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 60.0;

pub const API_BASE_ENV: &str = "ACTIONLENS_API_BASE";
pub const TIMEOUT_ENV: &str = "ACTIONLENS_REQUEST_TIMEOUT";

/// Where the prediction service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

impl ClientConfig {
    /// Resolves the configuration: explicit values first, then
    /// `ACTIONLENS_API_BASE` / `ACTIONLENS_REQUEST_TIMEOUT`, then defaults.
    pub fn resolve(endpoint: Option<&str>, timeout_seconds: Option<f64>) -> Result<Self> {
        let endpoint = endpoint
            .map(str::to_string)
            .or_else(|| non_empty_env(API_BASE_ENV))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let timeout_seconds = match timeout_seconds {
            Some(value) => value,
            None => match non_empty_env(TIMEOUT_ENV) {
                Some(raw) => raw
                    .parse::<f64>()
                    .with_context(|| format!("{TIMEOUT_ENV} must be a number of seconds"))?,
                None => DEFAULT_TIMEOUT_SECONDS,
            },
        };
        Self::new(&endpoint, timeout_seconds)
    }

    pub fn new(endpoint: &str, timeout_seconds: f64) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint)?;
        if !timeout_seconds.is_finite() || timeout_seconds <= 0.0 {
            bail!("request timeout must be a positive number of seconds, got {timeout_seconds}");
        }
        Ok(Self {
            endpoint,
            timeout: Duration::from_secs_f64(timeout_seconds),
        })
    }

    pub fn predict_url(&self) -> String {
        format!("{}/predict", self.endpoint)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.endpoint)
    }

    pub fn actions_url(&self) -> String {
        format!("{}/actions", self.endpoint)
    }
}

fn normalize_endpoint(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("prediction endpoint is empty");
    }
    let parsed = reqwest::Url::parse(trimmed)
        .with_context(|| format!("invalid prediction endpoint '{trimmed}'"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        bail!(
            "prediction endpoint must use http or https, got '{}'",
            parsed.scheme()
        );
    }
    Ok(trimmed.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

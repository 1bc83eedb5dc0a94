//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `STOREFRONT_API_URL` - Backend API base (default: `http://localhost:8000/api`)
//! - `STOREFRONT_CSRF_URL` - Cookie endpoint hit before registration
//!   (default: `http://localhost:8000/sanctum/csrf-cookie`)
//! - `STOREFRONT_SESSION_FILE` - Where the signed-in session is kept
//!   (default: `.storefront-session.json`)
//! - `STOREFRONT_HTTP_TIMEOUT_SECS` - Per-request timeout; unset means none

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_CSRF_URL: &str = "http://localhost:8000/sanctum/csrf-cookie";
pub const DEFAULT_SESSION_FILE: &str = ".storefront-session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontConfig {
    /// Base URL every API path is appended to
    pub api_url: Url,
    pub csrf_url: Url,
    pub session_file: PathBuf,
    pub http_timeout: Option<Duration>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let api_url = parse_url("STOREFRONT_API_URL", &var("STOREFRONT_API_URL", DEFAULT_API_URL))?;
        let csrf_url = parse_url("STOREFRONT_CSRF_URL", &var("STOREFRONT_CSRF_URL", DEFAULT_CSRF_URL))?;
        let session_file = PathBuf::from(var("STOREFRONT_SESSION_FILE", DEFAULT_SESSION_FILE));
        let http_timeout = lookup("STOREFRONT_HTTP_TIMEOUT_SECS")
            .map(|raw| {
                raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    ConfigError::InvalidEnvVar("STOREFRONT_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self { api_url, csrf_url, session_file, http_timeout })
    }

    /// Overrides the API base, as the `--api-url` flag does.
    pub fn with_api_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_url = parse_url("--api-url", raw)?;
        Ok(self)
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(key.to_string(), format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}

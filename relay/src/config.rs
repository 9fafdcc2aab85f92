use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const API_KEY_ENV: &str = "TAILSCALE_API_KEY";
pub const TAILNET_ENV: &str = "TAILSCALE_TAILNET";
pub const API_URL_ENV: &str = "TAILSCALE_API_URL";
pub const API_TIMEOUT_ENV: &str = "TAILSCALE_API_TIMEOUT_SECS";
pub const INBOUND_TOKEN_ENV: &str = "DISCOVERY_API_TOKEN";

/// `-` selects whichever tailnet the API key is scoped to.
pub const DEFAULT_TAILNET: &str = "-";
pub const DEFAULT_API_URL: &str = "https://api.tailscale.com";
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {reason}")]
    InvalidEnv { name: &'static str, reason: String },

    #[error("Port cannot be 0")]
    InvalidPort,
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 80,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        Ok(())
    }
}

/// Where and how to reach the Tailscale API.
#[derive(Clone, PartialEq)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub tailnet: String,
    pub api_url: Url,
    pub timeout: Duration,
}

// The API key stays out of logs.
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &"<redacted>")
            .field("tailnet", &self.tailnet)
            .field("api_url", &self.api_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct RelayConfig {
    pub upstream: UpstreamConfig,
    /// Bearer token inbound callers must present. `None` leaves the route open.
    pub api_token: Option<String>,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("upstream", &self.upstream)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_iter(std::env::vars())
    }

    /// Builds the relay configuration from `(name, value)` pairs. Empty values
    /// count as unset.
    pub fn from_env_iter<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let api_key = vars
            .get(API_KEY_ENV)
            .cloned()
            .ok_or(ConfigError::MissingEnv(API_KEY_ENV))?;

        let tailnet = vars
            .get(TAILNET_ENV)
            .cloned()
            .unwrap_or_else(|| DEFAULT_TAILNET.to_string());

        let raw_api_url = vars.get(API_URL_ENV).map_or(DEFAULT_API_URL, String::as_str);
        let api_url = Url::parse(raw_api_url).map_err(|e| ConfigError::InvalidEnv {
            name: API_URL_ENV,
            reason: e.to_string(),
        })?;

        let timeout = match vars.get(API_TIMEOUT_ENV) {
            Some(raw) => parse_timeout(raw)?,
            None => DEFAULT_API_TIMEOUT,
        };

        Ok(RelayConfig {
            upstream: UpstreamConfig {
                api_key,
                tailnet,
                api_url,
                timeout,
            },
            api_token: vars.get(INBOUND_TOKEN_ENV).cloned(),
        })
    }
}

/// A zero timeout would expire every upstream request on its first poll.
fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    let secs = raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnv {
        name: API_TIMEOUT_ENV,
        reason: e.to_string(),
    })?;

    if secs == 0 {
        return Err(ConfigError::InvalidEnv {
            name: API_TIMEOUT_ENV,
            reason: "timeout must be at least one second".into(),
        });
    }

    Ok(Duration::from_secs(secs))
}

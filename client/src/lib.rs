//! Client for the device listing served by the Tailscale discovery relay.

use serde::Deserialize;

/// Base URL of the production relay.
pub const FUNCTION61: &str = "https://function61";
pub const LOCALHOST: &str = "http://localhost";

const DEVICES_PATH: &str = "/tailscale-discovery/api/devices";

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A device known to the relay. Fields the relay adds later are ignored.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub ip_v4: String,
    pub hostname: String,
}

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
}

impl Client {
    pub fn new(api_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Client {
            client: reqwest::Client::new(),
            api_token: api_token.into(),
            base_url: base_url.into(),
        }
    }

    /// Fetches every device, sorted by hostname.
    pub async fn devices(&self) -> Result<Vec<Device>, ClientError> {
        let devices = self
            .client
            .get(self.devices_url())
            .bearer_auth(&self.api_token)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Device>>()
            .await?;

        Ok(devices)
    }

    fn devices_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), DEVICES_PATH)
    }
}

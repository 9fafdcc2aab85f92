use crate::config::UpstreamConfig;
use crate::devices::{ApiDevice, ApiDevicesResponse};
use url::Url;

/// Every failure talking to Tailscale carries the same prefix, so callers
/// can tell which dependency broke.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("Tailscale API: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Tailscale API: cannot build device URL from {0}")]
    InvalidBaseUrl(String),
}

/// Client for the Tailscale device listing of one tailnet.
#[derive(Clone)]
pub struct TailscaleApi {
    client: reqwest::Client,
    devices_url: Url,
    api_key: String,
}

impl TailscaleApi {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(TailscaleApi {
            client,
            devices_url: devices_url(&config.api_url, &config.tailnet)?,
            api_key: config.api_key.clone(),
        })
    }

    pub fn devices_url(&self) -> &Url {
        &self.devices_url
    }

    pub async fn fetch_devices(&self) -> Result<Vec<ApiDevice>, UpstreamError> {
        let response = self
            .client
            .get(self.devices_url.clone())
            // The API key is the username, the password stays empty.
            .basic_auth(&self.api_key, None::<&str>)
            .send()
            .await?
            .error_for_status()?;

        let body = response.json::<ApiDevicesResponse>().await?;
        tracing::debug!(count = body.devices.len(), "fetched devices from Tailscale");

        Ok(body.devices)
    }
}

fn devices_url(base: &Url, tailnet: &str) -> Result<Url, UpstreamError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| UpstreamError::InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(["api", "v2", "tailnet", tailnet, "devices"]);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(api_url: &str, tailnet: &str) -> UpstreamConfig {
        UpstreamConfig {
            api_key: "tskey-abc".into(),
            tailnet: tailnet.into(),
            api_url: Url::parse(api_url).unwrap(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn builds_device_url() {
        let api = TailscaleApi::new(&config("https://api.tailscale.com", "-")).unwrap();
        assert_eq!(
            api.devices_url().as_str(),
            "https://api.tailscale.com/api/v2/tailnet/-/devices"
        );

        let api = TailscaleApi::new(&config("http://proxy.internal/ts/", "example.com")).unwrap();
        assert_eq!(
            api.devices_url().as_str(),
            "http://proxy.internal/ts/api/v2/tailnet/example.com/devices"
        );
    }

    #[test]
    fn rejects_cannot_be_a_base_url() {
        let err = TailscaleApi::new(&config("mailto:ops@example.com", "-"))
            .err()
            .unwrap();
        assert!(matches!(err, UpstreamError::InvalidBaseUrl(_)));
        assert!(err.to_string().starts_with("Tailscale API:"));
    }

    #[tokio::test]
    async fn fetches_with_basic_auth() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/api/v2/tailnet/-/devices")
            .match_header("authorization", "Basic dHNrZXktYWJjOg==")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"devices":[{"addresses":["100.64.0.1"],"hostname":"a","user":"x"}]}"#)
            .create_async()
            .await;

        let api = TailscaleApi::new(&config(&server.url(), "-")).unwrap();
        let devices = api.fetch_devices().await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            devices,
            vec![ApiDevice {
                addresses: vec!["100.64.0.1".into()],
                hostname: "a".into(),
                tags: None,
            }]
        );
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/api/v2/tailnet/-/devices")
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let api = TailscaleApi::new(&config(&server.url(), "-")).unwrap();
        let err = api.fetch_devices().await.unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Tailscale API: "), "{message}");
        assert!(message.contains("403"), "{message}");
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", "/api/v2/tailnet/-/devices")
            .with_status(200)
            .with_body(r#"{"devices": "nope"}"#)
            .create_async()
            .await;

        let api = TailscaleApi::new(&config(&server.url(), "-")).unwrap();
        let err = api.fetch_devices().await.unwrap_err();

        assert!(err.to_string().starts_with("Tailscale API: "));
    }
}

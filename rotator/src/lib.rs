//! Pushes a new Tailscale API key into the environment of the deployed relay.
//!
//! The running relay only reads its configuration at startup, so the new key
//! takes effect on its next cold start.

mod aws_lambda;

pub use aws_lambda::{AwsLambdaTarget, merge_environment};

use async_trait::async_trait;
use std::collections::HashMap;

pub const NEW_API_KEY_ENV: &str = "NEW_TAILSCALE_API_KEY";
pub const API_KEY_VARIABLE: &str = "TAILSCALE_API_KEY";
pub const DEFAULT_FUNCTION_NAME: &str = "WebTailscaleDiscovery";
pub const DEFAULT_REGION: &str = "eu-central-1";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RotateError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("could not update function {function}: {reason}")]
    Deployment { function: String, reason: String },
}

/// A deployed function, addressed by name and region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionRef {
    pub name: String,
    pub region: String,
}

impl Default for FunctionRef {
    fn default() -> Self {
        FunctionRef {
            name: DEFAULT_FUNCTION_NAME.into(),
            region: DEFAULT_REGION.into(),
        }
    }
}

impl std::fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.region)
    }
}

/// Somewhere the relay is deployed and whose environment can be rewritten.
#[async_trait]
pub trait DeploymentTarget: Send + Sync {
    async fn rotate_credential(
        &self,
        function: &FunctionRef,
        variable: &str,
        value: &str,
    ) -> Result<(), RotateError>;
}

pub struct RotationConfig {
    pub new_api_key: String,
}

impl std::fmt::Debug for RotationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationConfig")
            .field("new_api_key", &"<redacted>")
            .finish()
    }
}

impl RotationConfig {
    pub fn from_env() -> Result<Self, RotateError> {
        Self::from_env_iter(std::env::vars())
    }

    pub fn from_env_iter<I, K, V>(vars: I) -> Result<Self, RotateError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        match vars.get(NEW_API_KEY_ENV) {
            Some(key) if !key.is_empty() => Ok(RotationConfig {
                new_api_key: key.clone(),
            }),
            _ => Err(RotateError::MissingEnv(NEW_API_KEY_ENV)),
        }
    }
}

/// Replaces the relay's API key on `function`.
pub async fn renew_api_key<T>(
    target: &T,
    function: &FunctionRef,
    config: &RotationConfig,
) -> Result<(), RotateError>
where
    T: DeploymentTarget + ?Sized,
{
    tracing::info!(%function, "updating {API_KEY_VARIABLE}");
    target
        .rotate_credential(function, API_KEY_VARIABLE, &config.new_api_key)
        .await?;
    tracing::info!(%function, "{API_KEY_VARIABLE} updated, effective on next cold start");
    Ok(())
}

use relay::config::{ConfigError as RelayConfigError, Listener, RelayConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Set by the Lambda runtime in every function's environment.
const LAMBDA_FUNCTION_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

/// Operational settings from the optional YAML file.
#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct CommonConfig {
    #[serde(default)]
    pub listener: Listener,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl CommonConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(CommonConfig::default()),
        }
    }
}

/// Everything the `serve` command needs, read once at startup.
#[derive(Debug)]
pub struct Config {
    pub common: CommonConfig,
    pub relay: RelayConfig,
    pub in_lambda: bool,
}

impl Config {
    pub fn load<I>(path: Option<&Path>, env: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let common = CommonConfig::load(path)?;
        let env: HashMap<String, String> = env.into_iter().collect();
        let in_lambda = env
            .get(LAMBDA_FUNCTION_ENV)
            .is_some_and(|name| !name.is_empty());
        let relay = RelayConfig::from_env_iter(env)?;

        Ok(Config {
            common,
            relay,
            in_lambda,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("{0}")]
    Env(#[from] RelayConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn full_config_file() {
        let yaml = r#"
            listener:
                host: 127.0.0.1
                port: 8080
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example.com/1
            "#;
        let tmp = write_tmp_file(yaml);

        let config =
            Config::load(Some(tmp.path()), env(&[("TAILSCALE_API_KEY", "tskey-abc")])).unwrap();

        assert_eq!(
            config.common.listener,
            Listener {
                host: "127.0.0.1".into(),
                port: 8080
            }
        );
        assert_eq!(
            config.common.metrics,
            Some(MetricsConfig {
                statsd_host: "127.0.0.1".into(),
                statsd_port: 8125
            })
        );
        assert_eq!(
            config.common.logging.unwrap().sentry_dsn,
            "https://key@sentry.example.com/1"
        );
        assert_eq!(config.relay.upstream.api_key, "tskey-abc");
        assert!(!config.in_lambda);
    }

    #[test]
    fn defaults_without_file() {
        let config = Config::load(None, env(&[("TAILSCALE_API_KEY", "tskey-abc")])).unwrap();

        assert_eq!(config.common, CommonConfig::default());
        assert_eq!(config.common.listener.port, 80);
        assert_eq!(config.relay.upstream.tailnet, "-");
    }

    #[test]
    fn empty_sections_use_defaults() {
        let tmp = write_tmp_file("metrics: null\n");
        let common = CommonConfig::from_file(tmp.path()).unwrap();
        assert_eq!(common, CommonConfig::default());
    }

    #[test]
    fn missing_api_key_fails() {
        let err = Config::load(None, env(&[("TAILSCALE_TAILNET", "example.com")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Env(RelayConfigError::MissingEnv("TAILSCALE_API_KEY"))
        ));
    }

    #[test]
    fn detects_lambda() {
        let config = Config::load(
            None,
            env(&[
                ("TAILSCALE_API_KEY", "tskey-abc"),
                ("AWS_LAMBDA_FUNCTION_NAME", "WebTailscaleDiscovery"),
            ]),
        )
        .unwrap();
        assert!(config.in_lambda);
    }

    #[test]
    fn unreadable_or_invalid_file() {
        let err = CommonConfig::from_file(Path::new("/nonexistent/discovery.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));

        let tmp = write_tmp_file("listener: [1, 2]");
        let err = CommonConfig::from_file(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}

use clap::{Args, Parser, Subcommand};
use config::{CommonConfig, Config, ConfigError};
use relay::RelayError;
use rotator::{AwsLambdaTarget, FunctionRef, RotateError, RotationConfig};
use statsd::MetricsError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod config;
mod logging;
mod statsd;

#[derive(Parser)]
#[command(version, about = "Tailscale discovery")]
struct Cli {
    /// YAML file with listener, metrics and logging settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the device listing (the default)
    Serve,
    /// Updates to Lambda the new API key from NEW_TAILSCALE_API_KEY
    RenewApikey(RenewApikeyArgs),
}

#[derive(Args)]
struct RenewApikeyArgs {
    #[arg(long, default_value = rotator::DEFAULT_FUNCTION_NAME)]
    function_name: String,
    #[arg(long, default_value = rotator::DEFAULT_REGION)]
    region: String,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Relay(#[from] RelayError),
    #[error("{0}")]
    Rotate(#[from] RotateError),
    #[error("{0}")]
    Metrics(#[from] MetricsError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command.unwrap_or(CliCommand::Serve) {
        CliCommand::Serve => serve(config_path),
        CliCommand::RenewApikey(args) => renew_apikey(config_path, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exiting");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn serve(config_path: Option<&Path>) -> Result<(), CliError> {
    // Configuration errors surface before any listener is bound.
    let config = Config::load(config_path, std::env::vars())?;

    let _sentry = logging::init(config.common.logging.as_ref());
    if let Some(metrics) = &config.common.metrics {
        statsd::init(metrics)?;
    }

    tracing::info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    runtime()?.block_on(async {
        if config.in_lambda {
            relay::run_lambda(&config.relay).await
        } else {
            relay::run(
                &config.common.listener,
                &config.relay,
                shared::http::shutdown_signal(),
            )
            .await
        }
    })?;

    Ok(())
}

fn renew_apikey(config_path: Option<&Path>, args: RenewApikeyArgs) -> Result<(), CliError> {
    let common = CommonConfig::load(config_path)?;
    let rotation = RotationConfig::from_env()?;

    let _sentry = logging::init(common.logging.as_ref());

    let function = FunctionRef {
        name: args.function_name,
        region: args.region,
    };

    runtime()?.block_on(rotator::renew_api_key(&AwsLambdaTarget, &function, &rotation))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["tailscale-discovery"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());

        let cli =
            Cli::try_parse_from(["tailscale-discovery", "serve", "--config", "discovery.yaml"])
                .unwrap();
        assert!(matches!(cli.command, Some(CliCommand::Serve)));
        assert_eq!(cli.config, Some(PathBuf::from("discovery.yaml")));
    }

    #[test]
    fn renew_apikey_defaults_to_production_function() {
        let cli = Cli::try_parse_from(["tailscale-discovery", "renew-apikey"]).unwrap();
        let Some(CliCommand::RenewApikey(args)) = cli.command else {
            panic!("expected renew-apikey");
        };
        assert_eq!(args.function_name, "WebTailscaleDiscovery");
        assert_eq!(args.region, "eu-central-1");

        let cli = Cli::try_parse_from([
            "tailscale-discovery",
            "renew-apikey",
            "--function-name",
            "Staging",
            "--region",
            "us-east-1",
        ])
        .unwrap();
        let Some(CliCommand::RenewApikey(args)) = cli.command else {
            panic!("expected renew-apikey");
        };
        assert_eq!(args.function_name, "Staging");
        assert_eq!(args.region, "us-east-1");
    }

    #[test]
    fn positional_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["tailscale-discovery", "extra"]).is_err());
    }
}

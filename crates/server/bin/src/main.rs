//! Beacon realtime gateway server
//!
//! Main entry point: parses the command line, loads configuration, sets up
//! logging and hands over to the startup sequence.

mod startup;

use clap::Parser;
use std::path::PathBuf;

use beacon_shared::config::ConfigLoader;
use startup::{StartupOptions, run};

/// CLI arguments for beacon-server
#[derive(clap::Parser, Debug)]
#[command(name = "beacon-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Beacon realtime gateway", long_about = None)]
struct Args {
    /// Optional .env file loaded before reading the environment
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Create the realtime tables if they do not exist
    #[arg(long)]
    bootstrap_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::new(args.env_file.clone()).load_server_config()?;

    setup_logging(&config.logging.level, args.debug)?;

    run(
        config,
        StartupOptions {
            bootstrap_schema: args.bootstrap_schema,
        },
    )
    .await
}

/// Setup logging. `RUST_LOG` wins over the configured level; `--debug`
/// overrides the configured level.
fn setup_logging(level: &str, debug: bool) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let level = if debug { "debug" } else { level };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_flags() {
        let args = Args::parse_from([
            "beacon-server",
            "--env-file",
            "/etc/beacon/.env",
            "--debug",
            "--bootstrap-schema",
        ]);
        assert_eq!(args.env_file, Some(PathBuf::from("/etc/beacon/.env")));
        assert!(args.debug);
        assert!(args.bootstrap_schema);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["beacon-server"]);
        assert!(args.env_file.is_none());
        assert!(!args.debug);
        assert!(!args.bootstrap_schema);
    }
}

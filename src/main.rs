//! netverify - Acceptance tests for Arista AVD fabrics
//!
//! This is the main entry point for the netverify CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use netverify::config::{Config, LogFormat, LoggingConfig};
use netverify::error::EXIT_CONFIG;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; a broken config file aborts before any device is contacted
    let mut config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: Failed to load config: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &config.logging);
    tracing::debug!(version = VERSION, "netverify starting");

    // Command-line flags win over files and environment
    cli.apply_to(&mut config);

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let exit_code = match cli.command() {
        Commands::Run(args) => args.execute(&mut ctx).await?,
        Commands::Collect(args) => args.execute(&mut ctx).await?,
        Commands::Hosts(args) => args.execute(&mut ctx).await?,
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level.
///
/// `-v` raises the configured level to info, debug and trace; `RUST_LOG`
/// overrides both.
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    match logging.format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity >= 3),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

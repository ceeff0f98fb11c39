use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tollgate::config::{DeploymentConfig, LoggingConfig};
use tracing_subscriber::EnvFilter;

pub mod check_config;
pub mod init_config;
pub mod simulate;
pub mod version;

#[derive(Parser)]
#[command(name = "tollgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for Tollgate account gating", long_about = None)]
pub struct Cli {
    /// Log level override (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a commented default configuration
    InitConfig {
        /// Output path (default: ~/.config/tollgate/config.toml)
        #[arg(long)]
        path: Option<String>,

        /// Owner address for the governor and freeze track
        #[arg(long)]
        owner: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Parse and validate a configuration file
    CheckConfig {
        /// Path to config file (default: ~/.config/tollgate/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Replay a JSON scenario against an in-memory deployment
    Simulate {
        /// Scenario file
        #[arg(long)]
        scenario: String,

        /// Path to config file (default: ~/.config/tollgate/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },

    /// Display version information
    Version,
}

impl Cli {
    /// Logging settings: the deployment's `[logging]` section when the
    /// command reads a config, with `--log-level` on top.
    pub fn logging(&self) -> LoggingConfig {
        let config_path = match &self.command {
            Commands::CheckConfig { config } | Commands::Simulate { config, .. } => {
                Some(config_path(config.as_deref()))
            }
            _ => None,
        };
        let mut logging = config_path
            .and_then(|path| DeploymentConfig::load(&path).ok())
            .map(|config| config.logging)
            .unwrap_or_default();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        logging
    }
}

pub fn config_path(config: Option<&str>) -> PathBuf {
    config
        .map(PathBuf::from)
        .unwrap_or_else(tollgate::config::default_config_path)
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init_logging(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| -> Box<dyn std::error::Error> { e })
}

pub fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::InitConfig { path, owner, force } => init_config::execute(path, owner, force),
        Commands::CheckConfig { config } => check_config::execute(config),
        Commands::Simulate {
            scenario,
            config,
            pretty,
        } => simulate::execute(scenario, config, pretty),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

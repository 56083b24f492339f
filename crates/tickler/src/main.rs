//! Tickler: in-memory job scheduler over HTTP
//!
//! Main binary with subcommands:
//! - `serve`: Run the REST API and the scheduler
//! - `config`: Print the resolved configuration

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use miette::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Overrides};

mod config;
mod server;

#[derive(Parser)]
#[command(name = "tickler")]
#[command(about = "In-memory job scheduler served over HTTP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API and the scheduler
    Serve {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the resolved configuration as TOML
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Extra config file, applied after the default locations
    #[arg(long, env = "TICKLER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "REST_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "REST_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Append logs to this file as well as stdout (empty to disable)
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Simulated work time per job in milliseconds
    #[arg(long, env = "TICKLER_WORK_DURATION_MS")]
    work_duration_ms: Option<u64>,
}

impl ConfigArgs {
    fn resolve(self) -> Result<Config> {
        let overrides = Overrides {
            host: self.host,
            port: self.port,
            log_level: self.log_level,
            log_file: self.log_file,
            work_duration_ms: self.work_duration_ms,
        };
        Config::load(self.config.as_deref(), overrides).map_err(|e| miette::miette!("{}", e))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = config.resolve()?;
            // Keep the guard alive so buffered file logs are flushed on exit
            let _log_guard = init_tracing(&config);
            server::run(config).await
        }

        Commands::Config { config } => {
            let config = config.resolve()?;
            let rendered = config.to_toml().map_err(|e| miette::miette!("{}", e))?;
            print!("{rendered}");
            Ok(())
        }
    }
}

/// Initialize tracing with stdout output and, if configured, a log file.
///
/// `RUST_LOG` takes precedence over the configured level. A log file that
/// cannot be opened is reported and skipped.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let level = config.log_level.to_lowercase().parse::<LevelFilter>();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(level.as_ref().copied().unwrap_or(LevelFilter::INFO).to_string())
    });

    let mut file_error = None;
    let (file_layer, guard) = match config.log_file() {
        Some(path) => match log_file_appender(path) {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (
                    Some(fmt::layer().with_writer(writer).with_ansi(false)),
                    Some(guard),
                )
            }
            Err(e) => {
                file_error = Some((path.to_path_buf(), e));
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Err(e) = level {
        tracing::warn!(level = %config.log_level, error = %e, "unknown log level, using info");
    }
    if let Some((path, e)) = file_error {
        tracing::warn!(path = %path.display(), error = %e, "failed to open log file, logging to stdout only");
    }

    guard
}

/// Appender that writes to exactly `path`, never rotating.
fn log_file_appender(path: &Path) -> Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .ok_or_else(|| miette::miette!("log file path has no file name"))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .map_err(|e| miette::miette!("{}", e))
}

//! Command-line interface for relaunch.
use std::str::FromStr;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::constants::{BACKUP_PORT, CONFIG_FILE_NAME, DEFAULT_PORT};

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let lowercase = trimmed.to_ascii_lowercase();
        let level = match lowercase.as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" | "information" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

/// Parses a TCP port, rejecting 0 and anything that isn't a number.
fn parse_port(value: &str) -> Result<u16, String> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(format!("invalid port number '{value}' (expected 1-65535)")),
    }
}

fn usage_footer() -> String {
    format!(
        "Built-in default port: {DEFAULT_PORT}\nBuilt-in backup port:  {BACKUP_PORT}\n\
         `default_port` and `backup_port` in {CONFIG_FILE_NAME} take precedence."
    )
}

/// Command-line interface for relaunch.
#[derive(Parser, Debug)]
#[command(name = "relaunch", version)]
#[command(
    about = "Gracefully restart a network service: stop old instances, free the port, relaunch, health-check",
    long_about = None
)]
#[command(after_help = usage_footer())]
pub struct Cli {
    /// Port to start the service on.
    #[arg(value_name = "PORT", value_parser = parse_port)]
    pub port: Option<u16>,

    /// Path to the configuration file (defaults to `relaunch.yaml` when present).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<String>,

    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevelArg>,

    /// Disable ANSI colors in output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Only inspect processes and the port; change nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Parses command-line arguments and returns a `Cli` struct.
///
/// Exits with status 0 after printing help or the version, and with status 2
/// on invalid input, before anything else runs.
pub fn parse_args() -> Cli {
    Cli::parse()
}

//! Error handling for relaunch.
use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a restart run.
///
/// Inspection and termination problems never show up here; those steps degrade
/// to a reported outcome instead. Only configuration problems and a failed
/// launch abort the sequence.
#[derive(Debug, Error)]
pub enum RestartError {
    /// Error reading the configuration file.
    #[error("Failed to read config file {path:?}: {source}")]
    ConfigReadError {
        /// The configuration file that could not be read.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// A `${VAR}` reference in the configuration names an unset variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// The configuration parsed but holds an unusable value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error for the PID marker file.
    #[error("PID marker error: {0}")]
    MarkerError(#[from] MarkerFileError),

    /// Error preparing the service log file.
    #[error("Failed to open log file {path:?}: {source}")]
    LogFileError {
        /// Log file or directory that could not be prepared.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error spawning the service process.
    #[error("Failed to launch `{command}`: {source}")]
    LaunchError {
        /// The command line that failed to start.
        command: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error building the HTTP client used for health checks.
    #[error("Failed to build health check client: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

/// Error type for PID marker file operations.
#[derive(Debug, Error)]
pub enum MarkerFileError {
    /// Error reading the marker file.
    #[error("Failed to read PID marker {path:?}: {source}")]
    ReadError {
        /// Location of the marker file.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error writing the marker file.
    #[error("Failed to write PID marker {path:?}: {source}")]
    WriteError {
        /// Location of the marker file.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error removing the marker file.
    #[error("Failed to remove PID marker {path:?}: {source}")]
    RemoveError {
        /// Location of the marker file.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },
}

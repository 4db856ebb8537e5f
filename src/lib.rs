//! Relaunch performs a graceful restart of a single long-running network
//! service: it finds running instances, frees the service's TCP port, stops old
//! processes, starts the service detached from the terminal, and confirms that
//! it answers HTTP health checks.

/// CLI interface.
pub mod cli;

/// Bounded execution of external tools.
pub mod command;

/// Configuration management.
pub mod config;

/// Operator-facing output.
pub mod console;

/// Default values.
pub mod constants;

/// Error handling.
pub mod error;

/// Health checking of the relaunched service.
pub mod health;

/// Process and port inspection traits.
pub mod inspect;

/// Service launching.
pub mod launcher;

/// Log file helpers.
pub mod logs;

/// PID marker file.
pub mod marker;

/// Restart sequence.
pub mod orchestrator;

/// Discovery of running instances.
pub mod scanner;

/// Host-backed inspectors.
pub mod system;

/// Shutdown of running instances.
pub mod terminator;

/// Port release polling.
pub mod waiter;

#[doc(hidden)]
pub mod test_utils;

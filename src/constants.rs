//! Constants and default values for relaunch.
//!
//! Every default here can be overridden from `relaunch.yaml`; the values mirror
//! the deployment layout the tool was written for.

use std::time::Duration;

// ============================================================================
// Service Identity
// ============================================================================

/// Command used to start the service, relative to the project directory.
pub const DEFAULT_COMMAND: &[&str] = &["node", "server.js"];

/// Substring of the command line that identifies a running service instance.
pub const DEFAULT_SIGNATURE: &str = "node server.js";

/// Executable name expected in socket ownership listings.
pub const DEFAULT_PROCESS_NAME: &str = "node";

/// Environment variable through which the port is handed to the service.
pub const DEFAULT_PORT_ENV: &str = "PORT";

/// Port used when none is given on the command line.
pub const DEFAULT_PORT: u16 = 8080;

/// Port used when the primary one stays held by an unrelated process.
pub const BACKUP_PORT: u16 = 8081;

// ============================================================================
// File System Constants
// ============================================================================

/// Configuration file looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = "relaunch.yaml";

/// Marker file recording the PID of the most recently launched instance.
pub const PID_FILE_NAME: &str = ".server.pid";

/// Directory (relative to the project) that holds the service log.
pub const LOG_DIR_NAME: &str = "log";

/// Append-only log collecting the service's stdout and stderr.
pub const LOG_FILE_NAME: &str = "server.log";

// ============================================================================
// External Command Timing
// ============================================================================

/// Upper bound for any inspection or cleanup command (`ss`, `lsof`, `fuser`).
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Polling interval while waiting on an external command.
pub const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Width at which `lsof` truncates the COMMAND column.
pub const LSOF_COMMAND_WIDTH: usize = 9;

// ============================================================================
// Restart Sequence Timing
// ============================================================================

/// Total time spent waiting for the port to be released.
pub const RELEASE_WINDOW: Duration = Duration::from_secs(5);

/// Interval between port release checks (two checks per second).
pub const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Pause after a forceful port clear before relaunching.
pub const FORCE_CLEAR_PAUSE: Duration = Duration::from_secs(1);

/// Pause for old processes to exit when the port was already free.
pub const PROCESS_EXIT_PAUSE: Duration = Duration::from_millis(500);

/// Pause between launching the service and the first health probe.
pub const POST_LAUNCH_PAUSE: Duration = Duration::from_secs(1);

// ============================================================================
// Health Check Constants
// ============================================================================

/// Host used to build the health check URL.
pub const HEALTH_CHECK_HOST: &str = "localhost";

/// Path requested by the health check.
pub const HEALTH_CHECK_PATH: &str = "/";

/// Number of health check attempts before giving up.
pub const HEALTH_CHECK_RETRIES: usize = 5;

/// Delay between health check attempts.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Per-request timeout for the health check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

// ============================================================================
// Logging and Output Constants
// ============================================================================

/// Start of the line written to the service log before every launch.
pub const LOG_SEPARATOR_PREFIX: &str = "--- relaunch ";

/// Number of lines suggested in the `tail` hint after a failed restart.
pub const SUMMARY_TAIL_LINES: usize = 30;

/// Number of trailing log lines echoed after a failed restart.
pub const FAILURE_EXCERPT_LINES: usize = 10;

/// Width of the banner and summary rules.
pub const RULE_WIDTH: usize = 50;

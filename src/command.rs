//! Bounded execution of external inspection tools.
use std::{
    io::{ErrorKind, Read},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::constants::COMMAND_POLL_INTERVAL;

/// How an external command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit status zero. Carries trimmed stdout.
    Success(String),
    /// Non-zero exit or death by signal.
    Failed {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Trimmed stdout.
        stdout: String,
    },
    /// The command did not finish in time and was killed.
    TimedOut,
    /// The program could not be started (usually not installed).
    Unavailable(String),
}

impl CommandOutcome {
    /// Stdout of a successful run with non-empty output.
    pub fn output(&self) -> Option<&str> {
        match self {
            CommandOutcome::Success(stdout) if !stdout.is_empty() => Some(stdout),
            _ => None,
        }
    }
}

/// Runs `program` with `args`, capturing stdout, and kills it after `timeout`.
///
/// Never fails: every problem is folded into the returned outcome.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> CommandOutcome {
    debug!("Running `{program} {}`", args.join(" "));

    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            let reason = if err.kind() == ErrorKind::NotFound {
                format!("{program} is not installed")
            } else {
                err.to_string()
            };
            debug!("Unable to run {program}: {reason}");
            return CommandOutcome::Unavailable(reason);
        }
    };

    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buffer = String::new();
            let _ = stdout.read_to_string(&mut buffer);
            buffer
        })
    });

    let status = match wait_with_timeout(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            debug!("`{program}` timed out after {timeout:?}");
            return CommandOutcome::TimedOut;
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return CommandOutcome::Unavailable(err.to_string());
        }
    };

    let stdout = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
        .trim()
        .to_string();

    if status.success() {
        CommandOutcome::Success(stdout)
    } else {
        CommandOutcome::Failed {
            code: status.code(),
            stdout,
        }
    }
}

/// Wait for a child process with a timeout, returning `Ok(None)` on timeout.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait()? {
            Some(status) => return Ok(Some(status)),
            None => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                thread::sleep(COMMAND_POLL_INTERVAL);
            }
        }
    }
}

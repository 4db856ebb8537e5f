//! Host-backed inspectors: `sysinfo` + `nix` for processes, `ss`/`lsof`/`fuser` for ports.
use std::time::Duration;

use nix::{errno::Errno, sys::signal, unistd::Pid};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, warn};

use crate::{
    command::{CommandOutcome, run_with_timeout},
    constants::COMMAND_TIMEOUT,
    inspect::{PortInspector, PortScan, ProcessInspector, SignalOutcome, StopSignal},
};

/// Process table access through `sysinfo`, signals through `nix`.
#[derive(Debug, Default)]
pub struct SystemProcesses;

impl SystemProcesses {
    /// Creates the inspector.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessInspector for SystemProcesses {
    fn find_matching(&self, signature: &str) -> Vec<u32> {
        let own_pid = std::process::id();
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let mut pids: Vec<u32> = system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter_map(|(pid, process)| {
                let cmdline = process
                    .cmd()
                    .iter()
                    .map(|part| part.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ");
                let pid = pid.as_u32();
                (pid != own_pid && cmdline.contains(signature)).then_some(pid)
            })
            .collect();

        pids.sort_unstable();
        debug!("Processes matching `{signature}`: {pids:?}");
        pids
    }

    fn signal(&self, pid: u32, stop: StopSignal) -> SignalOutcome {
        let Ok(raw) = i32::try_from(pid) else {
            return SignalOutcome::NotFound;
        };

        match signal::kill(Pid::from_raw(raw), Some(stop.as_nix())) {
            Ok(()) => SignalOutcome::Delivered,
            Err(Errno::ESRCH) => SignalOutcome::NotFound,
            Err(Errno::EPERM) => SignalOutcome::PermissionDenied,
            Err(err) => {
                warn!("Failed to send {stop} to PID {pid}: {err}");
                SignalOutcome::Failed(err.to_string())
            }
        }
    }
}

/// Socket table access through the usual Linux tooling.
///
/// Each command runs with a bounded timeout; a missing tool or a timeout reads
/// as "nothing listening".
#[derive(Debug, Clone)]
pub struct SystemPorts {
    timeout: Duration,
}

impl SystemPorts {
    /// Creates the inspector with the default command timeout.
    pub fn new() -> Self {
        Self::with_timeout(COMMAND_TIMEOUT)
    }

    /// Creates the inspector with a custom command timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn socket_table(&self) -> Option<String> {
        match run_with_timeout("ss", &["-tlnp"], self.timeout) {
            CommandOutcome::Success(stdout) => Some(stdout),
            other => {
                debug!("Socket table unavailable, treating ports as free: {other:?}");
                None
            }
        }
    }
}

impl Default for SystemPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl PortInspector for SystemPorts {
    fn listeners(&self, port: u16) -> PortScan {
        let Some(table) = self.socket_table() else {
            return PortScan::default();
        };

        let listeners = listeners_on_port(&table, port);
        if listeners.is_empty() {
            return PortScan::default();
        }

        let target = format!("-i:{port}");
        let owners = run_with_timeout("lsof", &[target.as_str(), "-t"], self.timeout)
            .output()
            .map(parse_pids)
            .unwrap_or_default();

        PortScan { listeners, owners }
    }

    fn matching_listener(&self, port: u16, process_name: &str) -> bool {
        self.socket_table().is_some_and(|table| {
            listeners_on_port(&table, port)
                .iter()
                .any(|line| line.contains(process_name))
        })
    }

    fn occupant_listing(&self, port: u16) -> Option<String> {
        let target = format!("-i:{port}");
        run_with_timeout("lsof", &[target.as_str()], self.timeout)
            .output()
            .and_then(lsof_rows)
    }

    fn force_clear(&self, port: u16) {
        let target = format!("{port}/tcp");
        match run_with_timeout("fuser", &["-k", target.as_str()], self.timeout) {
            CommandOutcome::Success(_) => debug!("fuser cleared port {port}"),
            other => debug!("fuser could not clear port {port}: {other:?}"),
        }
    }
}

/// Lines of `ss -tln[p]` output whose local address is bound to `port`.
pub fn listeners_on_port(table: &str, port: u16) -> Vec<String> {
    let suffix = format!(":{port}");
    table
        .lines()
        .map(str::trim)
        .filter(|line| {
            line.split_whitespace()
                .nth(3)
                .is_some_and(|local| local.ends_with(&suffix))
        })
        .map(str::to_string)
        .collect()
}

/// Data rows of `lsof` output, without the `COMMAND PID USER ...` header.
/// `None` when no rows remain.
pub fn lsof_rows(output: &str) -> Option<String> {
    let rows: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("COMMAND "))
        .collect();
    (!rows.is_empty()).then(|| rows.join("\n"))
}

/// Parses one PID per line, skipping anything that isn't a number.
pub fn parse_pids(output: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

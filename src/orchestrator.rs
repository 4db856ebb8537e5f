//! The restart sequence: scan, inspect, terminate, wait, launch, probe.
use std::thread;

use tracing::{debug, info};

use crate::{
    config::RestartConfig,
    console::Console,
    constants::{FAILURE_EXCERPT_LINES, LOG_SEPARATOR_PREFIX, SUMMARY_TAIL_LINES},
    error::RestartError,
    health::{HealthProbe, HealthReport, ProbeResult, wait_until_healthy},
    inspect::{PortInspector, PortScan, PortState, ProcessInspector},
    launcher::{LaunchResult, Launcher},
    logs,
    marker::{MarkerContents, PidMarker},
    scanner::{ScanReport, scan},
    terminator::{TargetedOutcome, TerminationReport, terminate},
    waiter::{ReleaseOutcome, wait_for_release},
};

/// Number of stages reported to the operator.
pub const STEPS: usize = 6;

/// Outcome of a restart that got as far as launching the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartSummary {
    /// PID of the new instance.
    pub pid: u32,
    /// Port the new instance was given.
    pub port: u16,
    /// Whether the health check passed.
    pub healthy: bool,
    /// URL of the service.
    pub url: String,
    /// How the port was freed, `None` when it was never occupied.
    pub release: Option<ReleaseOutcome>,
}

/// What a dry run observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPlan {
    /// Stage one findings.
    pub scan: ScanReport,
    /// Who holds the requested port.
    pub port_state: PortState,
}

/// Drives one restart against pluggable host capabilities.
pub struct Restarter<'a> {
    config: &'a RestartConfig,
    processes: &'a dyn ProcessInspector,
    ports: &'a dyn PortInspector,
    launcher: &'a dyn Launcher,
    health: &'a dyn HealthProbe,
    console: Console,
    marker: PidMarker,
}

impl<'a> Restarter<'a> {
    /// Wires the sequence to its collaborators.
    pub fn new(
        config: &'a RestartConfig,
        processes: &'a dyn ProcessInspector,
        ports: &'a dyn PortInspector,
        launcher: &'a dyn Launcher,
        health: &'a dyn HealthProbe,
        console: Console,
    ) -> Self {
        Self {
            config,
            processes,
            ports,
            launcher,
            health,
            console,
            marker: PidMarker::new(&config.pid_file),
        }
    }

    /// Runs the full sequence on `port`.
    ///
    /// Only a failed launch is an error. An unhealthy service is reported through
    /// [`RestartSummary::healthy`] and left running.
    pub fn run(&self, port: u16) -> Result<RestartSummary, RestartError> {
        info!("Restarting `{}` on port {port}", self.config.command_line());

        let found = self.scan_step();
        let occupied = self.port_step(port).is_occupied();
        debug!("Scan found {} instance(s); port occupied: {occupied}", found.matching.len());

        self.terminate_step();

        self.console.step(4, STEPS, &format!("Waiting for port {port} to be released"));
        let (port, release) = if occupied {
            let outcome = wait_for_release(
                self.ports,
                port,
                &self.config.process_name,
                self.config.backup_port,
                &self.config.release,
            );
            self.report_release(&outcome);
            (outcome.port(), Some(outcome))
        } else {
            self.console.ok(format!("Port {port} was not in use"));
            thread::sleep(self.config.release.exit_pause);
            (port, None)
        };

        let launched = self.launch_step(port)?;
        thread::sleep(self.config.health.initial_delay);
        let health = self.health_step(launched.port);

        let summary = RestartSummary {
            pid: launched.pid,
            port: launched.port,
            healthy: health.healthy,
            url: self.health.url(launched.port),
            release,
        };
        self.print_summary(&summary);
        Ok(summary)
    }

    /// Runs the read-only stages and reports what a restart would do.
    pub fn plan(&self, port: u16) -> RestartPlan {
        let scan = self.scan_step();
        self.port_step(port);
        let port_state = self.ports.state(port, &self.config.process_name);

        self.console.step(3, STEPS, "Planned actions (dry run)");
        match scan.marker.pid() {
            Some(pid) => self.console.info(format!("Would send SIGTERM to tracked PID {pid}")),
            None if scan.marker.is_present() => {
                self.console.info("Would remove the invalid PID marker")
            }
            None => self.console.info("No tracked process to stop"),
        }
        let strays: Vec<_> = scan
            .matching
            .iter()
            .filter(|pid| Some(**pid) != scan.marker.pid())
            .collect();
        if !strays.is_empty() {
            self.console.info(format!(
                "Would send {} to stray instance(s): {}",
                self.config.sweep_signal,
                join_pids(strays.into_iter().copied())
            ));
        }
        match port_state {
            PortState::Free => self.console.ok(format!("Would launch on port {port}")),
            PortState::OccupiedByService => self.console.info(format!(
                "Would wait up to {:?} for port {port} to be released",
                self.config.release.window
            )),
            PortState::OccupiedByOther => self.console.warn(format!(
                "Port {port} is {port_state}; the backup port {} would likely be used",
                self.config.backup_port
            )),
        }

        RestartPlan { scan, port_state }
    }

    fn scan_step(&self) -> ScanReport {
        self.console.step(1, STEPS, "Checking for running instances");
        let report = scan(self.processes, &self.marker, &self.config.signature);

        if report.matching.is_empty() {
            self.console.ok("No running instances");
        } else {
            self.console.warn(format!(
                "Found running instance(s): {}",
                join_pids(report.matching.iter().copied())
            ));
        }

        match &report.marker {
            MarkerContents::Pid(pid) => self.console.info(format!("PID file records {pid}")),
            MarkerContents::Invalid(raw) if !raw.is_empty() => self
                .console
                .info(format!("PID file holds an invalid value: {raw:?}")),
            MarkerContents::Invalid(_) | MarkerContents::Absent => {}
        }

        report
    }

    fn port_step(&self, port: u16) -> PortScan {
        self.console.step(2, STEPS, &format!("Checking port {port}"));
        let scan = self.ports.listeners(port);

        if scan.is_occupied() {
            self.console.warn(format!("Port {port} is in use:"));
            for line in &scan.listeners {
                self.console.detail(line);
            }
            if !scan.owners.is_empty() {
                self.console
                    .info(format!("Owner PID(s): {}", join_pids(scan.owners.iter().copied())));
            }
        } else {
            self.console.ok(format!("Port {port} is free"));
        }

        scan
    }

    fn terminate_step(&self) -> TerminationReport {
        self.console.step(3, STEPS, "Stopping running instances");
        let report = terminate(
            self.processes,
            &self.marker,
            &self.config.signature,
            self.config.sweep_signal,
        );

        match &report.targeted {
            Some(TargetedOutcome::Signalled(pid)) => {
                self.console.ok(format!("Stopped tracked process {pid}"))
            }
            Some(TargetedOutcome::AlreadyGone(pid)) => self
                .console
                .info(format!("Tracked process {pid} no longer exists")),
            Some(TargetedOutcome::InvalidPid(raw)) => self
                .console
                .info(format!("Ignored unusable PID file contents {raw:?}")),
            Some(TargetedOutcome::PermissionDenied(pid)) => self
                .console
                .error(format!("Not permitted to stop process {pid}")),
            Some(TargetedOutcome::Failed(pid, reason)) => self
                .console
                .error(format!("Could not signal process {pid}: {reason}")),
            None => {}
        }
        if report.targeted.is_some() && !report.marker_cleared {
            self.console.warn(format!(
                "Could not remove PID file {}",
                self.marker.path().display()
            ));
        }

        if !report.swept.is_empty() {
            self.console.ok(format!(
                "Cleaned up leftover instance(s): {}",
                join_pids(report.swept.iter().copied())
            ));
        }
        if !report.missed.is_empty() {
            self.console.warn(format!(
                "Could not signal instance(s): {}",
                join_pids(report.missed.iter().copied())
            ));
        }

        if !report.acted() {
            self.console.info("Nothing needed stopping");
        }

        report
    }

    fn report_release(&self, outcome: &ReleaseOutcome) {
        match outcome {
            ReleaseOutcome::Released(port) => {
                self.console.ok(format!("Port {port} released"))
            }
            ReleaseOutcome::Fallback { occupied, backup } => self.console.warn(format!(
                "Port {occupied} is held by an unrelated process (a forwarder?); switching to backup port {backup}"
            )),
            ReleaseOutcome::ForceCleared(port) => self
                .console
                .warn(format!("Port {port} was still in use and has been force-cleared")),
        }
    }

    fn launch_step(&self, port: u16) -> Result<LaunchResult, RestartError> {
        self.console
            .step(5, STEPS, &format!("Starting service (port {port})"));

        match self.launcher.launch(port) {
            Ok(launched) => {
                self.console.ok(format!(
                    "Service started | PID: {} | port: {}",
                    launched.pid, launched.port
                ));
                if !launched.tracked {
                    self.console.warn(format!(
                        "PID could not be written to {}",
                        self.marker.path().display()
                    ));
                }
                Ok(launched)
            }
            Err(err) => {
                self.console.error(format!("Launch failed: {err}"));
                println!();
                self.console.rule();
                self.console.error("Restart failed: the service could not be started");
                self.console.rule();
                Err(err)
            }
        }
    }

    fn health_step(&self, port: u16) -> HealthReport {
        self.console.step(6, STEPS, "Health check");
        let retries = self.config.health.retries;

        let report = wait_until_healthy(
            self.health,
            port,
            retries,
            self.config.health.interval,
            |attempt, total| {
                self.console
                    .info(format!("Waiting for the service... ({attempt}/{total})"))
            },
        );

        if report.healthy {
            self.console.ok("Service is up");
            self.console.info(format!("URL: {}", self.health.url(port)));
        } else {
            match &report.last {
                Some(ProbeResult::Unhealthy(status)) => self
                    .console
                    .error(format!("Service answered with HTTP {status}")),
                _ => self.console.error("Service is not responding"),
            }
            self.console.error(format!(
                "Check the log: tail -20 {}",
                self.config.log_file.display()
            ));
        }

        report
    }

    fn print_summary(&self, summary: &RestartSummary) {
        println!();
        self.console.rule();
        if summary.healthy {
            self.console.ok(format!(
                "Restart succeeded! PID={}  port={}",
                summary.pid, summary.port
            ));
            self.console.info(&summary.url);
        } else {
            self.console
                .error("Restart may have failed; please check the log");
            self.console.info(format!(
                "tail -{SUMMARY_TAIL_LINES} {}",
                self.config.log_file.display()
            ));

            let excerpt = logs::tail_since(
                &self.config.log_file,
                LOG_SEPARATOR_PREFIX,
                FAILURE_EXCERPT_LINES,
            )
            .unwrap_or_default();
            for line in &excerpt {
                self.console.detail(line);
            }
            if logs::indicates_port_conflict(&excerpt) {
                self.console.warn(format!(
                    "The log reports the address is in use; try `relaunch {}`",
                    self.config.backup_port
                ));
            }
        }
        self.console.rule();
    }
}

fn join_pids(pids: impl IntoIterator<Item = u32>) -> String {
    pids.into_iter()
        .map(|pid| pid.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Stage 3: stop the tracked instance, then sweep strays.
use tracing::{debug, warn};

use crate::{
    inspect::{ProcessInspector, SignalOutcome, StopSignal},
    marker::{MarkerContents, PidMarker},
};

/// What happened to the process named by the marker file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetedOutcome {
    /// `SIGTERM` was delivered.
    Signalled(u32),
    /// The tracked process no longer exists.
    AlreadyGone(u32),
    /// The marker did not hold a usable PID.
    InvalidPid(String),
    /// The process exists but may not be signalled by this user.
    PermissionDenied(u32),
    /// Delivery failed for another reason.
    Failed(u32, String),
}

/// Result of the termination stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationReport {
    /// Outcome of the marker-driven shutdown, `None` when no marker existed.
    pub targeted: Option<TargetedOutcome>,
    /// Whether the marker file was removed.
    pub marker_cleared: bool,
    /// Stray instances found by the signature sweep.
    pub strays: Vec<u32>,
    /// Strays that actually received the sweep signal.
    pub swept: Vec<u32>,
    /// Strays that are still running but could not be signalled.
    pub missed: Vec<u32>,
}

impl TerminationReport {
    /// Whether any process was signalled.
    pub fn acted(&self) -> bool {
        matches!(self.targeted, Some(TargetedOutcome::Signalled(_))) || !self.swept.is_empty()
    }
}

/// Stops the service.
///
/// The marker PID gets a graceful `SIGTERM` and the marker is removed no matter
/// how that went. Afterwards every process still matching `signature` receives
/// `sweep_signal`; the table is read once and exactly those PIDs are signalled. Nothing here returns an error.
pub fn terminate(
    processes: &dyn ProcessInspector,
    marker: &PidMarker,
    signature: &str,
    sweep_signal: StopSignal,
) -> TerminationReport {
    let mut report = TerminationReport::default();

    let contents = marker.inspect().unwrap_or_else(|err| {
        warn!("{err}");
        MarkerContents::Invalid(String::new())
    });

    let targeted = match contents {
        MarkerContents::Absent => None,
        MarkerContents::Pid(pid) => Some(match processes.signal(pid, StopSignal::Term) {
            SignalOutcome::Delivered => TargetedOutcome::Signalled(pid),
            SignalOutcome::NotFound => TargetedOutcome::AlreadyGone(pid),
            SignalOutcome::PermissionDenied => TargetedOutcome::PermissionDenied(pid),
            SignalOutcome::Failed(reason) => TargetedOutcome::Failed(pid, reason),
        }),
        MarkerContents::Invalid(raw) => Some(TargetedOutcome::InvalidPid(raw)),
    };

    if targeted.is_some() {
        report.marker_cleared = match marker.clear() {
            Ok(_) => true,
            Err(err) => {
                warn!("{err}");
                false
            }
        };
    }
    report.targeted = targeted;

    report.strays = processes.find_matching(signature);
    if !report.strays.is_empty() {
        debug!(
            "Sweeping {} stray instance(s) with {sweep_signal}",
            report.strays.len()
        );
        for &pid in &report.strays {
            match processes.signal(pid, sweep_signal) {
                SignalOutcome::Delivered => report.swept.push(pid),
                SignalOutcome::NotFound => debug!("Stray {pid} exited before the sweep"),
                SignalOutcome::PermissionDenied => report.missed.push(pid),
                SignalOutcome::Failed(reason) => {
                    warn!("Could not send {sweep_signal} to {pid}: {reason}");
                    report.missed.push(pid);
                }
            }
        }
    }

    report
}

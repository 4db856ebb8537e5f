//! Stage 1: find running service instances.
use tracing::warn;

use crate::{
    inspect::ProcessInspector,
    marker::{MarkerContents, PidMarker},
};

/// Snapshot of what looks like the service before anything is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// PIDs whose command line carries the launch signature.
    pub matching: Vec<u32>,
    /// Marker file contents, unverified.
    pub marker: MarkerContents,
}

/// Lists matching processes and reads the marker file. Has no side effects.
pub fn scan(
    processes: &dyn ProcessInspector,
    marker: &PidMarker,
    signature: &str,
) -> ScanReport {
    let matching = processes.find_matching(signature);
    let marker = marker.inspect().unwrap_or_else(|err| {
        warn!("{err}");
        MarkerContents::Absent
    });

    ScanReport { matching, marker }
}

//! Capability traits for observing and signalling the host.
//!
//! The restart sequence only talks to the operating system through these
//! traits. [`crate::system`] provides the real implementations; tests swap in
//! in-memory doubles.
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// Signal used to stop a service process.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StopSignal {
    /// `SIGTERM`, lets the service shut down cleanly.
    #[default]
    Term,
    /// `SIGKILL`.
    Kill,
}

impl StopSignal {
    /// Equivalent `nix` signal.
    pub fn as_nix(&self) -> nix::sys::signal::Signal {
        match self {
            StopSignal::Term => nix::sys::signal::Signal::SIGTERM,
            StopSignal::Kill => nix::sys::signal::Signal::SIGKILL,
        }
    }
}

/// Result of delivering a signal to one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal was accepted by the kernel.
    Delivered,
    /// No such process.
    NotFound,
    /// The process exists but belongs to someone else.
    PermissionDenied,
    /// Any other failure.
    Failed(String),
}

/// Reads the process table and signals processes.
pub trait ProcessInspector {
    /// PIDs whose command line contains `signature`, in ascending order.
    /// Lookup failures yield an empty list.
    fn find_matching(&self, signature: &str) -> Vec<u32>;

    /// Sends `signal` to a single process.
    fn signal(&self, pid: u32, signal: StopSignal) -> SignalOutcome;
}

/// Listening sockets found on a port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortScan {
    /// Raw socket table lines for listeners on the port.
    pub listeners: Vec<String>,
    /// PIDs owning the port, when they could be resolved.
    pub owners: Vec<u32>,
}

impl PortScan {
    /// Whether anything listens on the port.
    pub fn is_occupied(&self) -> bool {
        !self.listeners.is_empty()
    }
}

/// Who, if anyone, holds a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PortState {
    #[strum(serialize = "free")]
    Free,
    #[strum(serialize = "occupied by the service")]
    OccupiedByService,
    #[strum(serialize = "occupied by another process")]
    OccupiedByOther,
}

/// Reads the socket table and clears ports.
///
/// Every method degrades to the "free" answer when the underlying tooling is
/// missing or misbehaves.
pub trait PortInspector {
    /// Listening sockets bound to `port`.
    fn listeners(&self, port: u16) -> PortScan;

    /// Whether a listener on `port` is owned by a process called `process_name`.
    fn matching_listener(&self, port: u16, process_name: &str) -> bool;

    /// Free-form ownership listing for `port`, `None` when nothing could be determined.
    fn occupant_listing(&self, port: u16) -> Option<String>;

    /// Kills whatever holds `port`.
    fn force_clear(&self, port: u16);

    /// Classifies the port.
    fn state(&self, port: u16, process_name: &str) -> PortState {
        if !self.listeners(port).is_occupied() {
            PortState::Free
        } else if self.matching_listener(port, process_name) {
            PortState::OccupiedByService
        } else {
            PortState::OccupiedByOther
        }
    }
}

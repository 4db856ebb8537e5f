//! Stage 4: wait for the service's port to be released.
use std::thread;

use tracing::debug;

use crate::{config::ReleaseSettings, constants::LSOF_COMMAND_WIDTH, inspect::PortInspector};

/// How the port question was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The service's listener disappeared within the window.
    Released(u16),
    /// An unrelated process holds the port; relaunch on the backup port.
    Fallback {
        /// The port that stayed occupied.
        occupied: u16,
        /// The port to use instead.
        backup: u16,
    },
    /// The port was force-cleared; relaunch on it and hope for the best.
    ForceCleared(u16),
}

impl ReleaseOutcome {
    /// Port the service should be launched on.
    pub fn port(&self) -> u16 {
        match self {
            ReleaseOutcome::Released(port) | ReleaseOutcome::ForceCleared(port) => *port,
            ReleaseOutcome::Fallback { backup, .. } => *backup,
        }
    }
}

/// Polls `port` until no listener owned by `process_name` remains.
///
/// A port that is still bound once the service's listener is gone belongs to
/// something else and won't be released by waiting, so the window is cut short.
/// When the port stays held, the occupant listing decides: if no row's command
/// column names `process_name`, some other program (a tunnel or forwarder) owns
/// the port and `backup_port` is returned. Otherwise the port is force-cleared
/// and returned unchanged.
pub fn wait_for_release(
    ports: &dyn PortInspector,
    port: u16,
    process_name: &str,
    backup_port: u16,
    settings: &ReleaseSettings,
) -> ReleaseOutcome {
    let attempts = settings.attempts();

    for attempt in 1..=attempts {
        if !ports.matching_listener(port, process_name) {
            if !ports.listeners(port).is_occupied() {
                debug!("Port {port} released after {attempt} check(s)");
                return ReleaseOutcome::Released(port);
            }
            debug!("Port {port} is bound by something other than {process_name}");
            break;
        }
        thread::sleep(settings.interval);
    }

    if let Some(listing) = ports.occupant_listing(port)
        && !occupied_by(&listing, process_name)
    {
        debug!("Port {port} held by an unrelated process:\n{listing}");
        return ReleaseOutcome::Fallback {
            occupied: port,
            backup: backup_port,
        };
    }

    ports.force_clear(port);
    thread::sleep(settings.force_clear_pause);
    ReleaseOutcome::ForceCleared(port)
}

/// Whether any row of an `lsof` listing has `process_name` in its command column.
///
/// `lsof` cuts command names to [`LSOF_COMMAND_WIDTH`] characters, so a full-width
/// command only has to be a prefix of `process_name`.
fn occupied_by(listing: &str, process_name: &str) -> bool {
    let name = process_name.to_ascii_lowercase();
    listing
        .lines()
        .filter_map(|row| row.split_whitespace().next())
        .filter(|command| *command != "COMMAND")
        .map(str::to_ascii_lowercase)
        .any(|command| {
            command == name
                || (command.chars().count() >= LSOF_COMMAND_WIDTH && name.starts_with(&command))
        })
}

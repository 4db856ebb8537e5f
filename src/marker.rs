//! PID marker file tracking the most recently launched service instance.
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::MarkerFileError;

/// What the marker file currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerContents {
    /// No marker file exists.
    Absent,
    /// The marker names a valid, positive PID.
    Pid(u32),
    /// The marker exists but does not hold a usable PID. Carries the raw text.
    Invalid(String),
}

impl MarkerContents {
    /// Returns the tracked PID, treating invalid contents as absent.
    pub fn pid(&self) -> Option<u32> {
        match self {
            MarkerContents::Pid(pid) => Some(*pid),
            MarkerContents::Absent | MarkerContents::Invalid(_) => None,
        }
    }

    /// Whether a marker file was found on disk, valid or not.
    pub fn is_present(&self) -> bool {
        !matches!(self, MarkerContents::Absent)
    }
}

/// Single-PID marker file stored under the project directory.
#[derive(Debug, Clone)]
pub struct PidMarker {
    path: PathBuf,
}

impl PidMarker {
    /// Creates a handle for the marker at `path`. Nothing is touched on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the marker file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and classifies the marker contents.
    pub fn inspect(&self) -> Result<MarkerContents, MarkerFileError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let raw = contents.trim();
                Ok(match parse_pid(raw) {
                    Some(pid) => MarkerContents::Pid(pid),
                    None => MarkerContents::Invalid(raw.to_string()),
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(MarkerContents::Absent),
            Err(source) => Err(MarkerFileError::ReadError {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Returns the tracked PID, or `None` when the marker is absent, invalid or unreadable.
    pub fn pid(&self) -> Option<u32> {
        match self.inspect() {
            Ok(contents) => contents.pid(),
            Err(err) => {
                debug!("Treating unreadable PID marker as absent: {err}");
                None
            }
        }
    }

    /// Replaces the marker with `pid`.
    ///
    /// The value is written to a sibling temporary file and renamed into place so
    /// readers never observe a partially written PID.
    pub fn record(&self, pid: u32) -> Result<(), MarkerFileError> {
        let write_error = |source| MarkerFileError::WriteError {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_error)?;
        }

        let staging = self.staging_path();
        fs::write(&staging, pid.to_string()).map_err(write_error)?;
        fs::rename(&staging, &self.path).map_err(|source| {
            let _ = fs::remove_file(&staging);
            write_error(source)
        })?;

        debug!("Recorded PID {pid} in {:?}", self.path);
        Ok(())
    }

    /// Deletes the marker. Returns `false` if there was nothing to delete.
    pub fn clear(&self) -> Result<bool, MarkerFileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(MarkerFileError::RemoveError {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Parses a marker value. Only positive PIDs that fit a `pid_t` are accepted.
fn parse_pid(raw: &str) -> Option<u32> {
    raw.parse::<u32>()
        .ok()
        .filter(|pid| *pid > 0 && *pid <= i32::MAX as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_marker_is_absent() {
        let dir = tempdir().unwrap();
        let marker = PidMarker::new(dir.path().join(".server.pid"));

        assert_eq!(marker.inspect().unwrap(), MarkerContents::Absent);
        assert_eq!(marker.pid(), None);
        assert!(!marker.clear().unwrap());
    }

    #[test]
    fn record_overwrites_previous_pid() {
        let dir = tempdir().unwrap();
        let marker = PidMarker::new(dir.path().join(".server.pid"));

        marker.record(100).unwrap();
        marker.record(4242).unwrap();

        assert_eq!(fs::read_to_string(marker.path()).unwrap(), "4242");
        assert_eq!(marker.pid(), Some(4242));
        assert!(!dir.path().join(".server.pid.tmp").exists());
    }

    #[test]
    fn record_creates_missing_parent_directory() {
        let dir = tempdir().unwrap();
        let marker = PidMarker::new(dir.path().join("run/app.pid"));

        marker.record(7).unwrap();
        assert_eq!(marker.pid(), Some(7));
    }

    #[test]
    fn garbage_and_non_positive_values_are_invalid() {
        let dir = tempdir().unwrap();
        let marker = PidMarker::new(dir.path().join(".server.pid"));

        for raw in ["abc", "0", "-12", "", "99999999999"] {
            fs::write(marker.path(), raw).unwrap();
            let contents = marker.inspect().unwrap();
            assert_eq!(contents, MarkerContents::Invalid(raw.to_string()));
            assert!(contents.is_present());
            assert_eq!(marker.pid(), None, "value {raw:?} should be treated as absent");
        }
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let dir = tempdir().unwrap();
        let marker = PidMarker::new(dir.path().join(".server.pid"));
        fs::write(marker.path(), "  1234\n").unwrap();

        assert_eq!(marker.inspect().unwrap(), MarkerContents::Pid(1234));
    }

    #[test]
    fn clear_removes_existing_marker() {
        let dir = tempdir().unwrap();
        let marker = PidMarker::new(dir.path().join(".server.pid"));
        marker.record(55).unwrap();

        assert!(marker.clear().unwrap());
        assert!(!marker.path().exists());
        assert_eq!(marker.inspect().unwrap(), MarkerContents::Absent);
    }
}

//! Stage 5: start the service detached from this terminal.
use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::Write,
    os::unix::process::CommandExt,
    path::PathBuf,
    process::{Command, Stdio},
};

use chrono::Local;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::{
    config::RestartConfig, constants::LOG_SEPARATOR_PREFIX, error::RestartError,
    marker::PidMarker,
};

/// A freshly spawned service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchResult {
    /// PID of the spawned process.
    pub pid: u32,
    /// Port handed to the service.
    pub port: u16,
    /// Whether the PID made it into the marker file.
    pub tracked: bool,
}

/// Starts the service on a given port.
pub trait Launcher {
    /// Spawns the service. An error means nothing was started.
    fn launch(&self, port: u16) -> Result<LaunchResult, RestartError>;
}

/// Spawns the configured command in its own session with output appended to the log file.
#[derive(Debug, Clone)]
pub struct ServiceLauncher {
    command: Vec<String>,
    working_dir: PathBuf,
    log_dir: PathBuf,
    log_file: PathBuf,
    port_env: String,
    env: BTreeMap<String, String>,
    marker: PidMarker,
}

impl ServiceLauncher {
    /// Creates a launcher from the restart configuration.
    pub fn new(config: &RestartConfig) -> Self {
        Self {
            command: config.command.clone(),
            working_dir: config.project_dir.clone(),
            log_dir: config.log_dir.clone(),
            log_file: config.log_file.clone(),
            port_env: config.port_env.clone(),
            env: config.env.clone(),
            marker: PidMarker::new(&config.pid_file),
        }
    }

    fn open_log(&self, port: u16) -> Result<File, RestartError> {
        fs::create_dir_all(&self.log_dir).map_err(|source| RestartError::LogFileError {
            path: self.log_dir.clone(),
            source,
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .map_err(|source| RestartError::LogFileError {
                path: self.log_file.clone(),
                source,
            })?;

        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Err(err) = writeln!(
            file,
            "{LOG_SEPARATOR_PREFIX}{stamp}: starting on port {port} ---"
        ) {
            debug!("Unable to write log separator: {err}");
        }

        Ok(file)
    }
}

impl Launcher for ServiceLauncher {
    fn launch(&self, port: u16) -> Result<LaunchResult, RestartError> {
        let command_line = self.command.join(" ");
        let Some((program, args)) = self.command.split_first() else {
            return Err(RestartError::InvalidConfig(
                "`command` must name a program to run".into(),
            ));
        };

        let args = substitute_port(args, &self.port_env, port)?;
        let stdout = self.open_log(port)?;
        let stderr = stdout
            .try_clone()
            .map_err(|source| RestartError::LogFileError {
                path: self.log_file.clone(),
                source,
            })?;

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .current_dir(&self.working_dir)
            .envs(&self.env)
            .env(&self.port_env, port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        unsafe {
            cmd.pre_exec(|| {
                // New session: the service outlives this terminal and this process.
                if libc::setsid() < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        debug!("Executing command: {cmd:?}");

        let child = cmd.spawn().map_err(|source| {
            error!("Failed to launch `{command_line}`: {source}");
            RestartError::LaunchError {
                command: command_line.clone(),
                source,
            }
        })?;
        let pid = child.id();
        debug!("`{command_line}` started with PID {pid} on port {port}");

        let tracked = match self.marker.record(pid) {
            Ok(()) => true,
            Err(err) => {
                warn!("Service started but its PID could not be recorded: {err}");
                false
            }
        };

        Ok(LaunchResult { pid, port, tracked })
    }
}

/// Replaces `$NAME` and `${NAME}` references to the port variable with `port`.
fn substitute_port(
    args: &[String],
    port_env: &str,
    port: u16,
) -> Result<Vec<String>, RestartError> {
    let name = regex::escape(port_env);
    let re = Regex::new(&format!(r"\$(?:\{{{name}\}}|{name}\b)"))
        .map_err(|err| RestartError::InvalidConfig(err.to_string()))?;
    let port = port.to_string();

    Ok(args
        .iter()
        .map(|arg| re.replace_all(arg, port.as_str()).into_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        thread,
        time::{Duration, Instant},
    };
    use tempfile::tempdir;

    fn wait_for_contents(path: &std::path::Path, needle: &str) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let contents = fs::read_to_string(path).unwrap_or_default();
            if contents.contains(needle) {
                return contents;
            }
            if Instant::now() >= deadline {
                panic!("Timed out waiting for {needle:?} in {path:?}; got {contents:?}");
            }
            thread::sleep(Duration::from_millis(50));
        }
    }

    fn shell_config(dir: &std::path::Path, script: &str) -> RestartConfig {
        let mut config = RestartConfig::for_project(dir);
        config.command = vec!["sh".into(), "-c".into(), script.into()];
        config
    }

    #[test]
    fn launch_passes_port_and_records_pid() {
        let dir = tempdir().unwrap();
        let mut config = shell_config(
            dir.path(),
            "echo \"port=$PORT mode=$APP_MODE cwd=$(pwd)\"; echo oops >&2",
        );
        config.env.insert("APP_MODE".into(), "test".into());

        let result = ServiceLauncher::new(&config).launch(9123).unwrap();

        assert_eq!(result.port, 9123);
        assert!(result.tracked);
        assert_eq!(
            fs::read_to_string(&config.pid_file).unwrap(),
            result.pid.to_string()
        );

        let log = wait_for_contents(&config.log_file, "oops");
        assert!(log.contains("starting on port 9123"));
        assert!(log.contains("port=9123 mode=test"));
        let cwd = dir.path().canonicalize().unwrap();
        assert!(log.contains(&format!("cwd={}", cwd.display())));
    }

    #[test]
    fn log_file_is_appended_not_truncated() {
        let dir = tempdir().unwrap();
        let config = shell_config(dir.path(), "echo run-$PORT");
        fs::create_dir_all(&config.log_dir).unwrap();
        fs::write(&config.log_file, "previous contents\n").unwrap();

        let launcher = ServiceLauncher::new(&config);
        launcher.launch(1111).unwrap();
        wait_for_contents(&config.log_file, "run-1111");
        launcher.launch(2222).unwrap();

        let log = wait_for_contents(&config.log_file, "run-2222");
        assert!(log.starts_with("previous contents\n"));
        assert!(log.contains("run-1111"));
    }

    #[test]
    fn child_runs_in_its_own_session() {
        let dir = tempdir().unwrap();
        let config = shell_config(dir.path(), "sleep 5");

        let result = ServiceLauncher::new(&config).launch(8080).unwrap();
        let child = nix::unistd::Pid::from_raw(result.pid as i32);
        let session = nix::unistd::getsid(Some(child)).unwrap();
        let ours = nix::unistd::getsid(None).unwrap();

        assert_eq!(session, child);
        assert_ne!(session, ours);

        let _ = nix::sys::signal::kill(child, nix::sys::signal::Signal::SIGKILL);
    }

    #[test]
    fn port_references_in_arguments_get_the_launch_port() {
        let dir = tempdir().unwrap();
        let mut config = RestartConfig::for_project(dir.path());
        config.command = vec![
            "echo".into(),
            "--port".into(),
            "$PORT".into(),
            "--url=http://localhost:${PORT}/".into(),
            "$PORTABLE".into(),
        ];

        ServiceLauncher::new(&config).launch(9345).unwrap();

        let log = wait_for_contents(&config.log_file, "--port 9345");
        assert!(log.contains("--url=http://localhost:9345/ $PORTABLE"));
    }

    #[test]
    fn substitution_follows_the_configured_variable() {
        let args = vec!["--listen=$APP_PORT".to_string(), "$PORT".to_string()];
        assert_eq!(
            substitute_port(&args, "APP_PORT", 7000).unwrap(),
            vec!["--listen=7000", "$PORT"]
        );
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let dir = tempdir().unwrap();
        let mut config = RestartConfig::for_project(dir.path());
        config.command = vec!["relaunch-no-such-program".into()];

        let err = ServiceLauncher::new(&config).launch(8080).unwrap_err();

        assert!(matches!(err, RestartError::LaunchError { .. }));
        assert!(!config.pid_file.exists());
    }
}

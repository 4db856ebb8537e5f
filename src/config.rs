//! Configuration management for relaunch.
use regex::Regex;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::constants::{
    BACKUP_PORT, CONFIG_FILE_NAME, DEFAULT_COMMAND, DEFAULT_PORT, DEFAULT_PORT_ENV,
    DEFAULT_PROCESS_NAME, DEFAULT_SIGNATURE, FORCE_CLEAR_PAUSE, HEALTH_CHECK_HOST,
    HEALTH_CHECK_INTERVAL, HEALTH_CHECK_PATH, HEALTH_CHECK_RETRIES, HEALTH_CHECK_TIMEOUT,
    LOG_DIR_NAME, LOG_FILE_NAME, PID_FILE_NAME, POST_LAUNCH_PAUSE, PROCESS_EXIT_PAUSE,
    RELEASE_POLL_INTERVAL, RELEASE_WINDOW,
};
use crate::error::RestartError;
use crate::inspect::StopSignal;

/// Represents the structure of the configuration file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Deployment root. Relative values resolve against the config file's directory.
    pub project_dir: Option<String>,
    /// Program and arguments used to start the service.
    pub command: Option<Vec<String>>,
    /// Command-line substring identifying running instances.
    pub signature: Option<String>,
    /// Executable name expected in socket ownership listings.
    pub process_name: Option<String>,
    /// Environment variable carrying the port to the service.
    pub port_env: Option<String>,
    /// Port used when none is passed on the command line.
    pub default_port: Option<u16>,
    /// Fallback port when the primary stays held by an unrelated process.
    pub backup_port: Option<u16>,
    /// Marker file path, relative to the project directory.
    pub pid_file: Option<String>,
    /// Log directory, relative to the project directory.
    pub log_dir: Option<String>,
    /// Log file name inside `log_dir`.
    pub log_file: Option<String>,
    /// Signal used when sweeping stray instances (`term` or `kill`).
    pub sweep_signal: Option<StopSignal>,
    /// Extra environment variables for the service.
    pub env: Option<BTreeMap<String, String>>,
    /// Health check tuning.
    pub health: Option<HealthSection>,
    /// Port release tuning.
    pub release: Option<ReleaseSection>,
}

/// `health:` block of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthSection {
    pub host: Option<String>,
    pub path: Option<String>,
    pub retries: Option<usize>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub initial_delay: Option<String>,
}

/// `release:` block of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseSection {
    pub window: Option<String>,
    pub interval: Option<String>,
    pub force_clear_pause: Option<String>,
    pub exit_pause: Option<String>,
}

/// Fully resolved settings for one restart run.
#[derive(Debug, Clone)]
pub struct RestartConfig {
    /// Working directory for the service and base for relative paths.
    pub project_dir: PathBuf,
    /// Program followed by its arguments. Never empty.
    pub command: Vec<String>,
    /// Command-line substring identifying running instances.
    pub signature: String,
    /// Executable name expected in socket ownership listings.
    pub process_name: String,
    /// Environment variable carrying the port.
    pub port_env: String,
    /// Port used when none is requested.
    pub default_port: u16,
    /// Fallback port.
    pub backup_port: u16,
    /// Marker file location.
    pub pid_file: PathBuf,
    /// Directory holding the service log.
    pub log_dir: PathBuf,
    /// Service log file.
    pub log_file: PathBuf,
    /// Signal used for the signature sweep.
    pub sweep_signal: StopSignal,
    /// Extra environment for the service.
    pub env: BTreeMap<String, String>,
    /// Health check settings.
    pub health: HealthSettings,
    /// Port release settings.
    pub release: ReleaseSettings,
}

/// Resolved health check settings.
#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub host: String,
    pub path: String,
    pub retries: usize,
    pub interval: Duration,
    pub timeout: Duration,
    /// Pause between launch and the first probe.
    pub initial_delay: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            host: HEALTH_CHECK_HOST.to_string(),
            path: HEALTH_CHECK_PATH.to_string(),
            retries: HEALTH_CHECK_RETRIES,
            interval: HEALTH_CHECK_INTERVAL,
            timeout: HEALTH_CHECK_TIMEOUT,
            initial_delay: POST_LAUNCH_PAUSE,
        }
    }
}

/// Resolved port release settings.
#[derive(Debug, Clone)]
pub struct ReleaseSettings {
    /// Total time spent polling for the port to be released.
    pub window: Duration,
    /// Delay between polls.
    pub interval: Duration,
    /// Pause after a forceful port clear.
    pub force_clear_pause: Duration,
    /// Pause for old processes to exit when the port was never occupied.
    pub exit_pause: Duration,
}

impl ReleaseSettings {
    /// Number of polls that fit in the release window, at least one.
    pub fn attempts(&self) -> usize {
        if self.interval.is_zero() {
            return 1;
        }
        let window = self.window.as_millis();
        let interval = self.interval.as_millis().max(1);
        window.div_ceil(interval).max(1) as usize
    }
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            window: RELEASE_WINDOW,
            interval: RELEASE_POLL_INTERVAL,
            force_clear_pause: FORCE_CLEAR_PAUSE,
            exit_pause: PROCESS_EXIT_PAUSE,
        }
    }
}

impl RestartConfig {
    /// Default settings rooted at `project_dir`.
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let log_dir = project_dir.join(LOG_DIR_NAME);
        Self {
            command: DEFAULT_COMMAND.iter().map(|part| part.to_string()).collect(),
            signature: DEFAULT_SIGNATURE.to_string(),
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            port_env: DEFAULT_PORT_ENV.to_string(),
            default_port: DEFAULT_PORT,
            backup_port: BACKUP_PORT,
            pid_file: project_dir.join(PID_FILE_NAME),
            log_file: log_dir.join(LOG_FILE_NAME),
            log_dir,
            sweep_signal: StopSignal::default(),
            env: BTreeMap::new(),
            health: HealthSettings::default(),
            release: ReleaseSettings::default(),
            project_dir,
        }
    }

    /// Applies a parsed configuration file on top of the defaults.
    ///
    /// `base` is the directory containing the configuration file.
    pub fn from_file(file: ConfigFile, base: &Path) -> Result<Self, RestartError> {
        let project_dir = match file.project_dir.as_deref() {
            Some(dir) => resolve_path(base, dir),
            None => base.to_path_buf(),
        };
        let mut config = Self::for_project(project_dir);

        if let Some(command) = file.command {
            if command.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(RestartError::InvalidConfig(
                    "`command` must name a program to run".into(),
                ));
            }
            config.command = command;
        }
        if let Some(signature) = file.signature {
            if signature.trim().is_empty() {
                return Err(RestartError::InvalidConfig(
                    "`signature` cannot be empty".into(),
                ));
            }
            config.signature = signature;
        }
        if let Some(name) = file.process_name {
            config.process_name = name;
        }
        if let Some(port_env) = file.port_env {
            config.port_env = port_env;
        }
        if let Some(port) = file.default_port {
            config.default_port = validate_port("default_port", port)?;
        }
        if let Some(port) = file.backup_port {
            config.backup_port = validate_port("backup_port", port)?;
        }
        if let Some(pid_file) = file.pid_file {
            config.pid_file = resolve_path(&config.project_dir, &pid_file);
        }
        if let Some(log_dir) = file.log_dir {
            config.log_dir = resolve_path(&config.project_dir, &log_dir);
        }
        config.log_file = config
            .log_dir
            .join(file.log_file.as_deref().unwrap_or(LOG_FILE_NAME));
        if let Some(signal) = file.sweep_signal {
            config.sweep_signal = signal;
        }
        if let Some(env) = file.env {
            config.env = env;
        }

        if let Some(health) = file.health {
            let settings = &mut config.health;
            if let Some(host) = health.host {
                settings.host = host;
            }
            if let Some(path) = health.path {
                settings.path = if path.starts_with('/') {
                    path
                } else {
                    format!("/{path}")
                };
            }
            if let Some(retries) = health.retries {
                settings.retries = retries.max(1);
            }
            apply_duration(&mut settings.interval, health.interval)?;
            apply_duration(&mut settings.timeout, health.timeout)?;
            apply_duration(&mut settings.initial_delay, health.initial_delay)?;
        }

        if let Some(release) = file.release {
            let settings = &mut config.release;
            apply_duration(&mut settings.window, release.window)?;
            apply_duration(&mut settings.interval, release.interval)?;
            apply_duration(&mut settings.force_clear_pause, release.force_clear_pause)?;
            apply_duration(&mut settings.exit_pause, release.exit_pause)?;
        }

        Ok(config)
    }

    /// Human-readable form of the launch command.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

fn validate_port(field: &str, port: u16) -> Result<u16, RestartError> {
    if port == 0 {
        return Err(RestartError::InvalidConfig(format!(
            "`{field}` must be between 1 and 65535"
        )));
    }
    Ok(port)
}

fn apply_duration(target: &mut Duration, raw: Option<String>) -> Result<(), RestartError> {
    if let Some(raw) = raw {
        *target = parse_duration(&raw)?;
    }
    Ok(())
}

fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Parses a duration string in the format `<number>[ms|s|m|h]`. Bare numbers are seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, RestartError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(RestartError::InvalidConfig(
            "Duration value cannot be empty".into(),
        ));
    }

    let invalid = || RestartError::InvalidConfig(format!("Invalid duration value: '{raw}'"));

    if let Some(stripped) = value.strip_suffix("ms") {
        let amount: u64 = stripped.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_millis(amount));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str.parse().map_err(|_| invalid())?;
    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

/// Expands `$VAR` and `${VAR}` references using the current environment.
///
/// References to `keep` are left as written; the launcher fills them in with
/// the chosen port.
fn expand_env_vars(input: &str, keep: &str) -> Result<String, RestartError> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?")
        .map_err(|err| RestartError::InvalidConfig(err.to_string()))?;

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        if var_name == keep {
            return caps[0].to_string();
        }
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var_name) => Err(RestartError::MissingEnvVar(var_name)),
        None => Ok(result.into_owned()),
    }
}

/// The `port_env` named in the raw file, before any expansion.
fn declared_port_env(content: &str) -> String {
    serde_yaml::from_str::<serde_yaml::Value>(content)
        .ok()
        .and_then(|value| value.get("port_env")?.as_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_PORT_ENV.to_string())
}

/// Loads the restart configuration.
///
/// With an explicit path the file must exist. Without one, `relaunch.yaml` in
/// the current directory is used when present; otherwise the built-in defaults
/// apply with the current directory as the project root.
pub fn load_config(config_path: Option<&str>) -> Result<RestartConfig, RestartError> {
    let cwd = env::current_dir().map_err(|source| RestartError::ConfigReadError {
        path: PathBuf::from("."),
        source,
    })?;

    let path = match config_path {
        Some(path) => resolve_path(&cwd, path),
        None => {
            let candidate = cwd.join(CONFIG_FILE_NAME);
            if !candidate.exists() {
                return Ok(RestartConfig::for_project(cwd));
            }
            candidate
        }
    };

    let content = fs::read_to_string(&path).map_err(|source| RestartError::ConfigReadError {
        path: path.clone(),
        source,
    })?;
    let expanded = expand_env_vars(&content, &declared_port_env(&content))?;
    let file: ConfigFile = if expanded.trim().is_empty() {
        ConfigFile::default()
    } else {
        serde_yaml::from_str(&expanded)?
    };

    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.clone());
    RestartConfig::from_file(file, &base)
}

#[path = "common/mod.rs"]
mod common;

use std::{fs, path::Path};

use common::{
    free_port, is_process_alive, read_marker, stop_process, wait_for_log_line,
    wait_for_process_exit, write_config,
};
use relaunch::{
    config::{RestartConfig, load_config},
    console::Console,
    error::RestartError,
    health::{HealthProbe, HttpProbe, ProbeResult},
    launcher::ServiceLauncher,
    orchestrator::Restarter,
    system::{SystemPorts, SystemProcesses},
};
use tempfile::tempdir;

/// Service stand-in: dumps its environment to the log, then idles.
fn config_for(dir: &Path, idle: &str) -> RestartConfig {
    let yaml = format!(
        r#"command: ["sh", "-c", "env; exec sleep {idle}"]
signature: "sleep {idle}"
process_name: "sleep"
env:
  RELAUNCH_STAGE: "integration"
health:
  host: "127.0.0.1"
  retries: 2
  interval: "50ms"
  timeout: "500ms"
  initial_delay: "0ms"
release:
  window: "500ms"
  interval: "100ms"
  force_clear_pause: "0ms"
  exit_pause: "200ms"
"#
    );
    let path = write_config(dir, &yaml);
    load_config(Some(path.to_str().unwrap())).expect("load config")
}

/// Reports healthy without touching the network.
struct AlwaysHealthy;

impl HealthProbe for AlwaysHealthy {
    fn probe(&self, _port: u16) -> ProbeResult {
        ProbeResult::Healthy
    }

    fn url(&self, port: u16) -> String {
        format!("http://127.0.0.1:{port}/")
    }
}

#[test]
fn restart_replaces_the_tracked_instance() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_for(temp.path(), "314.15");
    let port = free_port();

    let processes = SystemProcesses::new();
    let ports = SystemPorts::new();
    let launcher = ServiceLauncher::new(&config);
    let restarter = Restarter::new(
        &config,
        &processes,
        &ports,
        &launcher,
        &AlwaysHealthy,
        Console::new(false),
    );

    let first = restarter.run(port).expect("first restart");
    assert!(first.healthy);
    assert_eq!(first.port, port);
    assert_eq!(read_marker(&config.pid_file), first.pid);

    let log = wait_for_log_line(&config.log_file, &format!("PORT={port}"));
    assert!(log.contains(&format!("starting on port {port}")));
    assert!(log.contains("RELAUNCH_STAGE=integration"));

    let second = restarter.run(port).expect("second restart");
    assert_ne!(second.pid, first.pid);
    assert_eq!(read_marker(&config.pid_file), second.pid);
    wait_for_process_exit(first.pid);

    let log = fs::read_to_string(&config.log_file).expect("read log");
    assert_eq!(log.matches("--- relaunch ").count(), 2, "log should be appended to");

    stop_process(second.pid);
}

#[test]
fn unhealthy_service_is_left_running() {
    let temp = tempdir().expect("failed to create tempdir");
    let config = config_for(temp.path(), "314.16");
    let port = free_port();

    let processes = SystemProcesses::new();
    let ports = SystemPorts::new();
    let launcher = ServiceLauncher::new(&config);
    let probe = HttpProbe::new(&config.health).expect("build probe");
    let restarter = Restarter::new(
        &config,
        &processes,
        &ports,
        &launcher,
        &probe,
        Console::new(false),
    );

    let summary = restarter.run(port).expect("launch should succeed");

    assert!(!summary.healthy);
    assert!(is_process_alive(summary.pid));
    assert_eq!(read_marker(&config.pid_file), summary.pid);

    stop_process(summary.pid);
}

#[test]
fn missing_program_fails_without_marker() {
    let temp = tempdir().expect("failed to create tempdir");
    let path = write_config(
        temp.path(),
        r#"command: ["/nonexistent/relaunch-service"]
signature: "relaunch-service-never-running"
health:
  initial_delay: "0ms"
release:
  exit_pause: "0ms"
"#,
    );
    let config = load_config(Some(path.to_str().unwrap())).expect("load config");

    let processes = SystemProcesses::new();
    let ports = SystemPorts::new();
    let launcher = ServiceLauncher::new(&config);
    let restarter = Restarter::new(
        &config,
        &processes,
        &ports,
        &launcher,
        &AlwaysHealthy,
        Console::new(false),
    );

    let err = restarter.run(free_port()).unwrap_err();

    assert!(matches!(err, RestartError::LaunchError { .. }));
    assert!(!config.pid_file.exists());
}

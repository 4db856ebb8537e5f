#[path = "common/mod.rs"]
mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::{free_port, is_process_alive, read_marker, stop_process, write_config};
use predicates::{boolean::PredicateBooleanExt, str::contains};
use std::fs;
use tempfile::tempdir;

#[test]
fn invalid_port_is_rejected_before_any_work() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();

    cargo_bin_cmd!("relaunch")
        .current_dir(dir)
        .arg("abc")
        .assert()
        .code(2)
        .stderr(contains("invalid port number 'abc'"));

    cargo_bin_cmd!("relaunch")
        .current_dir(dir)
        .arg("0")
        .assert()
        .code(2);

    assert!(!dir.join("log").exists());
    assert!(!dir.join(".server.pid").exists());
}

#[test]
fn help_lists_default_and_backup_ports() {
    cargo_bin_cmd!("relaunch")
        .arg("--help")
        .assert()
        .success()
        .stdout(
            contains("Built-in default port: 8080")
                .and(contains("Built-in backup port:  8081"))
                .and(contains("take precedence")),
        );
}

#[test]
fn version_flag_succeeds() {
    cargo_bin_cmd!("relaunch")
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("relaunch"));
}

#[test]
fn missing_config_file_fails() {
    let temp = tempdir().expect("failed to create tempdir");

    cargo_bin_cmd!("relaunch")
        .current_dir(temp.path())
        .args(["--config", "nope.yaml", "--dry-run"])
        .assert()
        .code(1)
        .stderr(contains("nope.yaml"));
}

#[test]
fn dry_run_changes_nothing() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    write_config(
        dir,
        r#"command: ["sleep", "271.828"]
signature: "sleep 271.828"
process_name: "sleep"
"#,
    );
    fs::write(dir.join(".server.pid"), "garbage\n").expect("write marker");
    let port = free_port();
    let port_arg = port.to_string();

    cargo_bin_cmd!("relaunch")
        .current_dir(dir)
        .args([port_arg.as_str(), "--dry-run", "--no-color"])
        .assert()
        .success()
        .stdout(
            contains("Planned actions (dry run)")
                .and(contains("Would remove the invalid PID marker"))
                .and(contains(format!("[ok] Would launch on port {port}")))
                .and(contains("\x1b[").not()),
        );

    assert!(!dir.join("log").exists());
    assert_eq!(
        fs::read_to_string(dir.join(".server.pid")).expect("marker kept"),
        "garbage\n"
    );
}

#[test]
fn unhealthy_launch_exits_nonzero_and_keeps_service() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    write_config(
        dir,
        r#"command: ["sh", "-c", "echo 'Error: listen EADDRINUSE: address already in use'; exec sleep 271.829"]
signature: "sleep 271.829"
process_name: "sleep"
health:
  host: "127.0.0.1"
  retries: 1
  timeout: "500ms"
  initial_delay: "200ms"
release:
  exit_pause: "0ms"
"#,
    );
    let port_arg = free_port().to_string();

    cargo_bin_cmd!("relaunch")
        .current_dir(dir)
        .args([port_arg.as_str(), "--no-color"])
        .assert()
        .code(1)
        .stdout(
            contains("=== [6/6] Health check ===")
                .and(contains("Restart may have failed"))
                .and(contains("tail -30"))
                .and(contains("try `relaunch 8081`")),
        );

    let pid = read_marker(&dir.join(".server.pid"));
    assert!(is_process_alive(pid), "service should outlive relaunch");
    stop_process(pid);
}

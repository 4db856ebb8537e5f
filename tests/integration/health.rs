#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use common::{free_port, serve_status};
use relaunch::{
    config::HealthSettings,
    health::{HealthProbe, HttpProbe, ProbeResult, wait_until_healthy},
};

fn loopback_settings() -> HealthSettings {
    HealthSettings {
        host: "127.0.0.1".into(),
        timeout: Duration::from_secs(2),
        ..HealthSettings::default()
    }
}

#[test]
fn http_200_is_healthy() {
    let port = serve_status("200 OK");
    let probe = HttpProbe::new(&loopback_settings()).expect("build probe");

    assert_eq!(probe.probe(port), ProbeResult::Healthy);

    let report = wait_until_healthy(&probe, port, 3, Duration::from_millis(10), |_, _| {
        panic!("a healthy service should not be retried")
    });
    assert!(report.healthy);
    assert_eq!(report.attempts, 1);
}

#[test]
fn server_errors_are_unhealthy() {
    let port = serve_status("500 Internal Server Error");
    let probe = HttpProbe::new(&loopback_settings()).expect("build probe");

    assert_eq!(probe.probe(port), ProbeResult::Unhealthy(500));
}

#[test]
fn other_success_codes_are_not_enough() {
    let port = serve_status("204 No Content");
    let probe = HttpProbe::new(&loopback_settings()).expect("build probe");

    assert_eq!(probe.probe(port), ProbeResult::Unhealthy(204));
}

#[test]
fn closed_port_exhausts_every_retry() {
    let port = free_port();
    let probe = HttpProbe::new(&loopback_settings()).expect("build probe");

    let mut retries_seen = Vec::new();
    let report = wait_until_healthy(&probe, port, 3, Duration::from_millis(10), |attempt, total| {
        retries_seen.push((attempt, total))
    });

    assert!(!report.healthy);
    assert_eq!(report.attempts, 3);
    assert!(matches!(report.last, Some(ProbeResult::Unreachable(_))));
    assert_eq!(retries_seen, vec![(1, 3), (2, 3)]);
}

#[test]
fn url_uses_configured_path() {
    let settings = HealthSettings {
        path: "/healthz".into(),
        ..loopback_settings()
    };
    let probe = HttpProbe::new(&settings).expect("build probe");

    assert_eq!(probe.url(9000), "http://127.0.0.1:9000/healthz");
}

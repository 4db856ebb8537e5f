//! Stage 6: confirm the relaunched service answers HTTP.
use std::{thread, time::Duration};

use reqwest::{StatusCode, blocking::Client};
use tracing::debug;

use crate::{config::HealthSettings, error::RestartError};

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// HTTP 200.
    Healthy,
    /// The service answered with another status.
    Unhealthy(u16),
    /// Connection refused, timeout or any other transport error.
    Unreachable(String),
}

/// Performs one health probe against a port.
pub trait HealthProbe {
    /// Probes `port` once.
    fn probe(&self, port: u16) -> ProbeResult;

    /// URL an operator can open to reach the service on `port`.
    fn url(&self, port: u16) -> String;
}

/// `GET http://<host>:<port><path>` with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    host: String,
    path: String,
}

impl HttpProbe {
    /// Builds the probe and its HTTP client.
    pub fn new(settings: &HealthSettings) -> Result<Self, RestartError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            host: settings.host.clone(),
            path: settings.path.clone(),
        })
    }
}

impl HealthProbe for HttpProbe {
    fn probe(&self, port: u16) -> ProbeResult {
        let url = self.url(port);
        match self.client.get(&url).send() {
            Ok(response) if response.status() == StatusCode::OK => ProbeResult::Healthy,
            Ok(response) => ProbeResult::Unhealthy(response.status().as_u16()),
            Err(err) => {
                debug!("Health probe against {url} failed: {err}");
                ProbeResult::Unreachable(err.to_string())
            }
        }
    }

    fn url(&self, port: u16) -> String {
        format!("http://{}:{port}{}", self.host, self.path)
    }
}

/// Outcome of the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Whether a probe returned HTTP 200.
    pub healthy: bool,
    /// Probes performed.
    pub attempts: usize,
    /// Result of the final probe.
    pub last: Option<ProbeResult>,
}

/// Probes `port` up to `retries` times, sleeping `interval` between attempts.
///
/// `on_retry(attempt, retries)` runs after every failed attempt that will be
/// followed by another one.
pub fn wait_until_healthy(
    probe: &dyn HealthProbe,
    port: u16,
    retries: usize,
    interval: Duration,
    mut on_retry: impl FnMut(usize, usize),
) -> HealthReport {
    let retries = retries.max(1);
    let mut last = None;

    for attempt in 1..=retries {
        let result = probe.probe(port);
        if result == ProbeResult::Healthy {
            debug!("Health check passed on attempt {attempt}");
            return HealthReport {
                healthy: true,
                attempts: attempt,
                last: Some(result),
            };
        }

        debug!("Health check attempt {attempt}/{retries} failed: {result:?}");
        last = Some(result);

        if attempt < retries {
            on_retry(attempt, retries);
            thread::sleep(interval);
        }
    }

    HealthReport {
        healthy: false,
        attempts: retries,
        last,
    }
}

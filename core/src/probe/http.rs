use std::net::IpAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use edgerank_common::config::{ColoSet, HttpConfig};
use edgerank_common::network::result::ProbeResult;
use reqwest::header::CONNECTION;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::colo::detect_colo;
use super::{Prober, pinned_client};

/// Statuses accepted when no valid status code is configured.
const DEFAULT_ACCEPTED: [u16; 3] = [200, 301, 302];

/// Times HEAD requests against a fixed URL, resolving its host to each candidate.
#[derive(Debug, Clone)]
pub struct HttpProber {
    pub url: String,
    pub port: u16,
    pub attempts: u32,
    pub timeout: Duration,
    pub status_code: u16,
    pub colo_filter: ColoSet,
}

impl From<&HttpConfig> for HttpProber {
    fn from(cfg: &HttpConfig) -> Self {
        Self {
            url: cfg.url.clone(),
            port: cfg.port,
            attempts: cfg.connect_times,
            timeout: cfg.connect_timeout,
            status_code: cfg.status_code,
            colo_filter: cfg.colo.clone(),
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, addr: IpAddr) -> ProbeResult {
        let mut result = ProbeResult::new(addr);
        result.sent = self.attempts;

        let client = match pinned_client(addr, self.port, self.timeout, Policy::none()) {
            Ok(client) => client,
            Err(e) => {
                debug!("{addr}: building client failed: {e}");
                return result;
            }
        };

        let Some(colo) = self.qualify(&client, addr).await else {
            return result;
        };
        result.colo = colo;

        let mut total = Duration::ZERO;
        for attempt in 0..self.attempts {
            let mut request = client.head(&self.url);
            if attempt + 1 == self.attempts {
                request = request.header(CONNECTION, "close");
            }

            let start = Instant::now();
            match request.send().await {
                Ok(response) => {
                    let _ = response.bytes().await;
                    total += start.elapsed();
                    result.received += 1;
                }
                Err(e) => debug!("{addr}: HEAD {} failed: {e}", self.url),
            }
        }

        if result.received > 0 {
            result.delay = total / result.received;
        }
        result
    }
}

impl HttpProber {
    /// Sends the qualifying HEAD. `None` aborts the probe; `Some(colo)` carries the
    /// detected colo, if any.
    async fn qualify(&self, client: &Client, addr: IpAddr) -> Option<Option<String>> {
        let response = match client.head(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("{addr}: HEAD {} failed: {e}", self.url);
                return None;
            }
        };

        let status = response.status();
        if !accepts_status(status, self.status_code) {
            debug!("{addr}: rejected status {status}");
            return None;
        }

        let colo = detect_colo(response.headers());
        let _ = response.bytes().await;

        if !self.colo_filter.is_empty() {
            match colo.as_deref() {
                Some(code) if self.colo_filter.contains(code) => {}
                other => {
                    debug!("{addr}: colo {} not wanted", other.unwrap_or("unknown"));
                    return None;
                }
            }
        }
        Some(colo)
    }
}

/// A configured code in `100..=599` must match exactly; anything else falls back to
/// 200, 301 or 302.
pub fn accepts_status(status: StatusCode, configured: u16) -> bool {
    if (100..=599).contains(&configured) {
        status.as_u16() == configured
    } else {
        DEFAULT_ACCEPTED.contains(&status.as_u16())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

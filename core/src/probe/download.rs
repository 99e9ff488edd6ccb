//! Download-throughput probing.
//!
//! Unlike the latency probes this phase runs one candidate at a time over the top of
//! the primary ranking, so candidates never compete for the same link.

use std::net::IpAddr;
use std::time::Instant;

use edgerank_common::config::DownloadConfig;
use edgerank_common::network::result::ResultSet;
use reqwest::StatusCode;
use reqwest::redirect::{Action, Attempt, Policy};
use tracing::debug;

use super::colo::detect_colo;
use super::pinned_client;
use crate::progress::{self, Phase, Progress, ProgressEvent};

pub const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadOutcome {
    /// Bytes per second, averaged over all attempts.
    pub throughput: f64,
    pub colo: Option<String>,
}

/// Follows redirects until more than [`MAX_REDIRECTS`] requests came before, then hands
/// back the last response as-is.
pub fn redirect_policy() -> Policy {
    Policy::custom(redirect_step)
}

fn redirect_step(attempt: Attempt) -> Action {
    if attempt.previous().len() > MAX_REDIRECTS {
        attempt.stop()
    } else {
        attempt.follow()
    }
}

/// Downloads `cfg.url` from `addr` `cfg.test_times` times. Failed attempts score zero.
pub async fn download_probe(addr: IpAddr, cfg: &DownloadConfig) -> DownloadOutcome {
    let mut outcome = DownloadOutcome::default();
    if cfg.test_times == 0 {
        return outcome;
    }

    let mut total = 0.0;
    for _ in 0..cfg.test_times {
        let (throughput, colo) = download_once(addr, cfg).await;
        total += throughput;
        if outcome.colo.is_none() {
            outcome.colo = colo;
        }
    }
    outcome.throughput = total / f64::from(cfg.test_times);
    outcome
}

async fn download_once(addr: IpAddr, cfg: &DownloadConfig) -> (f64, Option<String>) {
    let client = match pinned_client(addr, cfg.port, cfg.timeout, redirect_policy()) {
        Ok(client) => client,
        Err(e) => {
            debug!("{addr}: building client failed: {e}");
            return (0.0, None);
        }
    };

    let mut response = match client.get(&cfg.url).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("{addr}: GET {} failed: {e}", cfg.url);
            return (0.0, None);
        }
    };
    let start = Instant::now();

    if response.status() != StatusCode::OK {
        debug!(
            "{addr}: download stopped with status {} at {}",
            response.status(),
            response.url()
        );
        return (0.0, None);
    }

    let colo = detect_colo(response.headers());
    let declared = response.content_length();

    let mut read: u64 = 0;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => read += chunk.len() as u64,
            Ok(None) => break,
            Err(e) => {
                debug!("{addr}: reading body failed after {read} bytes: {e}");
                return (0.0, None);
            }
        }
    }

    if declared != Some(read) {
        debug!("{addr}: read {read} bytes, declared {declared:?}");
        return (0.0, None);
    }
    (throughput(read, start.elapsed().as_secs_f64()), colo)
}

fn throughput(bytes: u64, secs: f64) -> f64 {
    if secs > 0.0 { bytes as f64 / secs } else { 0.0 }
}

/// Measures the first `cfg.test_ip_num` results in order, filling throughput and any
/// missing colo in place.
pub async fn download_phase(
    results: &mut ResultSet,
    cfg: &DownloadConfig,
    progress: Option<Progress>,
) {
    let count = cfg.test_ip_num.min(results.len());
    progress::report(
        &progress,
        ProgressEvent::Started {
            phase: Phase::Download,
            total: count,
        },
    );

    for result in results.iter_mut().take(count) {
        let outcome = download_probe(result.addr, cfg).await;
        result.throughput = outcome.throughput;
        if result.colo.is_none() {
            result.colo = outcome.colo;
        }
        progress::report(&progress, ProgressEvent::Advanced { phase: Phase::Download });
    }

    progress::report(&progress, ProgressEvent::Finished { phase: Phase::Download });
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn config(port: u16, times: u32) -> DownloadConfig {
        DownloadConfig {
            test_ip_num: 2,
            test_times: times,
            timeout: Duration::from_millis(500),
            url: format!("http://edge.test:{port}/file"),
            port,
        }
    }

    #[test]
    fn throughput_guards_zero_elapsed() {
        assert_eq!(throughput(1024, 0.0), 0.0);
        assert_eq!(throughput(2048, 2.0), 1024.0);
    }

    #[tokio::test]
    async fn failed_attempts_average_to_zero() {
        let port = closed_port().await;
        let outcome = download_probe(IpAddr::V4(Ipv4Addr::LOCALHOST), &config(port, 3)).await;
        assert_eq!(outcome, DownloadOutcome::default());
    }

    #[tokio::test]
    async fn zero_attempts_do_nothing() {
        let outcome = download_probe(IpAddr::V4(Ipv4Addr::LOCALHOST), &config(9, 0)).await;
        assert_eq!(outcome.throughput, 0.0);
    }

    #[tokio::test]
    async fn phase_only_touches_the_top() {
        let port = closed_port().await;
        let mut results = ResultSet::from_addrs(
            (1..=4).map(|n| IpAddr::V4(Ipv4Addr::new(127, 0, 0, n))),
        );
        for result in results.iter_mut() {
            result.throughput = 7.0;
        }
        results[0].colo = Some("SJC".to_string());

        download_phase(&mut results, &config(port, 1), None).await;

        assert_eq!(results[0].throughput, 0.0);
        assert_eq!(results[1].throughput, 0.0);
        assert_eq!(results[2].throughput, 7.0);
        assert_eq!(results[3].throughput, 7.0);
        assert_eq!(results[0].colo.as_deref(), Some("SJC"));
    }
}

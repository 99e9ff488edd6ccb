//! The probing **abstraction**.
//!
//! Every probe talks to one candidate address while keeping the logical target
//! hostname in the request. For HTTP that means the request URL (and so the `Host`
//! header and TLS SNI) stays untouched, and only name resolution is pinned to the
//! candidate. That is what lets a single URL be measured against many addresses.
//!
//! The latency phase fans one [`Prober`] out over all candidates through the
//! [`WorkerPool`]; the download phase is sequential and lives in [`download`].

use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edgerank_common::config::{Config, TestMode};
use edgerank_common::network::result::{ProbeResult, ResultSet};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use tokio::sync::oneshot;

use crate::pool::{PoolError, WorkerPool};
use crate::progress::{self, Phase, Progress, ProgressEvent};

pub mod colo;
pub mod download;
pub mod http;
pub mod tcp;

pub use http::HttpProber;
pub use tcp::TcpProber;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.80 Safari/537.36";

/// Measures the latency of a single candidate.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: IpAddr) -> ProbeResult;
}

/// Picks the latency prober for the configured mode, with its pool size.
pub fn latency_prober(cfg: &Config) -> (Arc<dyn Prober>, usize) {
    match cfg.test_mode {
        TestMode::Tcp => (Arc::new(TcpProber::from(&cfg.tcp)), cfg.tcp.routines),
        TestMode::Http => (Arc::new(HttpProber::from(&cfg.http)), cfg.http.routines),
    }
}

/// Probes every candidate on a pool of `workers`, returning results in candidate order.
pub async fn probe_all(
    prober: Arc<dyn Prober>,
    candidates: &[IpAddr],
    workers: usize,
    progress: Option<Progress>,
) -> Result<ResultSet, PoolError> {
    let pool = WorkerPool::new(workers);
    let mut slots = Vec::with_capacity(candidates.len());
    progress::report(
        &progress,
        ProgressEvent::Started {
            phase: Phase::Latency,
            total: candidates.len(),
        },
    );

    for &addr in candidates {
        let (slot, slot_rx) = oneshot::channel::<ProbeResult>();
        let prober = prober.clone();
        let progress = progress.clone();
        let task = async move {
            let result = prober.probe(addr).await;
            let _ = slot.send(result);
            progress::report(&progress, ProgressEvent::Advanced { phase: Phase::Latency });
        };
        if let Err(e) = pool.submit(task).await {
            pool.stop().await;
            return Err(e);
        }
        slots.push((addr, slot_rx));
    }
    pool.wait().await;
    progress::report(&progress, ProgressEvent::Finished { phase: Phase::Latency });

    let mut results = ResultSet::new();
    for (addr, slot_rx) in slots {
        results.push(slot_rx.await.unwrap_or_else(|_| ProbeResult::new(addr)));
    }
    Ok(results)
}

/// Resolves every hostname to the candidate, whatever the URL asks for.
///
/// A port spelled out in the URL still wins over `addr`'s port.
struct PinnedResolver(SocketAddr);

impl Resolve for PinnedResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        let addrs: Addrs = Box::new(std::iter::once(self.0));
        Box::pin(std::future::ready(Ok::<_, Box<dyn Error + Send + Sync>>(addrs)))
    }
}

/// An HTTP client whose connections all go to `addr:port`.
pub(crate) fn pinned_client(
    addr: IpAddr,
    port: u16,
    timeout: Duration,
    redirect: Policy,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .dns_resolver(Arc::new(PinnedResolver(SocketAddr::new(addr, port))))
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(redirect)
        .referer(false)
        .no_proxy()
        .build()
}

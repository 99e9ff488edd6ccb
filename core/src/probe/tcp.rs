use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use edgerank_common::config::TcpConfig;
use edgerank_common::network::result::ProbeResult;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::Prober;

/// Times plain TCP handshakes.
#[derive(Debug, Clone)]
pub struct TcpProber {
    pub port: u16,
    pub attempts: u32,
    pub connect_timeout: Duration,
}

impl From<&TcpConfig> for TcpProber {
    fn from(cfg: &TcpConfig) -> Self {
        Self {
            port: cfg.port,
            attempts: cfg.connect_times,
            connect_timeout: cfg.connect_timeout,
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: IpAddr) -> ProbeResult {
        handshake_probe(addr, self.port, self.attempts, self.connect_timeout).await
    }
}

/// Connects `attempts` times. Failed or timed-out connects count as lost and add no time.
pub async fn handshake_probe(
    addr: IpAddr,
    port: u16,
    attempts: u32,
    connect_timeout: Duration,
) -> ProbeResult {
    let socket_addr: SocketAddr = SocketAddr::new(addr, port);
    let mut result = ProbeResult::new(addr);
    result.sent = attempts;

    let mut total = Duration::ZERO;
    for _ in 0..attempts {
        let start = Instant::now();
        match timeout(connect_timeout, TcpStream::connect(socket_addr)).await {
            Ok(Ok(_stream)) => {
                total += start.elapsed();
                result.received += 1;
            }
            Ok(Err(e)) => debug!("{socket_addr}: connect failed: {e}"),
            Err(_elapsed) => debug!("{socket_addr}: connect timed out"),
        }
    }

    if result.received > 0 {
        result.delay = total / result.received;
    }
    result
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

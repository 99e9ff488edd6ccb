//! A tiny HTTP/1.1 server on 127.0.0.1 that answers every request with one canned
//! response. Good enough for HEAD and GET probes, keep-alive included.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Content-Length to announce; the real body length when `None`. Announcing more
    /// than the body makes the server hang up early.
    pub declared_len: Option<usize>,
}

impl StubResponse {
    pub fn ok() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            declared_len: None,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn declared_len(mut self, len: usize) -> Self {
        self.declared_len = Some(len);
        self
    }

    /// Headers a Cloudflare edge in San Jose would send.
    pub fn cloudflare_sjc(self) -> Self {
        self.header("server", "cloudflare")
            .header("cf-ray", "7bd32409eda7b020-SJC")
    }
}

pub struct StubServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(response: StubResponse) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind stub server");
        let addr = listener.local_addr().expect("stub server address");
        let hits = Arc::new(AtomicUsize::new(0));
        let response = Arc::new(response);

        let task = {
            let hits = hits.clone();
            tokio::spawn(async move {
                while let Ok((conn, _)) = listener.accept().await {
                    tokio::spawn(handle(conn, response.clone(), hits.clone()));
                }
            })
        };
        Self { addr, hits, task }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `http://edge.test:<port><path>`. The host never resolves; probes pin it.
    pub fn url(&self, path: &str) -> String {
        format!("http://edge.test:{}{}", self.port(), path)
    }

    /// Requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(mut conn: TcpStream, response: Arc<StubResponse>, hits: Arc<AtomicUsize>) {
    let mut pending: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let head_end = loop {
            if let Some(pos) = find_head_end(&pending) {
                break pos;
            }
            match conn.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
            }
        };
        let head = String::from_utf8_lossy(&pending[..head_end]).to_ascii_lowercase();
        pending.drain(..head_end + 4);
        hits.fetch_add(1, Ordering::SeqCst);

        let is_head = head.starts_with("head ");
        let close = head.contains("connection: close");
        let declared = response.declared_len.unwrap_or(response.body.len());

        let mut out = format!(
            "HTTP/1.1 {} {}\r\ncontent-length: {}\r\n",
            response.status,
            reason(response.status),
            declared
        );
        for (name, value) in &response.headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        if close {
            out.push_str("connection: close\r\n");
        }
        out.push_str("\r\n");

        let mut bytes = out.into_bytes();
        if !is_head {
            bytes.extend_from_slice(&response.body);
        }
        if conn.write_all(&bytes).await.is_err() {
            return;
        }
        let short_body = !is_head && declared != response.body.len();
        if close || short_body {
            let _ = conn.shutdown().await;
            return;
        }
    }
}

fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

//! Pinning hostnames to the winning address in the platform hosts file.

use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

#[cfg(windows)]
const SYSTEM_HOSTS: &str = r"C:\Windows\System32\drivers\etc\hosts";
#[cfg(not(windows))]
const SYSTEM_HOSTS: &str = "/etc/hosts";

/// Where the best address ends up once a run is done.
pub trait NameResolutionSink {
    fn update(&self, best: IpAddr, hostnames: &[String]) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsFile {
    path: PathBuf,
}

impl HostsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The operating system's hosts file.
    pub fn system() -> Self {
        Self::new(SYSTEM_HOSTS)
    }
}

impl NameResolutionSink for HostsFile {
    /// Only rewrites existing entries; hostnames without a line are left alone.
    fn update(&self, best: IpAddr, hostnames: &[String]) -> anyhow::Result<()> {
        if hostnames.is_empty() {
            return Ok(());
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading hosts file {}", self.path.display()))?;
        let (rewritten, changed) = rewrite_hosts(&text, best, hostnames);
        fs::write(&self.path, rewritten)
            .with_context(|| format!("writing hosts file {}", self.path.display()))?;
        info!("Pinned {changed} hosts entries to {best}");
        Ok(())
    }
}

/// Points every IPv4 entry for one of `hostnames` at `best`. Lines come back trimmed,
/// each ending in a newline. Returns the new text and the number of replaced lines.
pub fn rewrite_hosts(text: &str, best: IpAddr, hostnames: &[String]) -> (String, usize) {
    let wanted: HashSet<String> = hostnames.iter().map(|h| h.to_lowercase()).collect();
    let mut out = String::with_capacity(text.len());
    let mut changed = 0;

    for line in text.lines().map(str::trim) {
        match entry_host(line) {
            Some(host) if wanted.contains(&host) => {
                out.push_str(&format!("{best} {host}"));
                changed += 1;
            }
            _ => out.push_str(line),
        }
        out.push('\n');
    }
    (out, changed)
}

/// The lowercased hostname of an IPv4 entry, ignoring comments and short lines.
fn entry_host(line: &str) -> Option<String> {
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut fields = line.split_whitespace();
    let addr = fields.next()?;
    let host = fields.next()?;
    addr.parse::<Ipv4Addr>().ok()?;
    Some(host.to_lowercase())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

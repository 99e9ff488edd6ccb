//! Run configuration.
//!
//! Built once in `main` and handed to each component by reference. Stored on disk as
//! pretty-printed JSON; durations are written as milliseconds.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, ensure};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which latency probe runs against every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    /// Time a bare TCP handshake.
    #[default]
    Tcp,
    /// Time `HEAD` requests against the probe URL.
    Http,
}

impl FromStr for TestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(TestMode::Tcp),
            "http" => Ok(TestMode::Http),
            other => Err(format!("unknown test mode '{other}', expected 'tcp' or 'http'")),
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestMode::Tcp => f.write_str("tcp"),
            TestMode::Http => f.write_str("http"),
        }
    }
}

/// A set of colo codes.
///
/// Membership is unordered in memory; on the wire it is a sorted JSON array so
/// saved configs diff cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColoSet(HashSet<String>);

impl ColoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, colo: impl Into<String>) -> bool {
        self.0.insert(colo.into())
    }

    pub fn contains(&self, colo: &str) -> bool {
        self.0.contains(colo)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sorted(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.0.iter().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}

impl<S: Into<String>> FromIterator<S> for ColoSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Parses `"SJC, lax,NRT"` into `{SJC, LAX, NRT}`.
impl FromStr for ColoSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_ascii_uppercase)
            .collect())
    }
}

impl Serialize for ColoSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.sorted().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ColoSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let codes = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(codes.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub routines: usize,
    pub port: u16,
    pub connect_times: u32,
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            routines: 30,
            port: 443,
            connect_times: 3,
            connect_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Only keep candidates served from one of these colos. Empty disables the filter.
    pub colo: ColoSet,
    pub connect_times: u32,
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    pub routines: usize,
    /// Exact status to accept. Anything outside `100..=599` means "200, 301 or 302".
    pub status_code: u16,
    pub url: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            colo: ColoSet::new(),
            connect_times: 3,
            connect_timeout: Duration::from_secs(5),
            routines: 10,
            status_code: 200,
            url: String::new(),
            port: 443,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// How many of the best-ranked candidates get a download test.
    pub test_ip_num: usize,
    pub test_times: u32,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    pub url: String,
    pub port: u16,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            test_ip_num: 10,
            test_times: 1,
            timeout: Duration::from_secs(3),
            url: String::new(),
            port: 443,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_file: PathBuf,
    pub test_mode: TestMode,
    pub enable_download_test: bool,
    /// Hostnames to pin to the best address once the run completes.
    pub web_hosts: Vec<String>,
    /// Candidate quota for a run.
    pub test_ip_num: usize,
    /// Maximum rows kept in the result file.
    pub save_ip_num: usize,
    pub cidr_ipv4_file: PathBuf,
    pub allow_ipv4_file: PathBuf,
    pub deny_ipv4_file: PathBuf,
    pub tcp: TcpConfig,
    pub http: HttpConfig,
    pub download: DownloadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from("results.csv"),
            test_mode: TestMode::Tcp,
            enable_download_test: true,
            web_hosts: Vec::new(),
            test_ip_num: 100,
            save_ip_num: 100,
            cidr_ipv4_file: PathBuf::from("ip.txt"),
            allow_ipv4_file: PathBuf::from("allow_ipv4.rb"),
            deny_ipv4_file: PathBuf::from("deny_ipv4.rb"),
            tcp: TcpConfig::default(),
            http: HttpConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg = serde_json::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).with_context(|| format!("writing config file {}", path.display()))
    }

    /// Loads `path` if it exists, falling back to defaults, then writes the result back
    /// so new fields show up in the user's file.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        let cfg = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        cfg.save(path)?;
        Ok(cfg)
    }

    /// Rejects settings that would make a run hang or do nothing useful.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.test_mode {
            TestMode::Tcp => {
                ensure!(self.tcp.routines > 0, "tcp.routines must be at least 1");
                ensure!(self.tcp.connect_times > 0, "tcp.connect_times must be at least 1");
            }
            TestMode::Http => {
                ensure!(self.http.routines > 0, "http.routines must be at least 1");
                ensure!(self.http.connect_times > 0, "http.connect_times must be at least 1");
                ensure!(!self.http.url.is_empty(), "http.url is required in http mode");
            }
        }
        if self.enable_download_test {
            ensure!(self.download.test_times > 0, "download.test_times must be at least 1");
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
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

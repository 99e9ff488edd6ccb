use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use edgerank_common::config::{ColoSet, Config, TestMode};

#[derive(Parser)]
#[command(name = "edgerank")]
#[command(about = "Find the fastest CDN edge addresses and pin your hostnames to them.")]
pub struct CommandLine {
    /// JSON config file, created with defaults when missing
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Number of candidate addresses to probe
    #[arg(short = 'n', long = "count")]
    pub count: Option<usize>,

    /// Latency probe to use (tcp or http)
    #[arg(short, long)]
    pub mode: Option<TestMode>,

    /// Only keep HTTP results from these colos, e.g. "SJC,LAX"
    #[arg(long)]
    pub colo: Option<ColoSet>,

    /// Skip the download-throughput phase
    #[arg(long)]
    pub no_download: bool,

    /// Hosts file to rewrite instead of the system one
    #[arg(long)]
    pub hosts_file: Option<PathBuf>,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Loads the config file and applies flag overrides on top. Overrides only last for
    /// this run; the file keeps its own values.
    pub fn build_config(&self) -> anyhow::Result<Config> {
        let mut cfg = Config::load_or_default(&self.config)?;
        if let Some(count) = self.count {
            cfg.test_ip_num = count;
        }
        if let Some(mode) = self.mode {
            cfg.test_mode = mode;
        }
        if let Some(colo) = &self.colo {
            cfg.http.colo = colo.clone();
        }
        if self.no_download {
            cfg.enable_download_test = false;
        }
        cfg.validate()
            .with_context(|| format!("invalid config {}", self.config.display()))?;
        Ok(cfg)
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

//! # Run Orchestration
//!
//! One full measurement run, from the range file to the persisted result file:
//!
//! ```text
//! ranges + store + prior ──► select ──► latency probes (pooled) ──► merge prior speed
//!      ──► rank by delay/loss ──► download top-K ──► rank by speed/delay/loss
//!      ──► classify + persist
//! ```
//!
//! Pinning the winner into the hosts file is left to the caller through
//! [`pin_best`], after it has had a chance to show the results.

use anyhow::Context;
use edgerank_common::config::Config;
use edgerank_common::network::range::read_range_file;
use edgerank_common::network::result::ResultSet;
use edgerank_common::success;
use rand::Rng;
use tracing::{info, warn};

use crate::aggregate;
use crate::hosts::NameResolutionSink;
use crate::probe::{self, download};
use crate::progress::Progress;
use crate::selector::CandidateSelector;
use crate::store::ClassificationStore;

/// Runs the whole pipeline and returns the final ranking.
pub async fn run<R: Rng>(
    cfg: &Config,
    rng: R,
    progress: Option<Progress>,
) -> anyhow::Result<ResultSet> {
    let ranges = read_range_file(&cfg.cidr_ipv4_file)?;
    let mut store = ClassificationStore::load(&cfg.allow_ipv4_file, &cfg.deny_ipv4_file);
    let prior = ResultSet::load_prior(&cfg.output_file)
        .with_context(|| format!("reading previous results {}", cfg.output_file.display()))?;

    let candidates = CandidateSelector::new(rng).select(&ranges, cfg.test_ip_num, &store, &prior);
    info!(
        "Probing {} candidates from {} ranges in {} mode",
        candidates.len(),
        ranges.len(),
        cfg.test_mode
    );

    let (prober, workers) = probe::latency_prober(cfg);
    let mut results = probe::probe_all(prober, &candidates, workers, progress.clone())
        .await
        .context("latency phase")?;

    aggregate::merge_prior_throughput(&mut results, &prior);
    results.sort_by_delay_loss();

    if cfg.enable_download_test {
        if cfg.download.url.is_empty() {
            warn!("Download test enabled without download.url, skipping");
        } else {
            info!("Download test against {}", cfg.download.url);
            download::download_phase(&mut results, &cfg.download, progress).await;
        }
    }
    results.sort_by_throughput_delay_loss();

    aggregate::persist(&results, &cfg.output_file, cfg.save_ip_num, &mut store)?;
    let reachable = results.iter().filter(|r| r.is_reachable()).count();
    success!("Run complete: {reachable} of {} candidates answered", results.len());
    Ok(results)
}

/// Hands the top-ranked address to `sink`. Does nothing without results or hostnames.
pub fn pin_best(
    results: &ResultSet,
    hostnames: &[String],
    sink: &dyn NameResolutionSink,
) -> anyhow::Result<()> {
    let Some(best) = results.first() else {
        return Ok(());
    };
    if hostnames.is_empty() {
        return Ok(());
    }
    sink.update(best.addr, hostnames)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

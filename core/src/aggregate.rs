//! Folding probe results into rankings, the result file and the classification store.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use edgerank_common::network::result::ResultSet;
use tracing::debug;

use crate::store::ClassificationStore;

/// Candidates faster than this are remembered as allowed; everything else is denied.
pub const MAX_ALLOW_DELAY: Duration = Duration::from_millis(300);

/// Carries throughput measured by an earlier run over to matching addresses, so
/// candidates skipped by this run's download phase keep their last known speed.
pub fn merge_prior_throughput(results: &mut ResultSet, prior: &ResultSet) {
    let known: HashMap<IpAddr, f64> = prior.iter().map(|r| (r.addr, r.throughput)).collect();
    for result in results.iter_mut() {
        if let Some(&throughput) = known.get(&result.addr) {
            result.throughput = throughput;
        }
    }
}

/// Rows worth keeping: reachable results only, at most `max_rows` of them, in order.
pub fn persistable(results: &ResultSet, max_rows: usize) -> ResultSet {
    results
        .iter()
        .filter(|r| r.is_reachable())
        .take(max_rows)
        .cloned()
        .collect()
}

/// Records every IPv4 result as allowed or denied by its delay. Returns how many went
/// to each side.
pub fn classify(results: &ResultSet, store: &mut ClassificationStore) -> (usize, usize) {
    let (allow, deny): (Vec<_>, Vec<_>) = results
        .iter()
        .filter_map(|r| match r.addr {
            IpAddr::V4(v4) => Some((v4, r.delay < MAX_ALLOW_DELAY)),
            IpAddr::V6(_) => None,
        })
        .partition(|(_, allowed)| *allowed);

    let counts = (allow.len(), deny.len());
    store.allow.add_batch(allow.into_iter().map(|(ip, _)| ip));
    store.deny.add_batch(deny.into_iter().map(|(ip, _)| ip));
    counts
}

/// Saves the classification store, then the result file. Nothing is written to
/// `output` when there are no results at all.
pub fn persist(
    results: &ResultSet,
    output: &Path,
    max_rows: usize,
    store: &mut ClassificationStore,
) -> anyhow::Result<()> {
    let (allowed, denied) = classify(results, store);
    store.save().context("saving classification store")?;
    debug!("classified {allowed} allowed, {denied} denied");

    if results.is_empty() {
        return Ok(());
    }
    let rows = persistable(results, max_rows);
    rows.save(output)
        .with_context(|| format!("writing result file {}", output.display()))?;
    debug!("wrote {} rows to {}", rows.len(), output.display());
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

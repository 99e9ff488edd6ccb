//! # Candidate Selection
//!
//! Turns the published address ranges into this run's candidate list, steered by what
//! earlier runs learned:
//!
//! 1. Each range is walked upward from its first address, skipping denied addresses
//!    and taking everything else until the run-wide quota is used up. A range that
//!    comes early in the file can use the whole quota on its own.
//! 2. Allowed addresses seen during that walk are shuffled and a few of them are
//!    appended again, so known-good addresses get re-measured every run.
//! 3. Addresses from the previous result file are appended unless the ranges already
//!    produced them.

use std::net::{IpAddr, Ipv4Addr};

use edgerank_common::network::range::AddressRange;
use edgerank_common::network::result::ResultSet;
use rand::Rng;
use rand::seq::SliceRandom;
use roaring::RoaringBitmap;
use tracing::debug;

use crate::store::ClassificationStore;

/// Share of the quota spent on re-sampling allowed addresses, spread over all ranges.
pub const ALLOW_SAMPLE_RATIO: f64 = 0.1;

/// How many allowed addresses each range re-samples for a run of `quota` candidates.
pub fn per_range_sample(quota: usize, ranges: usize) -> usize {
    if ranges == 0 {
        return 1;
    }
    let budget = (quota as f64 * ALLOW_SAMPLE_RATIO).floor() as usize;
    (budget / ranges).max(1)
}

pub struct CandidateSelector<R: Rng> {
    rng: R,
}

impl<R: Rng> CandidateSelector<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn select(
        &mut self,
        ranges: &[AddressRange],
        quota: usize,
        store: &ClassificationStore,
        prior: &ResultSet,
    ) -> Vec<IpAddr> {
        let sample = per_range_sample(quota, ranges.len());
        let mut remaining = quota;
        let mut picked = RoaringBitmap::new();
        let mut candidates = Vec::new();

        for range in ranges {
            let mut allowed = Vec::new();
            for ip in range.iter() {
                if remaining == 0 {
                    break;
                }
                if store.is_denied(ip) {
                    continue;
                }
                if store.is_allowed(ip) {
                    allowed.push(ip);
                }
                picked.insert(ip);
                candidates.push(IpAddr::V4(Ipv4Addr::from(ip)));
                remaining -= 1;
            }

            allowed.shuffle(&mut self.rng);
            for &ip in allowed.iter().take(sample) {
                picked.insert(ip);
                candidates.push(IpAddr::V4(Ipv4Addr::from(ip)));
            }
        }

        let from_ranges = candidates.len();
        candidates.extend(prior.iter().map(|r| r.addr).filter(|addr| match addr {
            IpAddr::V4(v4) => !picked.contains(u32::from(*v4)),
            IpAddr::V6(_) => true,
        }));

        debug!(
            "selected {} candidates ({} from ranges, {} carried over)",
            candidates.len(),
            from_ranges,
            candidates.len() - from_ranges
        );
        candidates
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

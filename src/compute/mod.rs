/*!
Computations over loaded snapshots: per-snapshot statistics, pairwise diffs, origin listings and
origin lifetimes.

All computers are plain values borrowing a [ReservedRanges] table, so worker threads can each hold
their own without sharing mutable state.
*/
mod diff;
mod stats;
mod ttl;

pub use diff::DiffComputer;
pub use stats::StatsComputer;
pub use ttl::OriginTtlTracker;

use crate::models::{Afi, OriginEntry, OriginsResult, Snapshot};

/// Lists every prefix of both families with its origin set, in prefix order.
pub fn compute_origins(snapshot: &Snapshot) -> OriginsResult {
    let meta = snapshot.meta();
    let entries = Afi::all()
        .iter()
        .flat_map(|afi| snapshot.trie(*afi).iter())
        .map(|(prefix, origins)| OriginEntry {
            prefix,
            origins: origins.clone(),
        })
        .collect();
    OriginsResult {
        timestamp: meta.timestamp,
        collector: meta.collector,
        subtype: meta.subtype.clone(),
        entries,
    }
}

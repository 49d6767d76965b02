use crate::models::{Afi, CollectorType, OriginSet, Prefix, SnapshotMeta};
use serde::Serialize;

/// Summary of one distribution: min, max, mean and (upper-middle) median.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DistStats {
    pub min: u128,
    pub max: u128,
    pub mean: f64,
    pub median: u128,
}

impl DistStats {
    /// Summarizes `values`. The median is the element at index `n / 2` of the sorted values, so
    /// even-length inputs take the upper of the two middle elements. An empty input is treated
    /// as a single zero sample.
    pub fn from_values(mut values: Vec<u128>) -> DistStats {
        if values.is_empty() {
            values.push(0);
        }
        values.sort_unstable();
        let sum: f64 = values.iter().map(|v| *v as f64).sum();
        DistStats {
            min: values[0],
            max: values[values.len() - 1],
            mean: sum / values.len() as f64,
            median: values[values.len() / 2],
        }
    }
}

/// Per origin AS distribution of announced prefixes and covered addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AsDistribution {
    pub asn_prefixes: DistStats,
    pub asn_ips: DistStats,
}

/// Statistics of one snapshot for one address family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatResult {
    pub timestamp: i64,
    pub collector: CollectorType,
    pub subtype: String,
    pub afi: Afi,
    /// Prefix counts by length; index 0 holds `/1`, the last index holds `/32` or `/128`.
    pub prefix_len_counts: Vec<u64>,
    pub num_prefixes: u64,
    pub num_moas: u64,
    pub num_asns: u64,
    pub num_ips: u128,
    pub num_bogus_ips: u128,
    pub num_valid_ips: u128,
    /// Share of all valid addresses of the family covered by this snapshot.
    pub ip_space: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_dist: Option<AsDistribution>,
}

impl StatResult {
    /// An all-zero result for the given snapshot and family.
    pub fn empty(meta: &SnapshotMeta, afi: Afi) -> StatResult {
        StatResult {
            timestamp: meta.timestamp,
            collector: meta.collector,
            subtype: meta.subtype.clone(),
            afi,
            prefix_len_counts: vec![0; afi.max_len() as usize],
            num_prefixes: 0,
            num_moas: 0,
            num_asns: 0,
            num_ips: 0,
            num_bogus_ips: 0,
            num_valid_ips: 0,
            ip_space: 0.0,
            as_dist: None,
        }
    }

    /// Number of prefixes of length `len`. `/0` has no bucket.
    pub fn count_for_len(&self, len: u8) -> u64 {
        match len {
            0 => 0,
            l => self
                .prefix_len_counts
                .get(l as usize - 1)
                .copied()
                .unwrap_or(0),
        }
    }
}

/// Comparison of two chronologically adjacent snapshots of the same collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub before_timestamp: i64,
    pub after_timestamp: i64,
    pub collector: CollectorType,
    pub subtype: String,
    pub afi: Afi,
    pub ips_before: u128,
    pub ips_after: u128,
    pub new_ips: u128,
    pub withdrawn_ips: u128,
    pub aggregated_ips: u128,
    pub deaggregated_ips: u128,
    /// `aggregated_ips + deaggregated_ips`.
    pub changed_ips: u128,
    pub aggregation_events: u64,
    pub deaggregation_events: u64,
    pub new_prefixes: u64,
    pub withdrawn_prefixes: u64,
    /// Prefixes present in both snapshots whose origin set changed.
    pub modified_prefixes: u64,
    pub new_asns: u64,
    pub withdrawn_asns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginEntry {
    pub prefix: Prefix,
    pub origins: OriginSet,
}

/// Every prefix of one snapshot with its origin ASes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginsResult {
    pub timestamp: i64,
    pub collector: CollectorType,
    pub subtype: String,
    pub entries: Vec<OriginEntry>,
}

/// Lifetime of one prefix to origin AS association across a series of snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginTtl {
    pub prefix: Prefix,
    pub asn: u32,
    pub first_seen: i64,
    pub last_seen: i64,
    /// `last_seen - first_seen`, in seconds.
    pub ttl: i64,
}

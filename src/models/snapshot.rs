use crate::error::RibStatsError;
use crate::models::{Afi, OriginSet, Prefix};
use crate::trie::PrefixTrie;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Route collector project a snapshot was captured by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CollectorType {
    #[serde(rename = "routeviews")]
    RouteViews,
    #[serde(rename = "riperis")]
    RipeRis,
    #[serde(rename = "none")]
    None,
}

impl CollectorType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CollectorType::RouteViews => "routeviews",
            CollectorType::RipeRis => "riperis",
            CollectorType::None => "none",
        }
    }
}

impl Display for CollectorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collector identity of snapshots whose path follows no known archive layout.
pub const UNKNOWN_SUBTYPE: &str = "none";

/// Where and when a snapshot was captured.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotMeta {
    /// Capture time, Unix epoch seconds (UTC).
    pub timestamp: i64,
    pub collector: CollectorType,
    /// Collector identity, e.g. `route-views.wide` or `rrc01`.
    pub subtype: String,
    pub path: PathBuf,
}

impl SnapshotMeta {
    pub fn new(timestamp: i64, collector: CollectorType, subtype: impl Into<String>) -> Self {
        SnapshotMeta {
            timestamp,
            collector,
            subtype: subtype.into(),
            path: PathBuf::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// `collector/subtype`, e.g. `routeviews/route-views.wide`.
    pub fn source(&self) -> String {
        format!("{}/{}", self.collector, self.subtype)
    }

    /// Whether both the collector project and the collector identity are known.
    pub fn is_identified(&self) -> bool {
        self.collector != CollectorType::None && self.subtype != UNKNOWN_SUBTYPE
    }

    /// Whether two snapshots come from the same collector and may be diffed. Snapshots of an
    /// unknown collector never match anything.
    pub fn same_source(&self, other: &SnapshotMeta) -> bool {
        self.is_identified()
            && other.is_identified()
            && self.collector == other.collector
            && self.subtype == other.subtype
    }
}

/// Immutable prefix-to-origins mapping of one routing table dump.
///
/// Built once by a loader through [SnapshotBuilder] and shared between computations behind an
/// `Arc`.
#[derive(Debug, Clone)]
pub struct Snapshot {
    meta: SnapshotMeta,
    ipv4: PrefixTrie,
    ipv6: PrefixTrie,
    skipped_records: usize,
}

impl Snapshot {
    pub fn builder(meta: SnapshotMeta) -> SnapshotBuilder {
        SnapshotBuilder {
            snapshot: Snapshot {
                meta,
                ipv4: PrefixTrie::new(Afi::Ipv4),
                ipv6: PrefixTrie::new(Afi::Ipv6),
                skipped_records: 0,
            },
        }
    }

    /// Builds a snapshot from `(prefix, origins)` pairs; repeated prefixes merge their origins.
    pub fn from_entries<I>(meta: SnapshotMeta, entries: I) -> Result<Snapshot, RibStatsError>
    where
        I: IntoIterator<Item = (Prefix, OriginSet)>,
    {
        let mut builder = Snapshot::builder(meta);
        for (prefix, origins) in entries {
            builder.add(prefix, &origins)?;
        }
        Ok(builder.build())
    }

    #[inline]
    pub fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    pub fn trie(&self, afi: Afi) -> &PrefixTrie {
        match afi {
            Afi::Ipv4 => &self.ipv4,
            Afi::Ipv6 => &self.ipv6,
        }
    }

    /// Records dropped by the loader as corrupt or unusable.
    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    pub fn num_prefixes(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }
}

pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    /// Adds one announcement, unioning origins into an existing entry for the same prefix.
    pub fn add(&mut self, prefix: Prefix, origins: &OriginSet) -> Result<(), RibStatsError> {
        let trie = match prefix.afi() {
            Afi::Ipv4 => &mut self.snapshot.ipv4,
            Afi::Ipv6 => &mut self.snapshot.ipv6,
        };
        trie.insert_or_merge(prefix, origins)?;
        Ok(())
    }

    pub fn skip(&mut self) {
        self.snapshot.skipped_records += 1;
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

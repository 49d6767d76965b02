use crate::models::{Afi, OriginTtl, Prefix, Snapshot};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
struct Seen {
    first: i64,
    last: i64,
}

/// Tracks how long each prefix to origin AS association stays visible across a chronological
/// series of snapshots.
///
/// An association is reported once it disappears from a snapshot, and all remaining ones are
/// reported by [OriginTtlTracker::finish]. Associations seen in a single snapshot only (TTL of
/// zero) are not reported.
#[derive(Debug, Default)]
pub struct OriginTtlTracker {
    active: HashMap<(Prefix, u32), Seen>,
}

fn to_record((prefix, asn): (Prefix, u32), seen: Seen) -> Option<OriginTtl> {
    let ttl = seen.last - seen.first;
    (ttl > 0).then_some(OriginTtl {
        prefix,
        asn,
        first_seen: seen.first,
        last_seen: seen.last,
        ttl,
    })
}

impl OriginTtlTracker {
    pub fn new() -> OriginTtlTracker {
        OriginTtlTracker::default()
    }

    /// Number of associations currently being tracked.
    pub fn active(&self) -> usize {
        self.active.len()
    }

    /// Feeds the next snapshot and returns the associations that ended before it.
    pub fn observe(&mut self, snapshot: &Snapshot) -> Vec<OriginTtl> {
        let ts = snapshot.meta().timestamp;
        let mut current: HashSet<(Prefix, u32)> = HashSet::new();
        for afi in Afi::all() {
            for (prefix, origins) in snapshot.trie(afi).iter() {
                for asn in origins.iter() {
                    current.insert((prefix, asn));
                    self.active
                        .entry((prefix, asn))
                        .and_modify(|seen| seen.last = ts)
                        .or_insert(Seen {
                            first: ts,
                            last: ts,
                        });
                }
            }
        }

        let ended: Vec<(Prefix, u32)> = self
            .active
            .keys()
            .filter(|key| !current.contains(*key))
            .copied()
            .collect();
        let mut out: Vec<OriginTtl> = ended
            .into_iter()
            .filter_map(|key| {
                let seen = self.active.remove(&key)?;
                to_record(key, seen)
            })
            .collect();
        out.sort_by(|a, b| (a.prefix, a.asn).cmp(&(b.prefix, b.asn)));
        out
    }

    /// Reports every association still active.
    pub fn finish(self) -> Vec<OriginTtl> {
        let mut out: Vec<OriginTtl> = self
            .active
            .into_iter()
            .filter_map(|(key, seen)| to_record(key, seen))
            .collect();
        out.sort_by(|a, b| (a.prefix, a.asn).cmp(&(b.prefix, b.asn)));
        out
    }
}

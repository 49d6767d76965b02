use crate::addrspace::{AddressSet, ReservedRanges};
use crate::error::RibStatsError;
use crate::models::{Afi, DiffResult, Prefix, Snapshot};
use crate::trie::PrefixTrie;
use log::debug;
use std::collections::HashSet;

/// Compares two snapshots of the same collector.
///
/// Every non-reserved prefix `P` of the earlier snapshot is probed in the later one at its
/// [representative][Prefix::representative] address. If the longest match `M` differs from `P`,
/// `P` was aggregated (`M` is shorter) or deaggregated (`M` is longer). Counts are weighted by
/// addresses: classified before-prefixes are unioned per class, so overlapping prefixes count
/// their addresses once.
#[derive(Debug, Clone, Copy)]
pub struct DiffComputer<'a> {
    reserved: &'a ReservedRanges,
}

impl Default for DiffComputer<'static> {
    fn default() -> Self {
        DiffComputer::new(ReservedRanges::global())
    }
}

fn coverage(trie: &PrefixTrie, reserved: &AddressSet) -> Result<AddressSet, RibStatsError> {
    let prefixes = trie.prefixes();
    AddressSet::from_prefixes(trie.afi(), &prefixes)?.difference(reserved)
}

fn origin_asns(trie: &PrefixTrie) -> HashSet<u32> {
    trie.iter().flat_map(|(_, origins)| origins.iter()).collect()
}

impl<'a> DiffComputer<'a> {
    pub fn new(reserved: &'a ReservedRanges) -> DiffComputer<'a> {
        DiffComputer { reserved }
    }

    /// Diffs `before` against `after` for one address family.
    ///
    /// Fails with [RibStatsError::MismatchedSource] if the snapshots come from different
    /// collectors.
    pub fn compute(
        &self,
        before: &Snapshot,
        after: &Snapshot,
        afi: Afi,
    ) -> Result<DiffResult, RibStatsError> {
        if !before.meta().same_source(after.meta()) {
            return Err(RibStatsError::MismatchedSource {
                before: before.meta().source(),
                after: after.meta().source(),
            });
        }
        let trie_before = before.trie(afi);
        let trie_after = after.trie(afi);
        let reserved = self.reserved.for_afi(afi);

        let cov_before = coverage(trie_before, reserved)?;
        let cov_after = coverage(trie_after, reserved)?;

        let mut aggregated: Vec<Prefix> = vec![];
        let mut deaggregated: Vec<Prefix> = vec![];
        let mut aggregation_targets: HashSet<Prefix> = HashSet::new();
        let mut deaggregation_targets: HashSet<Prefix> = HashSet::new();
        let mut withdrawn_prefixes = 0;
        let mut modified_prefixes = 0;

        for (prefix, origins) in trie_before.iter() {
            match trie_after.lookup_exact(&prefix) {
                None => withdrawn_prefixes += 1,
                Some(after_origins) if after_origins != origins => modified_prefixes += 1,
                Some(_) => {}
            }

            if self.reserved.is_reserved(&prefix) {
                continue;
            }
            let Some((matched, _)) = trie_after.lookup_longest_match(prefix.representative())
            else {
                continue;
            };
            if prefix.len() > matched.len() {
                aggregated.push(prefix);
                aggregation_targets.insert(matched);
            } else if prefix.len() < matched.len() {
                deaggregated.push(prefix);
                deaggregation_targets.insert(matched);
            }
        }

        let new_prefixes = trie_after
            .iter()
            .filter(|(prefix, _)| trie_before.lookup_exact(prefix).is_none())
            .count();

        let asns_before = origin_asns(trie_before);
        let asns_after = origin_asns(trie_after);

        let aggregated_ips = AddressSet::from_prefixes(afi, &aggregated)?.cardinality();
        let deaggregated_ips = AddressSet::from_prefixes(afi, &deaggregated)?.cardinality();

        let res = DiffResult {
            before_timestamp: before.meta().timestamp,
            after_timestamp: after.meta().timestamp,
            collector: after.meta().collector,
            subtype: after.meta().subtype.clone(),
            afi,
            ips_before: cov_before.cardinality(),
            ips_after: cov_after.cardinality(),
            new_ips: cov_after.difference(&cov_before)?.cardinality(),
            withdrawn_ips: cov_before.difference(&cov_after)?.cardinality(),
            aggregated_ips,
            deaggregated_ips,
            changed_ips: aggregated_ips.saturating_add(deaggregated_ips),
            aggregation_events: aggregation_targets.len() as u64,
            deaggregation_events: deaggregation_targets.len() as u64,
            new_prefixes: new_prefixes as u64,
            withdrawn_prefixes,
            modified_prefixes,
            new_asns: asns_after.difference(&asns_before).count() as u64,
            withdrawn_asns: asns_before.difference(&asns_after).count() as u64,
        };
        debug!(
            "diff {} {} -> {} {}: +{} -{} agg {} deagg {}",
            after.meta().source(),
            res.before_timestamp,
            res.after_timestamp,
            afi,
            res.new_ips,
            res.withdrawn_ips,
            res.aggregated_ips,
            res.deaggregated_ips
        );
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectorType, OriginSet, SnapshotMeta};
    use std::str::FromStr;

    fn snapshot(ts: i64, entries: &[(&str, u32)]) -> Snapshot {
        Snapshot::from_entries(
            SnapshotMeta::new(ts, CollectorType::RouteViews, "route-views.wide"),
            entries
                .iter()
                .map(|(p, asn)| (Prefix::from_str(p).unwrap(), OriginSet::single(*asn))),
        )
        .unwrap()
    }

    #[test]
    fn test_aggregation_example() {
        let before = snapshot(1, &[("192.0.2.0/25", 64500), ("192.0.2.128/25", 64500)]);
        let after = snapshot(2, &[("192.0.2.0/24", 64500)]);
        // 192.0.2.0/24 is a documentation block, so count it here
        let none = ReservedRanges::none();
        let res = DiffComputer::new(&none)
            .compute(&before, &after, Afi::Ipv4)
            .unwrap();
        assert_eq!(res.aggregated_ips, 256);
        assert_eq!(res.changed_ips, 256);
        assert_eq!(res.aggregation_events, 1);
        assert_eq!(res.deaggregated_ips, 0);
        assert_eq!(res.new_ips, 0);
        assert_eq!(res.withdrawn_ips, 0);
        assert_eq!(res.new_prefixes, 1);
        assert_eq!(res.withdrawn_prefixes, 2);
    }

    #[test]
    fn test_aggregation_routable() {
        let before = snapshot(1, &[("8.8.8.0/25", 15169), ("8.8.8.128/25", 15169)]);
        let after = snapshot(2, &[("8.8.8.0/24", 15169)]);
        let res = DiffComputer::default()
            .compute(&before, &after, Afi::Ipv4)
            .unwrap();
        assert_eq!(res.aggregated_ips, 256);
        assert_eq!(res.changed_ips, 256);
        assert_eq!(res.aggregation_events, 1);
    }

    #[test]
    fn test_reserved_prefixes_ignored() {
        let before = snapshot(1, &[("192.0.2.0/25", 64500), ("192.0.2.128/25", 64500)]);
        let after = snapshot(2, &[("192.0.2.0/24", 64500)]);
        let res = DiffComputer::default()
            .compute(&before, &after, Afi::Ipv4)
            .unwrap();
        assert_eq!(res.changed_ips, 0);
        assert_eq!(res.ips_before, 0);
    }

    #[test]
    fn test_deaggregation() {
        let before = snapshot(1, &[("8.8.8.0/24", 15169)]);
        let after = snapshot(2, &[("8.8.8.0/25", 15169), ("8.8.8.128/25", 15169)]);
        let res = DiffComputer::default()
            .compute(&before, &after, Afi::Ipv4)
            .unwrap();
        assert_eq!(res.deaggregated_ips, 256);
        assert_eq!(res.deaggregation_events, 1);
        assert_eq!(res.aggregated_ips, 0);
        assert_eq!(res.changed_ips, 256);
    }

    #[test]
    fn test_symmetry() {
        let a = snapshot(1, &[("8.0.0.0/8", 1), ("1.1.1.0/24", 2), ("9.9.0.0/16", 3)]);
        let b = snapshot(2, &[("8.8.0.0/16", 1), ("1.1.0.0/16", 2), ("4.4.4.0/24", 5)]);
        let computer = DiffComputer::default();
        let ab = computer.compute(&a, &b, Afi::Ipv4).unwrap();
        let ba = computer.compute(&b, &a, Afi::Ipv4).unwrap();
        assert_eq!(ab.new_ips, ba.withdrawn_ips);
        assert_eq!(ab.withdrawn_ips, ba.new_ips);
        assert_eq!(ab.new_ips, (1 << 16) - 256 + 256);
        assert_eq!(ab.new_asns, 1);
        assert_eq!(ab.withdrawn_asns, 1);
    }

    #[test]
    fn test_mismatched_source() {
        let a = Snapshot::builder(SnapshotMeta::new(
            1,
            CollectorType::RouteViews,
            "route-views.wide",
        ))
        .build();
        let b = Snapshot::builder(SnapshotMeta::new(2, CollectorType::RipeRis, "rrc01")).build();
        let res = DiffComputer::default().compute(&a, &b, Afi::Ipv4);
        assert!(matches!(res, Err(RibStatsError::MismatchedSource { .. })));
    }

    #[test]
    fn test_modified_origins() {
        let a = snapshot(1, &[("8.8.8.0/24", 15169)]);
        let b = snapshot(2, &[("8.8.8.0/24", 64512)]);
        let res = DiffComputer::default()
            .compute(&a, &b, Afi::Ipv4)
            .unwrap();
        assert_eq!(res.modified_prefixes, 1);
        assert_eq!(res.changed_ips, 0);
        assert_eq!(res.new_ips, 0);
    }

    #[test]
    fn test_ipv6() {
        let before = snapshot(1, &[("2a00:1450::/32", 15169)]);
        let after = snapshot(2, &[("2a00:1450::/29", 15169)]);
        let res = DiffComputer::default()
            .compute(&before, &after, Afi::Ipv6)
            .unwrap();
        assert_eq!(res.aggregated_ips, 1 << 96);
        assert_eq!(res.new_ips, (1 << 99) - (1 << 96));
    }
}

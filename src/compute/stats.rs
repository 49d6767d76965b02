use crate::addrspace::{AddressSet, ReservedRanges};
use crate::error::RibStatsError;
use crate::models::{Afi, AsDistribution, DistStats, Prefix, Snapshot, StatResult};
use log::debug;
use std::collections::HashMap;

/// Reduces one address family of a snapshot into a [StatResult].
#[derive(Debug, Clone, Copy)]
pub struct StatsComputer<'a> {
    reserved: &'a ReservedRanges,
    as_dist: bool,
}

impl Default for StatsComputer<'static> {
    fn default() -> Self {
        StatsComputer::new(ReservedRanges::global())
    }
}

impl<'a> StatsComputer<'a> {
    pub fn new(reserved: &'a ReservedRanges) -> StatsComputer<'a> {
        StatsComputer {
            reserved,
            as_dist: false,
        }
    }

    /// Also compute the per origin AS prefix and address distributions.
    pub fn with_as_distribution(mut self, enabled: bool) -> Self {
        self.as_dist = enabled;
        self
    }

    pub fn compute(&self, snapshot: &Snapshot, afi: Afi) -> Result<StatResult, RibStatsError> {
        let trie = snapshot.trie(afi);
        let mut res = StatResult::empty(snapshot.meta(), afi);
        let mut by_asn: HashMap<u32, Vec<Prefix>> = HashMap::new();
        let mut prefixes = Vec::with_capacity(trie.len());

        for (prefix, origins) in trie.iter() {
            res.num_prefixes += 1;
            // `/0` has no bucket
            if prefix.len() > 0 {
                res.prefix_len_counts[prefix.len() as usize - 1] += 1;
            }
            if origins.is_moas() {
                res.num_moas += 1;
            }
            for asn in origins.iter() {
                by_asn.entry(asn).or_default().push(prefix);
            }
            prefixes.push(prefix);
        }
        res.num_asns = by_asn.len() as u64;

        let coverage = AddressSet::from_prefixes(afi, &prefixes)?;
        let reserved = self.reserved.for_afi(afi);
        res.num_ips = coverage.cardinality();
        res.num_bogus_ips = coverage.intersection(reserved)?.cardinality();
        res.num_valid_ips = coverage.difference(reserved)?.cardinality();
        let all_valid = self.reserved.all_valid(afi);
        if all_valid > 0 {
            res.ip_space = res.num_valid_ips as f64 / all_valid as f64;
        }

        if self.as_dist {
            let mut prefix_counts = Vec::with_capacity(by_asn.len());
            let mut ip_counts = Vec::with_capacity(by_asn.len());
            for asn_prefixes in by_asn.values() {
                prefix_counts.push(asn_prefixes.len() as u128);
                ip_counts.push(AddressSet::from_prefixes(afi, asn_prefixes)?.cardinality());
            }
            res.as_dist = Some(AsDistribution {
                asn_prefixes: DistStats::from_values(prefix_counts),
                asn_ips: DistStats::from_values(ip_counts),
            });
        }

        debug!(
            "stats {} {} {}: {} prefixes, {} moas, {} ips",
            snapshot.meta().source(),
            snapshot.meta().timestamp,
            afi,
            res.num_prefixes,
            res.num_moas,
            res.num_ips
        );
        Ok(res)
    }
}

/*!
Address space arithmetic over sets of IP addresses.

An [AddressSet] stores a sorted list of disjoint, non-adjacent inclusive ranges of address
offsets within one address family. All set operations work on the ranges directly, so a `/8` is
a single range rather than 2^24 individual addresses.
*/
mod reserved;

pub use reserved::ReservedRanges;

use crate::error::RibStatsError;
use crate::models::{addr_to_offset, Afi, Prefix};
use std::net::IpAddr;

/// An inclusive range of address offsets `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrRange {
    pub start: u128,
    pub end: u128,
}

impl AddrRange {
    #[inline]
    pub fn size(&self) -> u128 {
        (self.end - self.start).saturating_add(1)
    }
}

impl From<&Prefix> for AddrRange {
    fn from(prefix: &Prefix) -> Self {
        AddrRange {
            start: prefix.first(),
            end: prefix.last(),
        }
    }
}

/// A set of addresses of one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSet {
    afi: Afi,
    ranges: Vec<AddrRange>,
}

fn check_family(expected: Afi, found: Afi) -> Result<(), RibStatsError> {
    if expected != found {
        return Err(RibStatsError::Domain {
            expected: expected.as_str(),
            found: found.as_str(),
        });
    }
    Ok(())
}

impl AddressSet {
    /// Creates an empty set.
    pub fn new(afi: Afi) -> AddressSet {
        AddressSet {
            afi,
            ranges: vec![],
        }
    }

    /// The whole address space of the family.
    pub fn full(afi: Afi) -> AddressSet {
        AddressSet {
            afi,
            ranges: vec![AddrRange {
                start: 0,
                end: afi.max_offset(),
            }],
        }
    }

    /// Builds the union of the given prefixes. Overlapping and adjacent prefixes are merged, so
    /// a more specific prefix inside an already covered one adds nothing.
    pub fn from_prefixes<'a, I>(afi: Afi, prefixes: I) -> Result<AddressSet, RibStatsError>
    where
        I: IntoIterator<Item = &'a Prefix>,
    {
        let mut ranges = vec![];
        for prefix in prefixes {
            check_family(afi, prefix.afi())?;
            ranges.push(AddrRange::from(prefix));
        }
        Ok(AddressSet::from_ranges(afi, ranges))
    }

    pub(crate) fn from_ranges(afi: Afi, mut ranges: Vec<AddrRange>) -> AddressSet {
        ranges.sort_unstable_by_key(|r| r.start);
        let mut merged: Vec<AddrRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start <= last.end.saturating_add(1) => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }
        AddressSet {
            afi,
            ranges: merged,
        }
    }

    #[inline]
    pub fn afi(&self) -> Afi {
        self.afi
    }

    pub fn ranges(&self) -> &[AddrRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of unique addresses in the set. Saturates at `u128::MAX` for the full IPv6 space.
    pub fn cardinality(&self) -> u128 {
        self.ranges
            .iter()
            .fold(0u128, |acc, r| acc.saturating_add(r.size()))
    }

    /// Adds a single prefix to the set.
    pub fn insert(&mut self, prefix: &Prefix) -> Result<(), RibStatsError> {
        check_family(self.afi, prefix.afi())?;
        let mut ranges = std::mem::take(&mut self.ranges);
        ranges.push(AddrRange::from(prefix));
        *self = AddressSet::from_ranges(self.afi, ranges);
        Ok(())
    }

    /// Addresses in either set.
    pub fn union(&self, other: &AddressSet) -> Result<AddressSet, RibStatsError> {
        check_family(self.afi, other.afi)?;
        let mut ranges = self.ranges.clone();
        ranges.extend_from_slice(&other.ranges);
        Ok(AddressSet::from_ranges(self.afi, ranges))
    }

    /// Addresses in both sets.
    pub fn intersection(&self, other: &AddressSet) -> Result<AddressSet, RibStatsError> {
        check_family(self.afi, other.afi)?;
        let mut out = vec![];
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start <= end {
                out.push(AddrRange { start, end });
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        Ok(AddressSet {
            afi: self.afi,
            ranges: out,
        })
    }

    /// Addresses in this set but not in `other`.
    pub fn difference(&self, other: &AddressSet) -> Result<AddressSet, RibStatsError> {
        check_family(self.afi, other.afi)?;
        let mut out = vec![];
        let mut j = 0;
        for range in &self.ranges {
            let mut start = range.start;
            let end = range.end;
            // skip subtrahend ranges entirely before this range
            while j < other.ranges.len() && other.ranges[j].end < start {
                j += 1;
            }
            let mut k = j;
            let mut exhausted = false;
            while k < other.ranges.len() && other.ranges[k].start <= end {
                let cut = other.ranges[k];
                if cut.start > start {
                    out.push(AddrRange {
                        start,
                        end: cut.start - 1,
                    });
                }
                if cut.end >= end {
                    exhausted = true;
                    break;
                }
                start = cut.end + 1;
                k += 1;
            }
            if !exhausted {
                out.push(AddrRange { start, end });
            }
        }
        Ok(AddressSet {
            afi: self.afi,
            ranges: out,
        })
    }

    /// Whether the whole address space of `prefix` is inside this set.
    pub fn contains_prefix(&self, prefix: &Prefix) -> Result<bool, RibStatsError> {
        check_family(self.afi, prefix.afi())?;
        Ok(self.covering_range(prefix.first()).is_some_and(|r| r.end >= prefix.last()))
    }

    /// Whether `addr` is in this set. Addresses of the other family are never members.
    pub fn contains_addr(&self, addr: IpAddr) -> bool {
        Afi::from(addr) == self.afi && self.covering_range(addr_to_offset(addr)).is_some()
    }

    fn covering_range(&self, offset: u128) -> Option<&AddrRange> {
        let idx = self.ranges.partition_point(|r| r.start <= offset);
        if idx == 0 {
            return None;
        }
        let range = &self.ranges[idx - 1];
        (range.end >= offset).then_some(range)
    }
}

/// Whether `prefix` lies fully inside `range`.
pub fn contains(range: &AddressSet, prefix: &Prefix) -> Result<bool, RibStatsError> {
    range.contains_prefix(prefix)
}

/// Number of unique addresses covered by `prefixes`, counting overlaps once.
pub fn cardinality<'a, I>(afi: Afi, prefixes: I) -> Result<u128, RibStatsError>
where
    I: IntoIterator<Item = &'a Prefix>,
{
    Ok(AddressSet::from_prefixes(afi, prefixes)?.cardinality())
}

/// Addresses in `a` that are not in `b`.
pub fn difference(a: &AddressSet, b: &AddressSet) -> Result<AddressSet, RibStatsError> {
    a.difference(b)
}

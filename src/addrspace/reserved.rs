use crate::addrspace::{AddrRange, AddressSet};
use crate::models::{Afi, Prefix};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

/// Special-purpose IPv4 blocks: RFC1918, shared, loopback, link-local, IETF, test-nets,
/// multicast, class E and limited broadcast.
const RESERVED_IPV4: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    (Ipv4Addr::new(100, 64, 0, 0), 10),
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(169, 254, 0, 0), 16),
    (Ipv4Addr::new(192, 0, 0, 0), 24),
    (Ipv4Addr::new(192, 0, 0, 0), 29),
    (Ipv4Addr::new(192, 0, 2, 0), 24),
    (Ipv4Addr::new(198, 51, 100, 0), 24),
    (Ipv4Addr::new(203, 0, 113, 0), 24),
    (Ipv4Addr::new(224, 0, 0, 0), 4),
    (Ipv4Addr::new(240, 0, 0, 0), 4),
    (Ipv4Addr::new(255, 255, 255, 255), 32),
];

const RESERVED_IPV6: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1), 128),
    (Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 0), 128),
    (Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0, 0), 96),
    (Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10),
    (Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),
    (Ipv6Addr::new(0x2001, 0, 0, 0, 0, 0, 0, 0), 23),
    (Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 32),
    (Ipv6Addr::new(0x5f00, 0, 0, 0, 0, 0, 0, 0), 8),
    (Ipv6Addr::new(0x3ffe, 0, 0, 0, 0, 0, 0, 0), 16),
    (Ipv6Addr::new(0xff00, 0, 0, 0, 0, 0, 0, 0), 8),
];

/// Globally routable blocks carved back out of the reserved IPv6 ranges.
const ROUTABLE_IPV6: &[(Ipv6Addr, u8)] = &[
    (Ipv6Addr::new(0x2002, 0, 0, 0, 0, 0, 0, 0), 16),
    (Ipv6Addr::new(0x2001, 0, 0, 0, 0, 0, 0, 0), 32),
    (Ipv6Addr::new(0x2001, 0x10, 0, 0, 0, 0, 0, 0), 28),
];

fn block_range(afi: Afi, offset: u128, len: u8) -> AddrRange {
    let host_bits = (afi.max_len() - len.min(afi.max_len())) as u32;
    let host_mask = 1u128
        .checked_shl(host_bits)
        .map(|v| v - 1)
        .unwrap_or(u128::MAX);
    let start = offset & !host_mask;
    AddrRange {
        start,
        end: start | host_mask,
    }
}

fn ipv4_table(table: &[(Ipv4Addr, u8)]) -> AddressSet {
    let ranges = table
        .iter()
        .map(|(addr, len)| block_range(Afi::Ipv4, u32::from(*addr) as u128, *len))
        .collect();
    AddressSet::from_ranges(Afi::Ipv4, ranges)
}

fn ipv6_table(table: &[(Ipv6Addr, u8)]) -> AddressSet {
    let ranges = table
        .iter()
        .map(|(addr, len)| block_range(Afi::Ipv6, u128::from(*addr), *len))
        .collect();
    AddressSet::from_ranges(Afi::Ipv6, ranges)
}

/// Address ranges that never count as real routed space.
///
/// The process-wide table is built once on first use by [ReservedRanges::global] and is read-only
/// afterwards, so worker threads share it freely.
#[derive(Debug, Clone)]
pub struct ReservedRanges {
    ipv4: AddressSet,
    ipv6: AddressSet,
    valid_ipv4: u128,
    valid_ipv6: u128,
}

static GLOBAL_RESERVED: OnceLock<ReservedRanges> = OnceLock::new();

impl ReservedRanges {
    /// The standard special-purpose address table.
    pub fn standard() -> ReservedRanges {
        let ipv6 = ipv6_table(RESERVED_IPV6);
        // both tables are ipv6, so the difference cannot fail on family
        let ipv6 = ipv6
            .difference(&ipv6_table(ROUTABLE_IPV6))
            .unwrap_or(ipv6);
        ReservedRanges::from_sets(ipv4_table(RESERVED_IPV4), ipv6)
    }

    /// No reserved addresses at all.
    pub fn none() -> ReservedRanges {
        ReservedRanges::from_sets(AddressSet::new(Afi::Ipv4), AddressSet::new(Afi::Ipv6))
    }

    pub fn global() -> &'static ReservedRanges {
        GLOBAL_RESERVED.get_or_init(ReservedRanges::standard)
    }

    fn from_sets(ipv4: AddressSet, ipv6: AddressSet) -> ReservedRanges {
        let valid_ipv4 = (Afi::Ipv4.max_offset() + 1) - ipv4.cardinality();
        let valid_ipv6 = u128::MAX - ipv6.cardinality();
        ReservedRanges {
            ipv4,
            ipv6,
            valid_ipv4,
            valid_ipv6,
        }
    }

    pub fn for_afi(&self, afi: Afi) -> &AddressSet {
        match afi {
            Afi::Ipv4 => &self.ipv4,
            Afi::Ipv6 => &self.ipv6,
        }
    }

    /// Whether the whole prefix lies inside reserved space.
    pub fn is_reserved(&self, prefix: &Prefix) -> bool {
        self.for_afi(prefix.afi())
            .contains_prefix(prefix)
            .unwrap_or(false)
    }

    /// Number of non-reserved addresses in the family. The IPv6 count is one short of exact
    /// since the full space does not fit in `u128`.
    pub fn all_valid(&self, afi: Afi) -> u128 {
        match afi {
            Afi::Ipv4 => self.valid_ipv4,
            Afi::Ipv6 => self.valid_ipv6,
        }
    }
}

use crate::error::RibStatsError;
use crate::models::Afi;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// A network prefix, always kept in its masked (truncated) form.
///
/// `10.1.2.3/8` and `10.0.0.0/8` parse to the same `Prefix`; equality, hashing and ordering all
/// work on the masked address plus the length.
#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct Prefix {
    net: IpNet,
}

impl Prefix {
    pub fn new(net: IpNet) -> Prefix {
        Prefix { net: net.trunc() }
    }

    /// Builds a prefix from an address offset (see [Prefix::first]) and a length.
    pub fn from_offset(afi: Afi, offset: u128, len: u8) -> Result<Prefix, RibStatsError> {
        let net = match afi {
            Afi::Ipv4 => {
                let addr = u32::try_from(offset).map_err(|_| {
                    RibStatsError::Format(format!("offset {} exceeds ipv4 space", offset))
                })?;
                IpNet::V4(
                    Ipv4Net::new(Ipv4Addr::from(addr), len)
                        .map_err(|e| RibStatsError::Format(e.to_string()))?,
                )
            }
            Afi::Ipv6 => IpNet::V6(
                Ipv6Net::new(Ipv6Addr::from(offset), len)
                    .map_err(|e| RibStatsError::Format(e.to_string()))?,
            ),
        };
        Ok(Prefix::new(net))
    }

    #[inline]
    pub fn net(&self) -> IpNet {
        self.net
    }

    #[inline]
    pub fn afi(&self) -> Afi {
        match self.net {
            IpNet::V4(_) => Afi::Ipv4,
            IpNet::V6(_) => Afi::Ipv6,
        }
    }

    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// First address of the prefix as an integer offset into its address family.
    #[inline]
    pub fn first(&self) -> u128 {
        addr_to_offset(self.net.network())
    }

    /// Last address of the prefix as an integer offset into its address family.
    #[inline]
    pub fn last(&self) -> u128 {
        addr_to_offset(self.net.broadcast())
    }

    /// Number of addresses covered. `::/0` saturates at `u128::MAX`.
    pub fn size(&self) -> u128 {
        let host_bits = (self.afi().max_len() - self.len()) as u32;
        1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
    }

    /// Whether `other` lies completely inside this prefix.
    pub fn contains(&self, other: &Prefix) -> bool {
        self.afi() == other.afi() && self.first() <= other.first() && other.last() <= self.last()
    }

    pub fn contains_addr(&self, addr: IpAddr) -> bool {
        self.net.contains(&addr)
    }

    /// Address used to probe another trie for this prefix: the midpoint of the range.
    ///
    /// For any prefix covering more than one address this is strictly inside the range and never
    /// the network address, so covering prefixes with different boundaries are still found.
    pub fn representative(&self) -> IpAddr {
        let offset = if self.len() < self.afi().max_len() {
            self.first() + (self.last() - self.first()) / 2 + 1
        } else {
            self.first()
        };
        offset_to_addr(self.afi(), offset)
    }

    /// Bit of the network address at `index`, counting from the most significant bit.
    #[inline]
    pub(crate) fn bit(&self, index: u8) -> bool {
        offset_bit(self.afi(), self.first(), index)
    }
}

/// Converts an address into its integer offset within the address family.
pub fn addr_to_offset(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Converts an integer offset back into an address. IPv4 offsets are truncated to 32 bits.
pub fn offset_to_addr(afi: Afi, offset: u128) -> IpAddr {
    match afi {
        Afi::Ipv4 => IpAddr::V4(Ipv4Addr::from(offset as u32)),
        Afi::Ipv6 => IpAddr::V6(Ipv6Addr::from(offset)),
    }
}

#[inline]
pub(crate) fn offset_bit(afi: Afi, offset: u128, index: u8) -> bool {
    let shift = (afi.max_len() - 1 - index) as u32;
    (offset >> shift) & 1 == 1
}

impl FromStr for Prefix {
    type Err = RibStatsError;

    /// Parses `address/length`. A bare address is read as a host prefix (`/32` or `/128`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('/') {
            let net = IpNet::from_str(s)
                .map_err(|_| RibStatsError::Format(format!("invalid prefix '{}'", s)))?;
            return Ok(Prefix::new(net));
        }
        let addr = IpAddr::from_str(s)
            .map_err(|_| RibStatsError::Format(format!("invalid prefix '{}'", s)))?;
        let max_len = Afi::from(addr).max_len();
        let net = IpNet::new(addr, max_len).map_err(|e| RibStatsError::Format(e.to_string()))?;
        Ok(Prefix::new(net))
    }
}

impl From<IpNet> for Prefix {
    fn from(net: IpNet) -> Self {
        Prefix::new(net)
    }
}

impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.afi(), self.first(), self.len()).cmp(&(other.afi(), other.first(), other.len()))
    }
}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.net)
    }
}

impl Debug for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.net)
    }
}

impl Serialize for Prefix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

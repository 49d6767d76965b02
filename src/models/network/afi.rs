use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// AFI -- Address Family Identifier
///
/// Statistics and diffs are always computed per address family; the two families never mix in
/// one set operation.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Afi {
    Ipv4,
    Ipv6,
}

impl Afi {
    pub const fn all() -> [Afi; 2] {
        [Afi::Ipv4, Afi::Ipv6]
    }

    /// Number of bits in an address of this family.
    #[inline]
    pub const fn max_len(&self) -> u8 {
        match self {
            Afi::Ipv4 => 32,
            Afi::Ipv6 => 128,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Afi::Ipv4 => "ipv4",
            Afi::Ipv6 => "ipv6",
        }
    }

    /// Largest address offset of the family, i.e. the broadcast-style all-ones address.
    #[inline]
    pub const fn max_offset(&self) -> u128 {
        match self {
            Afi::Ipv4 => u32::MAX as u128,
            Afi::Ipv6 => u128::MAX,
        }
    }
}

impl From<IpAddr> for Afi {
    #[inline]
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(_) => Afi::Ipv4,
            IpAddr::V6(_) => Afi::Ipv6,
        }
    }
}

impl Display for Afi {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_afi_from() {
        assert_eq!(
            Afi::from(IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))),
            Afi::Ipv4
        );
        assert_eq!(
            Afi::from(IpAddr::V6(std::net::Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1))),
            Afi::Ipv6
        );
    }

    #[test]
    fn test_afi_bounds() {
        assert_eq!(Afi::Ipv4.max_len(), 32);
        assert_eq!(Afi::Ipv6.max_len(), 128);
        assert_eq!(Afi::Ipv4.max_offset(), 4294967295);
        assert_eq!(Afi::Ipv6.max_offset(), u128::MAX);
    }

    #[test]
    fn test_afi_serde() {
        assert_eq!(serde_json::to_string(&Afi::Ipv4).unwrap(), "\"ipv4\"");
        assert_eq!(serde_json::to_string(&Afi::Ipv6).unwrap(), "\"ipv6\"");
    }
}

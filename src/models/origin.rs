use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Set of origin AS numbers announcing one prefix in one snapshot.
///
/// A prefix with more than one origin is a MOAS (multiple origin AS) prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OriginSet(BTreeSet<u32>);

impl OriginSet {
    pub fn new() -> OriginSet {
        OriginSet(BTreeSet::new())
    }

    pub fn single(asn: u32) -> OriginSet {
        OriginSet(BTreeSet::from([asn]))
    }

    pub fn insert(&mut self, asn: u32) -> bool {
        self.0.insert(asn)
    }

    /// Unions `other` into this set.
    pub fn merge(&mut self, other: &OriginSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn contains(&self, asn: u32) -> bool {
        self.0.contains(&asn)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_moas(&self) -> bool {
        self.0.len() > 1
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u32> for OriginSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        OriginSet(iter.into_iter().collect())
    }
}

impl Display for OriginSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join(" "))
    }
}

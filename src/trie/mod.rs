/*!
Binary prefix trie with longest-prefix-match lookup.

One [PrefixTrie] holds prefixes of a single address family. Nodes live in one arena vector and
refer to their children by index; the path from the root spells out the prefix bits, most
significant bit first. Insert and lookup both walk at most `max_len` nodes.
*/
use crate::error::RibStatsError;
use crate::models::{addr_to_offset, offset_bit, Afi, OriginSet, Prefix};
use std::net::IpAddr;

#[derive(Debug, Clone, Default)]
struct Node {
    children: [Option<usize>; 2],
    entry: Option<(Prefix, OriginSet)>,
}

#[derive(Debug, Clone)]
pub struct PrefixTrie {
    afi: Afi,
    nodes: Vec<Node>,
    len: usize,
}

impl PrefixTrie {
    pub fn new(afi: Afi) -> PrefixTrie {
        PrefixTrie {
            afi,
            nodes: vec![Node::default()],
            len: 0,
        }
    }

    #[inline]
    pub fn afi(&self) -> Afi {
        self.afi
    }

    /// Number of stored prefixes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_family(&self, prefix: &Prefix) -> Result<(), RibStatsError> {
        if prefix.afi() != self.afi {
            return Err(RibStatsError::Domain {
                expected: self.afi.as_str(),
                found: prefix.afi().as_str(),
            });
        }
        Ok(())
    }

    /// Walks down to the node for `prefix`, creating missing nodes on the way.
    fn node_for(&mut self, prefix: &Prefix) -> usize {
        let mut idx = 0;
        for depth in 0..prefix.len() {
            let bit = prefix.bit(depth) as usize;
            idx = match self.nodes[idx].children[bit] {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[idx].children[bit] = Some(child);
                    child
                }
            };
        }
        idx
    }

    fn find_node(&self, prefix: &Prefix) -> Option<usize> {
        let mut idx = 0;
        for depth in 0..prefix.len() {
            idx = self.nodes[idx].children[prefix.bit(depth) as usize]?;
        }
        Some(idx)
    }

    /// Inserts a new prefix. Fails with [RibStatsError::DuplicateKey] if the exact prefix is
    /// already present; use [PrefixTrie::insert_or_merge] when building from a dump.
    pub fn insert(&mut self, prefix: Prefix, origins: OriginSet) -> Result<(), RibStatsError> {
        self.check_family(&prefix)?;
        let idx = self.node_for(&prefix);
        let node = &mut self.nodes[idx];
        if node.entry.is_some() {
            return Err(RibStatsError::DuplicateKey(prefix.to_string()));
        }
        node.entry = Some((prefix, origins));
        self.len += 1;
        Ok(())
    }

    /// Inserts a prefix, unioning `origins` into the existing origin set if the prefix is already
    /// present. Returns `true` if the prefix was new.
    pub fn insert_or_merge(
        &mut self,
        prefix: Prefix,
        origins: &OriginSet,
    ) -> Result<bool, RibStatsError> {
        self.check_family(&prefix)?;
        let idx = self.node_for(&prefix);
        let node = &mut self.nodes[idx];
        match &mut node.entry {
            Some((_, existing)) => {
                existing.merge(origins);
                Ok(false)
            }
            None => {
                node.entry = Some((prefix, origins.clone()));
                self.len += 1;
                Ok(true)
            }
        }
    }

    pub fn lookup_exact(&self, prefix: &Prefix) -> Option<&OriginSet> {
        if prefix.afi() != self.afi {
            return None;
        }
        let idx = self.find_node(prefix)?;
        self.nodes[idx].entry.as_ref().map(|(_, origins)| origins)
    }

    /// Most specific stored prefix containing `addr`. Addresses of the other family never match.
    pub fn lookup_longest_match(&self, addr: IpAddr) -> Option<(Prefix, &OriginSet)> {
        if Afi::from(addr) != self.afi {
            return None;
        }
        let offset = addr_to_offset(addr);
        let mut idx = 0;
        let mut best = self.nodes[0].entry.as_ref();
        for depth in 0..self.afi.max_len() {
            let bit = offset_bit(self.afi, offset, depth) as usize;
            match self.nodes[idx].children[bit] {
                Some(child) => idx = child,
                None => break,
            }
            if let Some(entry) = self.nodes[idx].entry.as_ref() {
                best = Some(entry);
            }
        }
        best.map(|(prefix, origins)| (*prefix, origins))
    }

    /// All entries in prefix order (address first, shorter prefix before longer).
    pub fn iter(&self) -> TrieIter<'_> {
        TrieIter {
            trie: self,
            stack: vec![0],
        }
    }

    pub fn prefixes(&self) -> Vec<Prefix> {
        self.iter().map(|(prefix, _)| prefix).collect()
    }
}

/// Depth-first pre-order walk, `0` branch before `1` branch.
pub struct TrieIter<'a> {
    trie: &'a PrefixTrie,
    stack: Vec<usize>,
}

impl<'a> Iterator for TrieIter<'a> {
    type Item = (Prefix, &'a OriginSet);

    fn next(&mut self) -> Option<Self::Item> {
        let trie = self.trie;
        while let Some(idx) = self.stack.pop() {
            let node = &trie.nodes[idx];
            for child in node.children.iter().rev().flatten() {
                self.stack.push(*child);
            }
            if let Some((prefix, origins)) = &node.entry {
                return Some((*prefix, origins));
            }
        }
        None
    }
}

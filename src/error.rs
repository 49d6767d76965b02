/*!
error module defines the error types used in bgpkit-ribstats.
*/
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RibStatsError {
    /// Malformed prefix or address text.
    ///
    /// ## Occurs during:
    ///  - Parsing a [Prefix][crate::models::Prefix] from a string
    ///  - Building the reserved address tables
    #[error("malformed prefix or address: {0}")]
    Format(String),
    /// Two operands of one address-space operation belong to different address families.
    ///
    /// ## Occurs during:
    ///  - Set operations on [AddressSet][crate::addrspace::AddressSet]
    ///  - Inserting a prefix into a trie of the other family
    #[error("address family mismatch: expected {expected}, found {found}")]
    Domain {
        expected: &'static str,
        found: &'static str,
    },
    /// A prefix was inserted twice into a trie where merging was expected.
    ///
    /// ## Occurs during:
    ///  - [PrefixTrie::insert][crate::trie::PrefixTrie::insert]
    #[error("prefix {0} already exists in trie")]
    DuplicateKey(String),
    /// A diff was requested between snapshots of different collectors.
    ///
    /// ## Occurs during:
    ///  - [DiffComputer::compute][crate::compute::DiffComputer::compute]
    #[error("cannot diff {before} against {after}: different collectors")]
    MismatchedSource { before: String, after: String },
    /// A snapshot file could not be opened, decompressed or parsed.
    ///
    /// ## Occurs during:
    ///  - [SnapshotLoader::load][crate::loader::SnapshotLoader::load]
    #[error("failed to load {path}: {reason}")]
    Load { path: String, reason: String },
    /// The output destination rejected a record.
    ///
    /// ## Occurs during:
    ///  - [Sink::write][crate::sink::Sink::write] and [Sink::flush][crate::sink::Sink::flush]
    #[error("sink failure: {0}")]
    Sink(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RibStatsError {
    pub(crate) fn load(path: impl ToString, reason: impl ToString) -> Self {
        RibStatsError::Load {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ipnet::AddrParseError> for RibStatsError {
    fn from(value: ipnet::AddrParseError) -> Self {
        RibStatsError::Format(value.to_string())
    }
}

impl From<serde_json::Error> for RibStatsError {
    fn from(value: serde_json::Error) -> Self {
        RibStatsError::Sink(value.to_string())
    }
}

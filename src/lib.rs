/*!
`bgpkit-ribstats` computes prefix statistics and snapshot-to-snapshot diffs over BGP RIB dumps.

Each dump is reduced to a [Snapshot][models::Snapshot]: one binary prefix trie per address
family, mapping every announced prefix to its set of origin ASes. From a snapshot the library
derives:
- per-snapshot statistics ([StatsComputer]): prefix counts per length, MOAS prefixes, origin ASes,
  covered, bogus and valid address counts, and optional per-AS distributions;
- diffs between two snapshots of the same collector ([DiffComputer]): new and withdrawn address
  space, aggregation and deaggregation weighted by address count, prefix and AS churn;
- origin listings and prefix-to-origin lifetimes across a series of snapshots.

All address arithmetic runs on integer ranges ([addrspace]), never on individual addresses, and
excludes the special-purpose ranges in [ReservedRanges].

# Example

```no_run
use bgpkit_ribstats::loader::{MrtLoader, SnapshotLoader};
use bgpkit_ribstats::models::Afi;
use bgpkit_ribstats::{DiffComputer, StatsComputer};
use std::path::Path;

let before = MrtLoader.load(Path::new("rrc00/2024.01/bview.20240101.0000.gz")).unwrap();
let after = MrtLoader.load(Path::new("rrc00/2024.01/bview.20240101.0800.gz")).unwrap();

let stats = StatsComputer::default().compute(&before, Afi::Ipv4).unwrap();
println!("{} prefixes, {} MOAS", stats.num_prefixes, stats.num_moas);

let diff = DiffComputer::default().compute(&before, &after, Afi::Ipv4).unwrap();
println!("{} new addresses, {} aggregated", diff.new_ips, diff.aggregated_ips);
```

# Bulk processing

[Pipeline][pipeline::Pipeline] processes a sorted list of dump files on a pool of worker threads
and writes [Record][sink::Record]s through a single [Sink][sink::Sink], in input order.
*/

pub mod addrspace;
pub mod compute;
pub mod error;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod trie;

pub use addrspace::{AddressSet, ReservedRanges};
pub use compute::{DiffComputer, OriginTtlTracker, StatsComputer};
pub use error::RibStatsError;
pub use pipeline::{Pipeline, PipelineConfig, RunSummary};
pub use trie::PrefixTrie;

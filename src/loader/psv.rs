use crate::error::RibStatsError;
use crate::loader::io::get_reader;
use crate::loader::{filename, SnapshotLoader};
use crate::models::{OriginSet, Prefix, Snapshot};
use log::{debug, info};
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

/// Loads pipe-separated text dumps.
///
/// Three line layouts are recognized:
/// - `bgpdump -m`: `TABLE_DUMP2|timestamp|B|peer_ip|peer_asn|prefix|as_path|...`
/// - `bgpkit-parser` PSV: `A|timestamp|peer_ip|peer_asn|prefix|as_path|origin_asns|...`
/// - minimal: `prefix|asn[ asn...]`
///
/// Lines that cannot be parsed are skipped and counted. Withdrawals, comments and header lines
/// are ignored without counting.
#[derive(Debug, Default, Clone, Copy)]
pub struct PsvLoader;

enum Line {
    Entry(Prefix, OriginSet),
    Ignored,
}

/// Origin of an AS path: the last segment, where `{a,b}` is an AS set with several origins.
fn path_origins(as_path: &str) -> Option<OriginSet> {
    let last = as_path.split_whitespace().last()?;
    let last = last.trim_start_matches('{').trim_end_matches('}');
    asn_list(last)
}

fn asn_list(field: &str) -> Option<OriginSet> {
    let mut origins = OriginSet::new();
    for token in field.split([',', ' ']).filter(|t| !t.is_empty()) {
        origins.insert(u32::from_str(token).ok()?);
    }
    (!origins.is_empty()).then_some(origins)
}

fn parse_line(line: &str) -> Option<Line> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Some(Line::Ignored);
    }
    let fields: Vec<&str> = line.split('|').collect();
    match fields[0] {
        "TABLE_DUMP" | "TABLE_DUMP2" | "TABLE_DUMP_V2" => {
            if fields.len() < 7 {
                return None;
            }
            let prefix = Prefix::from_str(fields[5]).ok()?;
            Some(Line::Entry(prefix, path_origins(fields[6])?))
        }
        "A" => {
            if fields.len() < 6 {
                return None;
            }
            let prefix = Prefix::from_str(fields[4]).ok()?;
            let origins = match fields.get(6) {
                Some(f) if !f.trim().is_empty() => asn_list(f)?,
                _ => path_origins(fields[5])?,
            };
            Some(Line::Entry(prefix, origins))
        }
        "W" | "type" => Some(Line::Ignored),
        _ if fields.len() == 2 => {
            let prefix = Prefix::from_str(fields[0]).ok()?;
            Some(Line::Entry(prefix, asn_list(fields[1])?))
        }
        _ => None,
    }
}

impl SnapshotLoader for PsvLoader {
    fn load(&self, path: &Path) -> Result<Snapshot, RibStatsError> {
        let meta = filename::parse_path(path);
        let reader = get_reader(path)?;
        let mut builder = Snapshot::builder(meta);
        let mut entries = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| RibStatsError::load(path.display(), e))?;
            match parse_line(&line) {
                Some(Line::Entry(prefix, origins)) => {
                    builder.add(prefix, &origins)?;
                    entries += 1;
                }
                Some(Line::Ignored) => {}
                None => {
                    debug!("skipping bad line {} in {}", idx + 1, path.display());
                    builder.skip();
                }
            }
        }

        let snapshot = builder.build();
        if entries == 0 && snapshot.skipped_records() > 0 {
            return Err(RibStatsError::load(
                path.display(),
                "no parseable entries found",
            ));
        }
        info!(
            "loaded {}: {} entries, {} prefixes, {} skipped",
            path.display(),
            entries,
            snapshot.num_prefixes(),
            snapshot.skipped_records()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Afi;
    use std::io::Write;

    fn entry(line: &str) -> (Prefix, OriginSet) {
        match parse_line(line) {
            Some(Line::Entry(p, o)) => (p, o),
            _ => panic!("expected an entry for {}", line),
        }
    }

    #[test]
    fn test_bgpdump_line() {
        let (p, o) = entry(
            "TABLE_DUMP2|1704067200|B|192.0.2.1|65000|8.8.8.0/24|65000 3356 15169|IGP|192.0.2.1|0|0||NAG||",
        );
        assert_eq!(p.to_string(), "8.8.8.0/24");
        assert_eq!(o, OriginSet::single(15169));

        let (_, o) =
            entry("TABLE_DUMP2|1704067200|B|192.0.2.1|65000|1.1.1.0/24|65000 {13335,64512}|IGP");
        assert_eq!(o, OriginSet::from_iter([13335, 64512]));
    }

    #[test]
    fn test_bgpkit_line() {
        let (p, o) = entry("A|1704067200|192.0.2.1|65000|2001:db8::/32|65000 64500|64500|IGP");
        assert_eq!(p.afi(), Afi::Ipv6);
        assert_eq!(o, OriginSet::single(64500));
        let (_, o) = entry("A|1704067200|192.0.2.1|65000|8.8.8.0/24|65000 15169||IGP");
        assert_eq!(o, OriginSet::single(15169));
        assert!(matches!(
            parse_line("W|1704067200|192.0.2.1|65000|8.8.8.0/24|||"),
            Some(Line::Ignored)
        ));
    }

    #[test]
    fn test_minimal_line() {
        let (p, o) = entry("10.0.0.0/8|64500 64501");
        assert_eq!(p.len(), 8);
        assert!(o.is_moas());
        assert!(parse_line("10.0.0.0/8|notanasn").is_none());
        assert!(parse_line("garbage").is_none());
        assert!(matches!(parse_line("# comment"), Some(Line::Ignored)));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "8.8.8.0/24|15169").unwrap();
        writeln!(f, "8.8.8.0/24|64512").unwrap();
        writeln!(f, "bad line").unwrap();
        writeln!(f, "2001:db8::/32|64500").unwrap();
        drop(f);

        let snapshot = PsvLoader.load(&path).unwrap();
        assert_eq!(snapshot.num_prefixes(), 2);
        assert_eq!(snapshot.skipped_records(), 1);
        let p = Prefix::from_str("8.8.8.0/24").unwrap();
        assert!(snapshot.trie(Afi::Ipv4).lookup_exact(&p).unwrap().is_moas());
    }

    #[test]
    fn test_load_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt");
        std::fs::write(&path, "not a dump\nstill not\n").unwrap();
        assert!(matches!(
            PsvLoader.load(&path),
            Err(RibStatsError::Load { .. })
        ));
    }
}

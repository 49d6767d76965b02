use crate::error::RibStatsError;
use crate::loader::io::get_reader;
use crate::loader::{filename, SnapshotLoader};
use crate::models::{OriginSet, Prefix, Snapshot};
use bgpkit_parser::error::ParserError;
use bgpkit_parser::models::ElemType;
use bgpkit_parser::{BgpkitParser, Elementor};
use log::{debug, info, warn};
use std::path::Path;

/// Loads MRT RIB dumps (TABLE_DUMP and TABLE_DUMP_V2) through `bgpkit-parser`.
///
/// Only announcements with a known origin contribute. Records the parser rejects are skipped and
/// counted. A stream that breaks off mid-record (truncated or corrupt compression) ends the load
/// with the records read so far, counting the broken tail as one skipped record. A file that
/// yields no record at all fails to load.
#[derive(Debug, Default, Clone, Copy)]
pub struct MrtLoader;

impl SnapshotLoader for MrtLoader {
    fn load(&self, path: &Path) -> Result<Snapshot, RibStatsError> {
        let meta = filename::parse_path(path);
        let reader = get_reader(path)?;
        let mut parser = BgpkitParser::from_reader(reader);
        let mut elementor = Elementor::new();
        let mut builder = Snapshot::builder(meta);
        let mut records = 0usize;

        loop {
            let record = match parser.next_record() {
                Ok(record) => record,
                Err(e) => match e.error {
                    ParserError::EofExpected => break,
                    ParserError::IoError(err) | ParserError::EofError(err) => {
                        if records == 0 {
                            return Err(RibStatsError::load(path.display(), err));
                        }
                        warn!(
                            "stopped reading {} after {} records: {}",
                            path.display(),
                            records,
                            err
                        );
                        builder.skip();
                        break;
                    }
                    err => {
                        debug!("skipping corrupt record in {}: {}", path.display(), err);
                        builder.skip();
                        continue;
                    }
                },
            };
            records += 1;

            for elem in elementor.record_to_elems(record) {
                if elem.elem_type != ElemType::ANNOUNCE {
                    continue;
                }
                let Some(asns) = elem.origin_asns.as_ref() else {
                    continue;
                };
                let origins: OriginSet = asns.iter().map(|asn| u32::from(*asn)).collect();
                if origins.is_empty() {
                    continue;
                }
                builder.add(Prefix::new(elem.prefix.prefix), &origins)?;
            }
        }

        if records == 0 {
            return Err(RibStatsError::load(path.display(), "no MRT records found"));
        }

        let snapshot = builder.build();
        info!(
            "loaded {}: {} records, {} prefixes, {} skipped",
            path.display(),
            records,
            snapshot.num_prefixes(),
            snapshot.skipped_records()
        );
        Ok(snapshot)
    }
}

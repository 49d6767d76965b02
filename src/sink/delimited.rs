use crate::error::RibStatsError;
use crate::models::{AsDistribution, DiffResult, DistStats, OriginTtl, OriginsResult, StatResult};
use crate::sink::{sink_err, Record, RecordKind, Sink};
use itertools::Itertools;
use std::collections::HashSet;
use std::io::Write;

const DELIMITER: &str = ";";

/// Writes one `;`-separated line per record, the first field naming the record kind.
///
/// Origin listings are written as one line per prefix.
pub struct DelimitedSink<W: Write + Send> {
    writer: W,
    with_header: bool,
    headers_written: HashSet<RecordKind>,
}

impl<W: Write + Send> DelimitedSink<W> {
    pub fn new(writer: W) -> Self {
        DelimitedSink {
            writer,
            with_header: false,
            headers_written: HashSet::new(),
        }
    }

    /// Emit a `#`-prefixed header line before the first record of each kind.
    pub fn with_header(mut self) -> Self {
        self.with_header = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn dist_fields(dist: &DistStats) -> [String; 4] {
    [
        dist.min.to_string(),
        dist.max.to_string(),
        format!("{:.2}", dist.mean),
        dist.median.to_string(),
    ]
}

/// Column names of a record kind. Stats lines end with one count column per prefix length.
pub fn header(kind: RecordKind) -> String {
    let fields: &[&str] = match kind {
        RecordKind::Stats => &[
            "type",
            "timestamp",
            "collector",
            "subtype",
            "afi",
            "num_prefixes",
            "num_moas",
            "num_asns",
            "num_ips",
            "num_bogus_ips",
            "num_valid_ips",
            "ip_space",
            "asn_prefixes_min",
            "asn_prefixes_max",
            "asn_prefixes_mean",
            "asn_prefixes_median",
            "asn_ips_min",
            "asn_ips_max",
            "asn_ips_mean",
            "asn_ips_median",
            "prefix_len_counts",
        ],
        RecordKind::Diff => &[
            "type",
            "before_timestamp",
            "after_timestamp",
            "collector",
            "subtype",
            "afi",
            "ips_before",
            "ips_after",
            "new_ips",
            "withdrawn_ips",
            "aggregated_ips",
            "deaggregated_ips",
            "changed_ips",
            "aggregation_events",
            "deaggregation_events",
            "new_prefixes",
            "withdrawn_prefixes",
            "modified_prefixes",
            "new_asns",
            "withdrawn_asns",
        ],
        RecordKind::Origins => &[
            "type",
            "timestamp",
            "collector",
            "subtype",
            "prefix",
            "origins",
        ],
        RecordKind::OriginTtl => &["type", "prefix", "asn", "first_seen", "last_seen", "ttl"],
    };
    fields.join(DELIMITER)
}

pub fn stats_line(res: &StatResult) -> String {
    let mut fields = vec![
        RecordKind::Stats.tag().to_string(),
        res.timestamp.to_string(),
        res.collector.to_string(),
        res.subtype.clone(),
        res.afi.to_string(),
        res.num_prefixes.to_string(),
        res.num_moas.to_string(),
        res.num_asns.to_string(),
        res.num_ips.to_string(),
        res.num_bogus_ips.to_string(),
        res.num_valid_ips.to_string(),
        format!("{:.6}", res.ip_space),
    ];
    match &res.as_dist {
        Some(AsDistribution {
            asn_prefixes,
            asn_ips,
        }) => {
            fields.extend(dist_fields(asn_prefixes));
            fields.extend(dist_fields(asn_ips));
        }
        None => fields.extend(std::iter::repeat(String::new()).take(8)),
    }
    fields.extend(res.prefix_len_counts.iter().map(|c| c.to_string()));
    fields.join(DELIMITER)
}

pub fn diff_line(res: &DiffResult) -> String {
    [
        RecordKind::Diff.tag().to_string(),
        res.before_timestamp.to_string(),
        res.after_timestamp.to_string(),
        res.collector.to_string(),
        res.subtype.clone(),
        res.afi.to_string(),
        res.ips_before.to_string(),
        res.ips_after.to_string(),
        res.new_ips.to_string(),
        res.withdrawn_ips.to_string(),
        res.aggregated_ips.to_string(),
        res.deaggregated_ips.to_string(),
        res.changed_ips.to_string(),
        res.aggregation_events.to_string(),
        res.deaggregation_events.to_string(),
        res.new_prefixes.to_string(),
        res.withdrawn_prefixes.to_string(),
        res.modified_prefixes.to_string(),
        res.new_asns.to_string(),
        res.withdrawn_asns.to_string(),
    ]
    .join(DELIMITER)
}

pub fn origins_lines(res: &OriginsResult) -> Vec<String> {
    res.entries
        .iter()
        .map(|entry| {
            [
                RecordKind::Origins.tag().to_string(),
                res.timestamp.to_string(),
                res.collector.to_string(),
                res.subtype.clone(),
                entry.prefix.to_string(),
                entry.origins.to_string(),
            ]
            .join(DELIMITER)
        })
        .collect()
}

pub fn ttl_line(res: &OriginTtl) -> String {
    [
        RecordKind::OriginTtl.tag().to_string(),
        res.prefix.to_string(),
        res.asn.to_string(),
        res.first_seen.to_string(),
        res.last_seen.to_string(),
        res.ttl.to_string(),
    ]
    .iter()
    .join(DELIMITER)
}

impl<W: Write + Send> Sink for DelimitedSink<W> {
    fn write(&mut self, record: &Record) -> Result<(), RibStatsError> {
        let kind = record.kind();
        if self.with_header && self.headers_written.insert(kind) {
            writeln!(self.writer, "#{}", header(kind)).map_err(sink_err)?;
        }
        let lines = match record {
            Record::Stats(res) => vec![stats_line(res)],
            Record::Diff(res) => vec![diff_line(res)],
            Record::Origins(res) => origins_lines(res),
            Record::OriginTtl(res) => vec![ttl_line(res)],
        };
        for line in lines {
            writeln!(self.writer, "{}", line).map_err(sink_err)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RibStatsError> {
        self.writer.flush().map_err(sink_err)
    }
}

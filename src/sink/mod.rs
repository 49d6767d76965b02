/*!
Output destinations for computed records.

A [Sink] is owned by exactly one writer and receives records one at a time. Any error it returns
is a [RibStatsError::Sink], which stops a pipeline run.
*/
mod delimited;
mod json;

pub use delimited::DelimitedSink;
pub use json::JsonSink;

use crate::error::RibStatsError;
use crate::models::{DiffResult, OriginTtl, OriginsResult, StatResult};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// One output record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    Stats(StatResult),
    #[serde(rename = "diffs")]
    Diff(DiffResult),
    Origins(OriginsResult),
    #[serde(rename = "ttl")]
    OriginTtl(OriginTtl),
}

impl Record {
    /// Record kind as written in the first field of delimited output.
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Stats(_) => RecordKind::Stats,
            Record::Diff(_) => RecordKind::Diff,
            Record::Origins(_) => RecordKind::Origins,
            Record::OriginTtl(_) => RecordKind::OriginTtl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Stats,
    Diff,
    Origins,
    OriginTtl,
}

impl RecordKind {
    pub const fn tag(&self) -> &'static str {
        match self {
            RecordKind::Stats => "STATS",
            RecordKind::Diff => "DIFFS",
            RecordKind::Origins => "ORIGINS",
            RecordKind::OriginTtl => "TTL",
        }
    }
}

pub trait Sink: Send {
    fn write(&mut self, record: &Record) -> Result<(), RibStatsError>;

    fn flush(&mut self) -> Result<(), RibStatsError>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&mut self, record: &Record) -> Result<(), RibStatsError> {
        (**self).write(record)
    }

    fn flush(&mut self) -> Result<(), RibStatsError> {
        (**self).flush()
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<Record>,
}

impl Sink for MemorySink {
    fn write(&mut self, record: &Record) -> Result<(), RibStatsError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RibStatsError> {
        Ok(())
    }
}

pub(crate) fn sink_err(e: std::io::Error) -> RibStatsError {
    RibStatsError::Sink(e.to_string())
}

/// Opens the output sink: JSON lines or delimited text, appended to `path` or written to stdout.
///
/// `header` applies to delimited output only.
pub fn open_sink(
    path: Option<&Path>,
    json: bool,
    header: bool,
) -> Result<Box<dyn Sink>, RibStatsError> {
    let writer: Box<dyn Write + Send> = match path {
        Some(path) => Box::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| RibStatsError::Sink(format!("{}: {}", path.display(), e)))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    Ok(match (json, header) {
        (true, _) => Box::new(JsonSink::new(writer)),
        (false, true) => Box::new(DelimitedSink::new(writer).with_header()),
        (false, false) => Box::new(DelimitedSink::new(writer)),
    })
}

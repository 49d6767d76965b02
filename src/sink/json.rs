use crate::error::RibStatsError;
use crate::sink::{sink_err, Record, Sink};
use std::io::Write;

/// Writes one JSON object per line, tagged with a `type` field.
pub struct JsonSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        JsonSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Sink for JsonSink<W> {
    fn write(&mut self, record: &Record) -> Result<(), RibStatsError> {
        serde_json::to_writer(&mut self.writer, record)?;
        writeln!(self.writer).map_err(sink_err)
    }

    fn flush(&mut self) -> Result<(), RibStatsError> {
        self.writer.flush().map_err(sink_err)
    }
}

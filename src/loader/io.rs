use crate::error::RibStatsError;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Opens a local dump file, decompressing by file suffix (`.gz`, `.bz2`).
pub(crate) fn get_reader(path: &Path) -> Result<Box<dyn BufRead + Send>, RibStatsError> {
    let raw = File::open(path).map_err(|e| RibStatsError::load(path.display(), e))?;

    let file_type = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match file_type {
        "gz" => Ok(Box::new(BufReader::new(GzDecoder::new(raw)))),
        "bz2" => Ok(Box::new(BufReader::new(BzDecoder::new(raw)))),
        _ => {
            debug!(
                "unknown file type of file {}. try to read as uncompressed file",
                path.display()
            );
            Ok(Box::new(BufReader::new(raw)))
        }
    }
}

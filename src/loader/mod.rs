/*!
Turning routing table dump files into [Snapshot]s.

MRT parsing itself is delegated to `bgpkit-parser`; this module opens and decompresses files,
reduces announcements to prefix-to-origin mappings, and derives snapshot metadata from the
archive naming conventions of RouteViews and RIPE RIS.
*/
mod cache;
pub mod filename;
mod io;
mod mrt;
mod psv;

pub use cache::{SnapshotCache, SnapshotKey};
pub use mrt::MrtLoader;
pub use psv::PsvLoader;

use crate::error::RibStatsError;
use crate::models::Snapshot;
use log::debug;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Produces a [Snapshot] from one dump file.
pub trait SnapshotLoader: Send + Sync {
    /// Loads the file at `path`. Unreadable or unparseable files fail with
    /// [RibStatsError::Load]; individual corrupt records are skipped and counted in
    /// [Snapshot::skipped_records].
    fn load(&self, path: &Path) -> Result<Snapshot, RibStatsError>;
}

/// Input dump format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    #[default]
    Mrt,
    Psv,
}

impl InputFormat {
    pub fn loader(&self) -> Box<dyn SnapshotLoader> {
        match self {
            InputFormat::Mrt => Box::new(MrtLoader),
            InputFormat::Psv => Box::new(PsvLoader),
        }
    }
}

impl FromStr for InputFormat {
    type Err = RibStatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mrt" => Ok(InputFormat::Mrt),
            "psv" | "text" => Ok(InputFormat::Psv),
            other => Err(RibStatsError::Format(format!(
                "unknown input format '{}'",
                other
            ))),
        }
    }
}

impl Display for InputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InputFormat::Mrt => write!(f, "mrt"),
            InputFormat::Psv => write!(f, "psv"),
        }
    }
}

fn visit(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<(), RibStatsError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                visit(&path, recursive, out)?;
            }
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if filename::is_rib_file_name(&name) {
            out.push(path);
        } else {
            debug!("ignoring {}", path.display());
        }
    }
    Ok(())
}

/// Finds RIB dump files (`rib.*.bz2`, `bview.*.gz`) under `dir`, sorted lexicographically by
/// path. Timestamps are embedded in the names, so this is also chronological per collector.
pub fn collect_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, RibStatsError> {
    if !dir.is_dir() {
        return Err(RibStatsError::load(dir.display(), "not a directory"));
    }
    let mut files = vec![];
    visit(dir, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

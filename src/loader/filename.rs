/*!
Snapshot metadata from collector archive naming conventions.

RouteViews archives look like `.../route-views.wide/bgpdata/2024.01/RIBS/rib.20240101.0000.bz2`,
RIPE RIS archives like `.../rrc01/2024.01/bview.20240101.0000.gz`.
*/
use crate::models::{CollectorType, SnapshotMeta, UNKNOWN_SUBTYPE};
use chrono::NaiveDateTime;
use log::warn;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

struct PathPatterns {
    routeviews_file: Regex,
    riperis_file: Regex,
    routeviews_dir: Regex,
    riperis_dir: Regex,
}

impl PathPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(PathPatterns {
            routeviews_file: Regex::new(r"^rib.(\d+).(\d\d\d\d).bz2")?,
            riperis_file: Regex::new(r"^bview.(\d+).(\d\d\d\d).gz")?,
            routeviews_dir: Regex::new(r"^.*/([a-z0-9\.-]+)/bgpdata/\d\d\d\d.\d\d/RIBS.*")?,
            riperis_dir: Regex::new(r"^.*/(rrc\d\d)/\d\d\d\d.\d\d.*")?,
        })
    }
}

static PATTERNS: LazyLock<Option<PathPatterns>> = LazyLock::new(|| PathPatterns::new().ok());

/// Whether the file name follows the RouteViews or RIPE RIS RIB dump naming scheme.
pub fn is_rib_file_name(name: &str) -> bool {
    match PATTERNS.as_ref() {
        Some(p) => p.routeviews_file.is_match(name) || p.riperis_file.is_match(name),
        None => false,
    }
}

fn parse_timestamp(date: &str, time: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(&format!("{}{}", date, time), "%Y%m%d%H%M")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Derives collector type, collector identity and capture time from a dump's path.
///
/// Anything that does not match falls back to `none` and the epoch, with a warning.
pub fn parse_path(path: &Path) -> SnapshotMeta {
    let mut meta = SnapshotMeta::new(0, CollectorType::None, UNKNOWN_SUBTYPE).with_path(path);
    let Some(patterns) = PATTERNS.as_ref() else {
        warn!("path patterns unavailable, cannot classify {}", path.display());
        return meta;
    };

    let dir = path
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();

    if let Some(caps) = patterns.riperis_dir.captures(&dir) {
        meta.collector = CollectorType::RipeRis;
        meta.subtype = caps[1].to_string();
    } else if let Some(caps) = patterns.routeviews_dir.captures(&dir) {
        meta.collector = CollectorType::RouteViews;
        meta.subtype = caps[1].to_string();
    } else {
        warn!("unknown bgp data source (pathname): {}", path.display());
    }

    let (collector, caps) = if let Some(caps) = patterns.riperis_file.captures(&file) {
        (CollectorType::RipeRis, caps)
    } else if let Some(caps) = patterns.routeviews_file.captures(&file) {
        (CollectorType::RouteViews, caps)
    } else {
        warn!("unknown bgp data source (filename): {}", path.display());
        return meta;
    };
    meta.collector = collector;
    match parse_timestamp(&caps[1], &caps[2]) {
        Some(ts) => meta.timestamp = ts,
        None => warn!("invalid timestamp in file name: {}", path.display()),
    }
    meta
}

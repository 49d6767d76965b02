use crate::error::RibStatsError;
use crate::loader::{filename, SnapshotLoader};
use crate::models::{CollectorType, Snapshot, SnapshotMeta};
use log::debug;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of a loaded snapshot. Snapshots without a known collector identity are also keyed by
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    timestamp: i64,
    collector: CollectorType,
    subtype: String,
    path: Option<PathBuf>,
}

impl From<&SnapshotMeta> for SnapshotKey {
    fn from(meta: &SnapshotMeta) -> Self {
        SnapshotKey {
            timestamp: meta.timestamp,
            collector: meta.collector,
            subtype: meta.subtype.clone(),
            path: match meta.is_identified() {
                true => None,
                false => Some(meta.path.clone()),
            },
        }
    }
}

/// Fixed-capacity least-recently-used cache of loaded snapshots.
///
/// Diffing adjacent pairs loads every file twice; a small cache per worker avoids most of the
/// repeated parsing.
#[derive(Debug)]
pub struct SnapshotCache {
    capacity: usize,
    // most recently used at the back
    entries: VecDeque<(SnapshotKey, Arc<Snapshot>)>,
    hits: usize,
    misses: usize,
}

impl SnapshotCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> SnapshotCache {
        SnapshotCache {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn get(&mut self, key: &SnapshotKey) -> Option<Arc<Snapshot>> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        let entry = self.entries.remove(pos)?;
        let snapshot = entry.1.clone();
        self.entries.push_back(entry);
        Some(snapshot)
    }

    /// Inserts a snapshot, evicting the least recently used one when full.
    pub fn put(&mut self, key: SnapshotKey, snapshot: Arc<Snapshot>) {
        if self.capacity == 0 {
            return;
        }
        if let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) {
            self.entries.remove(pos);
        }
        while self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                debug!("evicting snapshot {:?} from cache", evicted);
            }
        }
        self.entries.push_back((key, snapshot));
    }

    /// Returns the cached snapshot for `path`, loading it on a miss.
    pub fn get_or_load(
        &mut self,
        loader: &dyn SnapshotLoader,
        path: &Path,
    ) -> Result<Arc<Snapshot>, RibStatsError> {
        let key = SnapshotKey::from(&filename::parse_path(path));
        if let Some(snapshot) = self.get(&key) {
            self.hits += 1;
            return Ok(snapshot);
        }
        self.misses += 1;
        let snapshot = Arc::new(loader.load(path)?);
        self.put(key, snapshot.clone());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PsvLoader;
    use crate::models::Afi;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use std::io::Write;

    fn snapshot(ts: i64) -> (SnapshotKey, Arc<Snapshot>) {
        let meta = SnapshotMeta::new(ts, CollectorType::RipeRis, "rrc00");
        (
            SnapshotKey::from(&meta),
            Arc::new(Snapshot::builder(meta).build()),
        )
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = SnapshotCache::new(2);
        let (k1, s1) = snapshot(1);
        let (k2, s2) = snapshot(2);
        let (k3, s3) = snapshot(3);
        cache.put(k1.clone(), s1);
        cache.put(k2.clone(), s2);
        // touch 1 so that 2 becomes least recently used
        assert!(cache.get(&k1).is_some());
        cache.put(k3.clone(), s3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn test_zero_capacity() {
        let mut cache = SnapshotCache::new(0);
        let (k1, s1) = snapshot(1);
        cache.put(k1.clone(), s1);
        assert!(cache.is_empty());
        assert!(cache.get(&k1).is_none());
    }

    #[test]
    fn test_unknown_sources_keyed_by_path() {
        let a = SnapshotMeta::new(0, CollectorType::None, "none").with_path("/tmp/a");
        let b = SnapshotMeta::new(0, CollectorType::None, "none").with_path("/tmp/b");
        assert_ne!(SnapshotKey::from(&a), SnapshotKey::from(&b));

        // collector type known from the file name only
        let a = SnapshotMeta::new(1, CollectorType::RipeRis, "none").with_path("a/bview.gz");
        let b = SnapshotMeta::new(1, CollectorType::RipeRis, "none").with_path("b/bview.gz");
        assert_ne!(SnapshotKey::from(&a), SnapshotKey::from(&b));
    }

    fn write_dump(path: &Path, line: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        writeln!(encoder, "{}", line).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_same_file_name_in_unknown_directories() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a/bview.20240101.0000.gz");
        let b = dir.path().join("b/bview.20240101.0000.gz");
        write_dump(&a, "8.8.8.0/24|15169");
        write_dump(&b, "1.0.0.0/8|13335");

        let mut cache = SnapshotCache::new(3);
        let first = cache.get_or_load(&PsvLoader, &a).unwrap();
        let second = cache.get_or_load(&PsvLoader, &b).unwrap();
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.hits(), 0);
        assert_eq!(first.trie(Afi::Ipv4).prefixes()[0].to_string(), "8.8.8.0/24");
        assert_eq!(second.trie(Afi::Ipv4).prefixes()[0].to_string(), "1.0.0.0/8");

        let again = cache.get_or_load(&PsvLoader, &b).unwrap();
        assert!(Arc::ptr_eq(&second, &again));
        assert_eq!(cache.hits(), 1);
    }
}

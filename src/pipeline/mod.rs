/*!
Parallel processing of snapshot files.

Work items are numbered in dispatch order and pushed into a shared `crossbeam-channel` queue that
a fixed number of worker threads drain. Each worker keeps its own [SnapshotCache] and sends one
[ItemOutcome] per item to a single writer thread. The writer owns the [Sink], re-orders outcomes
back into dispatch order and writes them one at a time. At most
[reorder_window][PipelineConfig::reorder_window] items are dispatched ahead of the writer.

A failing item is logged and counted, and the run goes on. A failing sink stops the run: workers
stop taking new items, and records that already reached the writer go to standard output instead.
*/
mod config;

pub use config::{default_workers, PipelineConfig};

use crate::addrspace::ReservedRanges;
use crate::compute::{compute_origins, DiffComputer, OriginTtlTracker, StatsComputer};
use crate::error::RibStatsError;
use crate::loader::{filename, SnapshotCache, SnapshotLoader};
use crate::sink::{DelimitedSink, Record, Sink};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::io::Stdout;
use std::ops::AddAssign;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One independent unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Stats(PathBuf),
    /// Diff of two adjacent files, earlier first.
    Diff(PathBuf, PathBuf),
    Origins(PathBuf),
}

/// Result of processing one [WorkItem].
#[derive(Debug)]
pub enum ItemOutcome {
    Done(Vec<Record>),
    /// The item does not apply, e.g. a diff across two collectors.
    Skipped(RibStatsError),
    Failed(RibStatsError),
}

impl ItemOutcome {
    fn from_result(res: Result<Vec<Record>, RibStatsError>) -> ItemOutcome {
        match res {
            Ok(records) => ItemOutcome::Done(records),
            Err(e @ RibStatsError::MismatchedSource { .. }) => ItemOutcome::Skipped(e),
            Err(e) => ItemOutcome::Failed(e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub sink_failures: usize,
    /// Items never processed because the run was stopped.
    pub unprocessed: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.sink_failures == 0
    }
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.processed += rhs.processed;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
        self.sink_failures += rhs.sink_failures;
        self.unprocessed += rhs.unprocessed;
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "processed: {}, skipped: {}, failed: {}, sink failures: {}",
            self.processed, self.skipped, self.failed, self.sink_failures
        )?;
        if self.unprocessed > 0 {
            write!(f, ", not processed: {}", self.unprocessed)?;
        }
        Ok(())
    }
}

/// Builds the work list for chronologically sorted files: `Stats(F0), Stats(F1), Diff(F0, F1),
/// Stats(F2), Diff(F1, F2), ...`, with `Origins` items following each file's `Stats` item.
pub fn plan(files: &[PathBuf], config: &PipelineConfig) -> Vec<WorkItem> {
    let mut items = vec![];
    for (i, file) in files.iter().enumerate() {
        if config.stats {
            items.push(WorkItem::Stats(file.clone()));
        }
        if config.origins {
            items.push(WorkItem::Origins(file.clone()));
        }
        if config.diffs && i > 0 {
            items.push(WorkItem::Diff(files[i - 1].clone(), file.clone()));
        }
    }
    items
}

/// Writes records to the sink, switching to standard output once the sink fails.
struct OutputWriter<'a> {
    sink: &'a mut dyn Sink,
    emergency: Option<DelimitedSink<Stdout>>,
    abort: &'a AtomicBool,
    summary: RunSummary,
}

impl<'a> OutputWriter<'a> {
    fn new(sink: &'a mut dyn Sink, abort: &'a AtomicBool) -> Self {
        OutputWriter {
            sink,
            emergency: None,
            abort,
            summary: RunSummary::default(),
        }
    }

    fn emit(&mut self, record: &Record) {
        if self.emergency.is_none() {
            match self.sink.write(record) {
                Ok(()) => return,
                Err(e) => {
                    error!("{}; stopping run, remaining output goes to stdout", e);
                    self.summary.sink_failures += 1;
                    self.abort.store(true, Ordering::SeqCst);
                    self.emergency = Some(DelimitedSink::new(std::io::stdout()));
                }
            }
        }
        if let Some(emergency) = self.emergency.as_mut() {
            if let Err(e) = emergency.write(record) {
                error!("emergency output failed: {}", e);
            }
        }
    }

    fn handle(&mut self, idx: usize, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Done(records) => {
                self.summary.processed += 1;
                for record in &records {
                    self.emit(record);
                }
            }
            ItemOutcome::Skipped(e) => {
                warn!("skipping item {}: {}", idx, e);
                self.summary.skipped += 1;
            }
            ItemOutcome::Failed(e) => {
                error!("item {} failed: {}", idx, e);
                self.summary.failed += 1;
            }
        }
    }

    fn finish(mut self) -> RunSummary {
        match self.emergency.as_mut() {
            Some(emergency) => {
                if let Err(e) = emergency.flush() {
                    error!("emergency output failed: {}", e);
                }
            }
            None => {
                if let Err(e) = self.sink.flush() {
                    error!("{}", e);
                    self.summary.sink_failures += 1;
                }
            }
        }
        self.summary
    }
}

/// Per-thread computation state.
struct Worker<'a> {
    loader: &'a dyn SnapshotLoader,
    cache: SnapshotCache,
    stats: StatsComputer<'a>,
    diff: DiffComputer<'a>,
    config: &'a PipelineConfig,
}

impl<'a> Worker<'a> {
    fn process(&mut self, item: &WorkItem) -> Result<Vec<Record>, RibStatsError> {
        match item {
            WorkItem::Stats(path) => {
                let snapshot = self.cache.get_or_load(self.loader, path)?;
                self.config
                    .afis
                    .iter()
                    .map(|afi| self.stats.compute(&snapshot, *afi).map(Record::Stats))
                    .collect()
            }
            WorkItem::Origins(path) => {
                let snapshot = self.cache.get_or_load(self.loader, path)?;
                Ok(vec![Record::Origins(compute_origins(&snapshot))])
            }
            WorkItem::Diff(before, after) => {
                let meta_before = filename::parse_path(before);
                let meta_after = filename::parse_path(after);
                if !meta_before.same_source(&meta_after) {
                    return Err(RibStatsError::MismatchedSource {
                        before: meta_before.source(),
                        after: meta_after.source(),
                    });
                }
                let before = self.cache.get_or_load(self.loader, before)?;
                let after = self.cache.get_or_load(self.loader, after)?;
                self.config
                    .afis
                    .iter()
                    .map(|afi| self.diff.compute(&before, &after, *afi).map(Record::Diff))
                    .collect()
            }
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    loader: Arc<dyn SnapshotLoader>,
    reserved: &'static ReservedRanges,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Pipeline {
        let loader: Arc<dyn SnapshotLoader> = Arc::from(config.input_format.loader());
        Pipeline {
            config,
            loader,
            reserved: ReservedRanges::global(),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn SnapshotLoader>) -> Pipeline {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes sorted snapshot files and writes all results to `sink`.
    pub fn run(&self, files: &[PathBuf], sink: &mut dyn Sink) -> RunSummary {
        self.run_items(plan(files, &self.config), sink)
    }

    pub fn run_items(&self, items: Vec<WorkItem>, sink: &mut dyn Sink) -> RunSummary {
        let total = items.len();
        info!(
            "processing {} items with {} workers",
            total, self.config.workers
        );
        let (work_tx, work_rx) = unbounded::<(usize, WorkItem)>();
        let (result_tx, result_rx) = unbounded::<(usize, ItemOutcome)>();
        // one credit per item that may be dispatched ahead of the writer
        let window = self.config.reorder_window.max(1);
        let (credit_tx, credit_rx) = bounded::<()>(window);
        for _ in 0..window {
            let _ = credit_tx.try_send(());
        }

        let abort = AtomicBool::new(false);
        let summary = std::thread::scope(|s| {
            let abort = &abort;
            s.spawn(move || {
                for (idx, item) in items.into_iter().enumerate() {
                    if credit_rx.recv().is_err() || abort.load(Ordering::SeqCst) {
                        break;
                    }
                    if work_tx.send((idx, item)).is_err() {
                        break;
                    }
                }
            });
            for id in 0..self.config.workers.max(1) {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                s.spawn(move || self.work(id, work_rx, result_tx, abort));
            }
            drop(work_rx);
            drop(result_tx);

            let writer = s.spawn(move || write_outcomes(result_rx, credit_tx, sink, abort));
            writer.join().unwrap_or_else(|_| {
                error!("writer thread panicked");
                RunSummary {
                    sink_failures: 1,
                    ..Default::default()
                }
            })
        });

        let mut summary = summary;
        summary.unprocessed = total
            .saturating_sub(summary.processed + summary.skipped + summary.failed);
        if summary.unprocessed > 0 {
            warn!("{} items were not processed", summary.unprocessed);
        }
        info!("run finished: {}", summary);
        summary
    }

    fn work(
        &self,
        id: usize,
        work_rx: Receiver<(usize, WorkItem)>,
        result_tx: Sender<(usize, ItemOutcome)>,
        abort: &AtomicBool,
    ) {
        let mut worker = Worker {
            loader: self.loader.as_ref(),
            cache: SnapshotCache::new(self.config.cache_size),
            stats: StatsComputer::new(self.reserved)
                .with_as_distribution(self.config.as_distribution),
            diff: DiffComputer::new(self.reserved),
            config: &self.config,
        };
        while let Ok((idx, item)) = work_rx.recv() {
            if abort.load(Ordering::SeqCst) {
                break;
            }
            debug!("worker {} processing item {}: {:?}", id, idx, item);
            let outcome = match catch_unwind(AssertUnwindSafe(|| worker.process(&item))) {
                Ok(res) => ItemOutcome::from_result(res),
                Err(_) => ItemOutcome::Failed(RibStatsError::load(
                    format!("{:?}", item),
                    "worker panicked",
                )),
            };
            if result_tx.send((idx, outcome)).is_err() {
                break;
            }
        }
        debug!(
            "worker {} done, cache hits {} misses {}",
            id,
            worker.cache.hits(),
            worker.cache.misses()
        );
    }
}

/// Drains outcomes and writes them in item order. Returns one credit to the dispatcher per item
/// written, so `pending` never holds more than the reorder window.
fn write_outcomes(
    result_rx: Receiver<(usize, ItemOutcome)>,
    credit_tx: Sender<()>,
    sink: &mut dyn Sink,
    abort: &AtomicBool,
) -> RunSummary {
    let mut writer = OutputWriter::new(sink, abort);
    let mut pending: BTreeMap<usize, ItemOutcome> = BTreeMap::new();
    let mut next = 0;
    for (idx, outcome) in result_rx.iter() {
        pending.insert(idx, outcome);
        while let Some(outcome) = pending.remove(&next) {
            writer.handle(next, outcome);
            next += 1;
            let _ = credit_tx.try_send(());
        }
    }
    // gaps remain only if the run was stopped
    for (idx, outcome) in pending {
        writer.handle(idx, outcome);
    }
    writer.finish()
}

/// Tracks prefix to origin lifetimes over sorted files, one series per collector, and writes
/// [OriginTtl][crate::models::OriginTtl] records. Runs sequentially since every snapshot depends
/// on the previous one.
pub fn run_origin_ttl(
    files: &[PathBuf],
    loader: &dyn SnapshotLoader,
    sink: &mut dyn Sink,
) -> RunSummary {
    let abort = AtomicBool::new(false);
    let mut writer = OutputWriter::new(sink, &abort);
    let mut trackers: HashMap<String, OriginTtlTracker> = HashMap::new();

    for (idx, path) in files.iter().enumerate() {
        if abort.load(Ordering::SeqCst) {
            writer.summary.unprocessed += 1;
            continue;
        }
        let outcome = match loader.load(path) {
            Ok(snapshot) => {
                let meta = snapshot.meta();
                // files of unknown collectors form a series of one
                let series = match meta.is_identified() {
                    true => meta.source(),
                    false => meta.path.display().to_string(),
                };
                let tracker = trackers.entry(series).or_default();
                let records = tracker
                    .observe(&snapshot)
                    .into_iter()
                    .map(Record::OriginTtl)
                    .collect();
                ItemOutcome::Done(records)
            }
            Err(e) => ItemOutcome::Failed(e),
        };
        writer.handle(idx, outcome);
    }

    let mut sources: Vec<String> = trackers.keys().cloned().collect();
    sources.sort();
    for source in sources {
        if let Some(tracker) = trackers.remove(&source) {
            for ttl in tracker.finish() {
                writer.emit(&Record::OriginTtl(ttl));
            }
        }
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectorType, OriginSet, Prefix, Snapshot, SnapshotMeta};
    use crate::sink::MemorySink;
    use std::path::Path;
    use std::str::FromStr;

    /// Serves a one-prefix snapshot for any path; paths containing `corrupt` fail.
    struct FakeLoader;

    impl SnapshotLoader for FakeLoader {
        fn load(&self, path: &Path) -> Result<Snapshot, RibStatsError> {
            let name = path.to_string_lossy();
            if name.contains("corrupt") {
                return Err(RibStatsError::load(name, "bad header"));
            }
            Snapshot::from_entries(
                filename::parse_path(path),
                [(
                    Prefix::from_str("8.8.8.0/24").unwrap(),
                    OriginSet::single(15169),
                )],
            )
        }
    }

    /// Counts concurrent loads; the first file loads slowly.
    #[derive(Default)]
    struct TrackingLoader {
        in_flight: std::sync::atomic::AtomicUsize,
        max_in_flight: std::sync::atomic::AtomicUsize,
    }

    impl SnapshotLoader for TrackingLoader {
        fn load(&self, path: &Path) -> Result<Snapshot, RibStatsError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let delay = match path.to_string_lossy().contains("20240101.0000") {
                true => 50,
                false => 5,
            };
            std::thread::sleep(std::time::Duration::from_millis(delay));
            let res = FakeLoader.load(path);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            res
        }
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn write(&mut self, _record: &Record) -> Result<(), RibStatsError> {
            Err(RibStatsError::Sink("disk full".to_string()))
        }

        fn flush(&mut self) -> Result<(), RibStatsError> {
            Ok(())
        }
    }

    fn files(names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| PathBuf::from(format!("/data/rrc00/2024.01/{}", n)))
            .collect()
    }

    fn pipeline(workers: usize) -> Pipeline {
        let config = PipelineConfig::default()
            .with_workers(workers)
            .with_afis(&[crate::models::Afi::Ipv4]);
        Pipeline::new(config).with_loader(Arc::new(FakeLoader))
    }

    #[test]
    fn test_plan_order() {
        let f = files(&["bview.20240101.0000.gz", "bview.20240101.0800.gz"]);
        let items = plan(&f, &PipelineConfig::default());
        assert_eq!(
            items,
            vec![
                WorkItem::Stats(f[0].clone()),
                WorkItem::Stats(f[1].clone()),
                WorkItem::Diff(f[0].clone(), f[1].clone()),
            ]
        );
    }

    #[test]
    fn test_ordered_output() {
        let f = files(&[
            "bview.20240101.0000.gz",
            "bview.20240101.0800.gz",
            "bview.20240101.1600.gz",
        ]);
        let mut sink = MemorySink::default();
        let summary = pipeline(4).run(&f, &mut sink);
        assert_eq!(summary.processed, 5);
        assert!(summary.is_success());
        let kinds: Vec<&str> = sink.records.iter().map(|r| r.kind().tag()).collect();
        assert_eq!(kinds, vec!["STATS", "STATS", "DIFFS", "STATS", "DIFFS"]);
    }

    #[test]
    fn test_reorder_window_bounds_in_flight_items() {
        let items: Vec<WorkItem> = (0..8)
            .map(|day| {
                WorkItem::Stats(PathBuf::from(format!(
                    "/data/rrc00/2024.01/bview.202401{:02}.0000.gz",
                    day + 1
                )))
            })
            .collect();
        let loader = Arc::new(TrackingLoader::default());
        let config = PipelineConfig::default()
            .with_workers(4)
            .with_afis(&[crate::models::Afi::Ipv4])
            .with_reorder_window(2);
        let mut sink = MemorySink::default();
        let summary = Pipeline::new(config)
            .with_loader(loader.clone())
            .run_items(items, &mut sink);
        assert_eq!(summary.processed, 8);
        assert!(summary.is_success());
        assert!(loader.max_in_flight.load(Ordering::SeqCst) <= 2);

        let timestamps: Vec<i64> = sink
            .records
            .iter()
            .filter_map(|r| match r {
                Record::Stats(s) => Some(s.timestamp),
                _ => None,
            })
            .collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps.len(), 8);
        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn test_fault_isolation() {
        let items = vec![
            WorkItem::Stats(PathBuf::from("/data/rrc00/2024.01/bview.20240101.0000.gz")),
            WorkItem::Stats(PathBuf::from("/data/rrc00/2024.01/bview.20240101.0800.gz")),
            WorkItem::Stats(PathBuf::from("/data/rrc00/2024.01/corrupt.gz")),
            WorkItem::Stats(PathBuf::from("/data/rrc00/2024.01/bview.20240102.0000.gz")),
            WorkItem::Stats(PathBuf::from("/data/rrc00/2024.01/bview.20240102.0800.gz")),
        ];
        let mut sink = MemorySink::default();
        let summary = pipeline(2).run_items(items, &mut sink);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(sink.records.len(), 4);
    }

    #[test]
    fn test_mismatched_pair_skipped() {
        let items = vec![WorkItem::Diff(
            PathBuf::from("/data/route-views.wide/bgpdata/2024.01/RIBS/rib.20240101.0000.bz2"),
            PathBuf::from("/data/rrc01/2024.01/bview.20240101.0000.gz"),
        )];
        let mut sink = MemorySink::default();
        let summary = pipeline(1).run_items(items, &mut sink);
        assert_eq!(summary.skipped, 1);
        assert!(sink.records.is_empty());
    }

    #[test]
    fn test_unknown_sources_not_diffed() {
        let f = vec![
            PathBuf::from("/data/a/bview.20240101.0000.gz"),
            PathBuf::from("/data/b/bview.20240101.0800.gz"),
        ];
        let mut sink = MemorySink::default();
        let summary = pipeline(1).run(&f, &mut sink);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert!(sink
            .records
            .iter()
            .all(|r| matches!(r, Record::Stats(_))));
    }

    #[test]
    fn test_sink_failure_stops_run() {
        let f = files(&["bview.20240101.0000.gz", "bview.20240101.0800.gz"]);
        let mut sink = FailingSink;
        let summary = pipeline(1).run(&f, &mut sink);
        assert_eq!(summary.sink_failures, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_origin_ttl_run() {
        let f = files(&[
            "bview.20240101.0000.gz",
            "bview.20240101.0800.gz",
            "bview.20240101.1600.gz",
        ]);
        let mut sink = MemorySink::default();
        let summary = run_origin_ttl(&f, &FakeLoader, &mut sink);
        assert_eq!(summary.processed, 3);
        assert_eq!(sink.records.len(), 1);
        match &sink.records[0] {
            Record::OriginTtl(ttl) => {
                assert_eq!(ttl.asn, 15169);
                assert_eq!(ttl.ttl, 16 * 3600);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_empty_run() {
        let mut sink = MemorySink::default();
        let summary = pipeline(3).run(&[], &mut sink);
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn test_meta_from_path() {
        let meta = filename::parse_path(Path::new("/data/rrc00/2024.01/bview.20240101.0000.gz"));
        assert_eq!(meta.collector, CollectorType::RipeRis);
        let other = SnapshotMeta::new(meta.timestamp, CollectorType::RipeRis, "rrc00");
        assert!(meta.same_source(&other));
    }
}

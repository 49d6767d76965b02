//! End-to-end runs over small gzip-compressed text dumps laid out like a RIPE RIS archive.
use bgpkit_ribstats::loader::{collect_files, InputFormat, PsvLoader, SnapshotLoader};
use bgpkit_ribstats::models::{Afi, CollectorType};
use bgpkit_ribstats::pipeline::run_origin_ttl;
use bgpkit_ribstats::sink::{DelimitedSink, JsonSink, MemorySink, Record};
use bgpkit_ribstats::{Pipeline, PipelineConfig, StatsComputer};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_dump(root: &Path, collector: &str, time: &str, lines: &[&str]) -> PathBuf {
    let dir = root.join(collector).join("2024.01");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("bview.{}.gz", time));
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    for line in lines {
        writeln!(encoder, "{}", line).unwrap();
    }
    encoder.finish().unwrap();
    path
}

fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

fn config() -> PipelineConfig {
    PipelineConfig::default()
        .with_workers(3)
        .with_afis(&[Afi::Ipv4])
        .with_input_format(InputFormat::Psv)
}

fn kinds(records: &[Record]) -> Vec<&'static str> {
    records.iter().map(|r| r.kind().tag()).collect()
}

#[test]
fn test_load_is_idempotent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_dump(
        dir.path(),
        "rrc00",
        "20240101.0000",
        &["8.8.8.0/24|15169", "1.1.1.0/24|13335", "2001:4860::/32|15169"],
    );
    let first = PsvLoader.load(&path)?;
    let second = PsvLoader.load(&path)?;
    assert_eq!(first.meta(), second.meta());
    assert_eq!(first.meta().collector, CollectorType::RipeRis);
    assert_eq!(first.meta().subtype, "rrc00");
    assert_eq!(first.meta().timestamp, 1704067200);
    for afi in Afi::all() {
        let computer = StatsComputer::default();
        assert_eq!(computer.compute(&first, afi)?, computer.compute(&second, afi)?);
    }
    Ok(())
}

#[test]
fn test_bulk_run_in_order() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    write_dump(
        dir.path(),
        "rrc00",
        "20240101.0000",
        &["8.8.8.0/25|15169", "8.8.8.128/25|15169"],
    );
    write_dump(dir.path(), "rrc00", "20240101.0800", &["8.8.8.0/24|15169"]);
    write_dump(
        dir.path(),
        "rrc00",
        "20240101.1600",
        &["8.8.8.0/24|15169", "1.1.1.0/24|13335"],
    );
    let files = collect_files(dir.path(), true).unwrap();
    assert_eq!(files.len(), 3);

    let mut sink = MemorySink::default();
    let summary = Pipeline::new(config()).run(&files, &mut sink);
    assert!(summary.is_success());
    assert_eq!(summary.processed, 5);
    assert_eq!(
        kinds(&sink.records),
        vec!["STATS", "STATS", "DIFFS", "STATS", "DIFFS"]
    );

    let diffs: Vec<_> = sink
        .records
        .iter()
        .filter_map(|r| match r {
            Record::Diff(d) => Some(d),
            _ => None,
        })
        .collect();
    assert_eq!(diffs[0].before_timestamp, 1704067200);
    assert_eq!(diffs[0].after_timestamp, 1704067200 + 8 * 3600);
    assert_eq!(diffs[0].aggregated_ips, 256);
    assert_eq!(diffs[0].aggregation_events, 1);
    assert_eq!(diffs[0].new_ips, 0);
    assert_eq!(diffs[1].new_ips, 256);
    assert_eq!(diffs[1].new_asns, 1);
    assert_eq!(diffs[1].withdrawn_ips, 0);
}

#[test]
fn test_corrupt_file_is_isolated() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let mut files = vec![];
    for (i, time) in ["0000", "0800", "1600", "2000", "2200"].iter().enumerate() {
        let time = format!("20240101.{}", time);
        if i == 2 {
            let path = dir.path().join("rrc00/2024.01").join(format!("bview.{}.gz", time));
            std::fs::write(&path, b"definitely not gzip").unwrap();
            files.push(path);
        } else {
            files.push(write_dump(dir.path(), "rrc00", &time, &["8.8.8.0/24|15169"]));
        }
    }

    let config = config().with_products(true, false, false);
    let mut sink = MemorySink::default();
    let summary = Pipeline::new(config).run(&files, &mut sink);
    assert!(summary.is_success());
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(sink.records.len(), 4);

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
    assert_eq!(timestamps, sorted);
}

#[test]
fn test_collectors_are_not_diffed() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write_dump(dir.path(), "rrc00", "20240101.0000", &["8.8.8.0/24|15169"]),
        write_dump(dir.path(), "rrc01", "20240101.0000", &["8.8.8.0/24|15169"]),
    ];
    let mut sink = MemorySink::default();
    let summary = Pipeline::new(config()).run(&files, &mut sink);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(kinds(&sink.records), vec!["STATS", "STATS"]);
}

#[test]
fn test_delimited_output() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write_dump(dir.path(), "rrc00", "20240101.0000", &["8.8.8.0/24|15169"]),
        write_dump(
            dir.path(),
            "rrc00",
            "20240101.0800",
            &["8.8.8.0/24|15169 64500"],
        ),
    ];
    let mut sink = DelimitedSink::new(Vec::new()).with_header();
    let summary = Pipeline::new(config()).run(&files, &mut sink);
    assert!(summary.is_success());

    let out = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("#type;timestamp;collector"));
    assert!(lines[1].starts_with("STATS;1704067200;riperis;rrc00;ipv4;1;0;1;256;"));
    assert!(lines[3].starts_with("#type;before_timestamp"));
    let diff: Vec<&str> = lines[4].split(';').collect();
    assert_eq!(diff[0], "DIFFS");
    // modified_prefixes
    assert_eq!(diff[17], "1");
}

#[test]
fn test_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![write_dump(
        dir.path(),
        "rrc00",
        "20240101.0000",
        &["8.8.8.0/24|15169", "2001:4860::/32|15169"],
    )];
    let config = PipelineConfig::default()
        .with_workers(1)
        .with_input_format(InputFormat::Psv)
        .with_products(true, false, true);
    let mut sink = JsonSink::new(Vec::new());
    let summary = Pipeline::new(config).run(&files, &mut sink);
    assert!(summary.is_success());

    let out = String::from_utf8(sink.into_inner()).unwrap();
    let values: Vec<serde_json::Value> = out
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(values.len(), 3);
    assert_eq!(values[0]["type"], "stats");
    assert_eq!(values[0]["afi"], "ipv4");
    assert_eq!(values[1]["afi"], "ipv6");
    assert!(out.contains("\"num_ips\":79228162514264337593543950336"));
    assert_eq!(values[2]["type"], "origins");
    assert_eq!(values[2]["entries"].as_array().unwrap().len(), 2);
}

#[test]
fn test_origin_ttl_run() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write_dump(dir.path(), "rrc00", "20240101.0000", &["8.8.8.0/24|15169"]),
        write_dump(
            dir.path(),
            "rrc00",
            "20240101.0800",
            &["8.8.8.0/24|15169", "1.1.1.0/24|13335"],
        ),
        write_dump(dir.path(), "rrc00", "20240101.1600", &["1.1.1.0/24|13335"]),
    ];
    let mut sink = MemorySink::default();
    let summary = run_origin_ttl(&files, &PsvLoader, &mut sink);
    assert!(summary.is_success());

    let ttls: Vec<_> = sink
        .records
        .iter()
        .filter_map(|r| match r {
            Record::OriginTtl(t) => Some((t.prefix.to_string(), t.asn, t.ttl)),
            _ => None,
        })
        .collect();
    assert_eq!(
        ttls,
        vec![
            ("8.8.8.0/24".to_string(), 15169, 8 * 3600),
            ("1.1.1.0/24".to_string(), 13335, 8 * 3600),
        ]
    );
}

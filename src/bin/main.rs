use bgpkit_ribstats::loader::{collect_files, InputFormat};
use bgpkit_ribstats::models::Afi;
use bgpkit_ribstats::pipeline::{default_workers, run_origin_ttl};
use bgpkit_ribstats::sink::open_sink;
use bgpkit_ribstats::{Pipeline, PipelineConfig, RunSummary};
use clap::{ArgAction, Parser};
use env_logger::Env;
use log::info;
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

/// ribstats computes prefix statistics and snapshot diffs over BGP RIB dumps.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    /// Process a single RIB dump file
    #[clap(short, long, conflicts_with = "bulk", required_unless_present = "bulk")]
    single: Option<PathBuf>,

    /// Process all RIB dump files found in a directory, in time order
    #[clap(short, long)]
    bulk: Option<PathBuf>,

    /// Descend into subdirectories in bulk mode
    #[clap(short, long)]
    recursive: bool,

    /// Compute per-snapshot statistics
    #[clap(long)]
    stats: bool,

    /// Compute diffs between consecutive snapshots (bulk mode only)
    #[clap(long)]
    diffs: bool,

    /// List the origin ASes of every prefix
    #[clap(long)]
    origins: bool,

    /// Track how long each prefix keeps each origin AS across the snapshots
    #[clap(long)]
    origin_ttl: bool,

    /// Number of worker threads, defaults to half the available cores
    #[clap(short = 'n', long)]
    workers: Option<usize>,

    /// Only compute IPv4 results
    #[clap(short = '4', long)]
    ipv4_only: bool,

    /// Only compute IPv6 results
    #[clap(short = '6', long)]
    ipv6_only: bool,

    /// Include per origin AS prefix and address distributions in statistics
    #[clap(long)]
    as_dist: bool,

    /// Number of loaded snapshots each worker keeps for reuse
    #[clap(long, default_value_t = 3)]
    cache_size: usize,

    /// Input file format: mrt or psv
    #[clap(short, long, default_value_t = InputFormat::Mrt)]
    format: InputFormat,

    /// Output as JSON objects, one per line
    #[clap(long)]
    json: bool,

    /// Write a header line before the first record of each kind (delimited output only)
    #[clap(long)]
    header: bool,

    /// Append output to a file instead of writing to stdout
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Increase log verbosity, can be repeated
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[clap(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() {
    let opts: Opts = Opts::parse();

    let level = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let afis: Vec<Afi> = match (opts.ipv4_only, opts.ipv6_only) {
        (true, true) => {
            eprintln!("Error: --ipv4-only and --ipv6-only cannot be used together");
            exit(1);
        }
        (true, false) => vec![Afi::Ipv4],
        (false, true) => vec![Afi::Ipv6],
        (false, false) => Afi::all().to_vec(),
    };

    let single = opts.single.is_some();
    let files: Vec<PathBuf> = match (&opts.single, &opts.bulk) {
        (Some(file), _) => {
            if !file.is_file() {
                eprintln!("Error: {} is not a file", file.display());
                exit(1);
            }
            vec![file.clone()]
        }
        (None, Some(dir)) => match collect_files(dir, opts.recursive) {
            Ok(files) => files,
            Err(e) => {
                eprintln!("Error: {}", e);
                exit(1);
            }
        },
        (None, None) => {
            eprintln!("Error: one of --single or --bulk is required");
            exit(1);
        }
    };
    if files.is_empty() {
        eprintln!("Error: no RIB dump files found");
        exit(1);
    }
    info!("found {} input files", files.len());

    if single && opts.diffs {
        eprintln!("Error: --diffs needs at least two snapshots, use --bulk");
        exit(1);
    }
    let (stats, diffs) = match opts.stats || opts.diffs || opts.origins || opts.origin_ttl {
        true => (opts.stats, opts.diffs),
        false => (true, !single),
    };

    let config = PipelineConfig::default()
        .with_workers(opts.workers.unwrap_or_else(default_workers))
        .with_afis(&afis)
        .with_products(stats, diffs, opts.origins)
        .with_input_format(opts.format)
        .with_cache_size(opts.cache_size)
        .with_as_distribution(opts.as_dist);

    let mut sink = match open_sink(opts.output.as_deref(), opts.json, opts.header) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    let start = Instant::now();
    let mut summary = RunSummary::default();
    if stats || diffs || opts.origins {
        summary += Pipeline::new(config).run(&files, sink.as_mut());
    }
    if opts.origin_ttl && summary.is_success() {
        let loader = opts.format.loader();
        summary += run_origin_ttl(&files, loader.as_ref(), sink.as_mut());
    }
    info!("finished in {:.2?}", start.elapsed());

    eprintln!("{}", summary);
    if !summary.is_success() {
        exit(1);
    }
}

//! Cache hierarchy simulator CLI.
//!
//! This binary provides the single entry point for trace-driven runs. It
//! performs:
//! 1. **Configuration:** JSON config loading (`-c`), with command-line
//!    overrides for the victim cache and multiprocessor mode.
//! 2. **Simulation:** single-core hierarchy or N-core MESI system, chosen
//!    by configuration.
//! 3. **Reporting:** statistics printout, optional occupancy visualization
//!    (`--vis`), ASCII hit-rate charts (`--charts`), and CSV export (`-e`).
//!
//! Exit codes: 0 success, 1 bad arguments or missing input, 2 configuration
//! error, 3 simulation I/O error.

mod output;

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cachesim_core::config::SimConfig;
use cachesim_core::hierarchy::MemoryHierarchy;
use cachesim_core::mp::MultiProcessorSystem;
use cachesim_core::trace;

const EXIT_BAD_ARGS: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_IO: i32 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "cachesim",
    version,
    about = "Trace-driven cache hierarchy and MESI coherence simulator",
    long_about = "Replay a memory access trace through a configurable cache hierarchy.\n\nTrace lines are `<op> <addr>[ <core_id>]` or `P<id> <op> <addr>` with op r/w and\nhex or decimal addresses. Configuration is JSON (see --config); the defaults\nmodel a 32 KiB 4-way L1 with 64-byte blocks.\n\nExamples:\n  cachesim traces/seq.trace\n  cachesim -c configs/l2.json --charts traces/mixed.trace\n  cachesim -p 4 traces/parallel.trace -e results.csv",
    disable_version_flag = true
)]
struct Cli {
    /// Trace file to replay.
    trace_file: PathBuf,

    /// JSON configuration file.
    #[arg(short, long, value_name = "path")]
    config: Option<PathBuf>,

    /// Measure wall-clock time and report throughput.
    #[arg(short, long)]
    benchmark: bool,

    /// Render a per-set occupancy snapshot after the run.
    #[arg(long = "vis", visible_alias = "visualize")]
    vis: bool,

    /// Render ASCII hit-rate charts after the run.
    #[arg(long)]
    charts: bool,

    /// Export statistics as CSV (default path: cachesim-stats.csv).
    #[arg(
        short,
        long,
        value_name = "path",
        num_args = 0..=1,
        default_missing_value = "cachesim-stats.csv"
    )]
    export: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Run in multiprocessor mode with N cores (default 2).
    #[arg(
        short,
        long,
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = "2"
    )]
    parallel: Option<usize>,

    /// Enable the victim cache (default size) regardless of configuration.
    #[arg(long)]
    victim_cache: bool,

    /// Print version.
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            process::exit(0);
        }
        Err(e) => {
            let _ = e.print();
            process::exit(EXIT_BAD_ARGS);
        }
    };
    process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    init_logging(cli);

    let mut config = match &cli.config {
        Some(path) => match SimConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return EXIT_CONFIG;
            }
        },
        None => SimConfig::default(),
    };
    if cli.victim_cache {
        config.victim_cache.enabled = true;
    }
    if let Some(n) = cli.parallel {
        config.multiprocessor.enabled = true;
        config.multiprocessor.num_processors = n;
    }
    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        return EXIT_CONFIG;
    }

    let (accesses, trace_stats) = match trace::load_trace(&cli.trace_file, config.strict) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_IO;
        }
    };

    let start = Instant::now();
    let mut report;
    let snapshots;
    if config.multiprocessor.enabled {
        let mut system = match MultiProcessorSystem::new(&config) {
            Ok(system) => system,
            Err(e) => {
                eprintln!("error: {e}");
                return EXIT_CONFIG;
            }
        };
        let traces =
            MultiProcessorSystem::split_by_core(&accesses, config.multiprocessor.num_processors);
        let _cycles = system.simulate_parallel_traces(&traces);
        report = system.report();
        snapshots = system.snapshots();
    } else {
        let mut hierarchy = match MemoryHierarchy::new(&config) {
            Ok(hierarchy) => hierarchy,
            Err(e) => {
                eprintln!("error: {e}");
                return EXIT_CONFIG;
            }
        };
        for access in &accesses {
            let _ = hierarchy.access(access.address, access.is_write);
        }
        report = hierarchy.report();
        snapshots = hierarchy.snapshots();
    }

    report.trace = trace_stats;
    if cli.benchmark {
        report.host_seconds = start.elapsed().as_secs_f64();
    }

    report.print();
    if cli.vis {
        output::print_snapshots(&snapshots, !cli.no_color);
    }
    if cli.charts {
        output::print_charts(&report, !cli.no_color);
    }
    if let Some(path) = &cli.export {
        // Export failure is nonfatal; the run itself succeeded.
        if let Err(e) = output::export_csv(path, &report) {
            warn!(path = %path.display(), %e, "CSV export failed");
            eprintln!("warning: CSV export failed: {e}");
        } else {
            println!("statistics exported to {}", path.display());
        }
    }
    0
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .try_init();
}

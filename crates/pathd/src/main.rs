//! pathd — watch filesystem path conditions and activate target units.
//!
//! Loads `.path` unit files from the unit directories, starts each
//! trigger, and runs evaluation passes until interrupted.  Target units
//! are tracked in an in-memory unit table: start and stop requests are
//! recorded and logged rather than executed, which makes `pathd` usable
//! for exercising and debugging `.path` unit files without a service
//! manager behind it.

use clap::Parser;
use libpathd::config::{Config, LoggingConfig, default_unit_dirs};
use libpathd::logging::setup_logging;
use libpathd::manager::InMemoryManager;
use libpathd::path_scheduler::{SchedulerConfig, run_path_pass, start_path_scheduler_thread};
use libpathd::units::load_path_units;
use log::{error, info};
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "pathd",
    about = "Watch filesystem path conditions and activate target units",
    version
)]
struct Cli {
    /// Directory to load .path unit files from.  May be given multiple
    /// times; earlier directories take priority.  Defaults to the
    /// well-known pathd unit directories.
    #[arg(long = "unit-dir", value_name = "DIR")]
    unit_dirs: Vec<PathBuf>,

    /// Milliseconds between evaluation passes.
    #[arg(long, value_name = "MS", default_value_t = 500)]
    interval_ms: u64,

    /// Fail a unit whose evaluation pass takes longer than this many
    /// milliseconds.
    #[arg(long, value_name = "MS")]
    evaluation_guard_ms: Option<u64>,

    /// Run a single evaluation pass, print the resulting states, and exit.
    #[arg(long)]
    oneshot: bool,

    /// Log level: error, warn, info, debug or trace.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: log::LevelFilter,
}

fn main() {
    let cli = Cli::parse();

    let logging_config = LoggingConfig {
        log_to_stdout: true,
        level: cli.log_level,
    };
    if let Err(e) = setup_logging(&logging_config) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let config = Config {
        unit_dirs: if cli.unit_dirs.is_empty() {
            default_unit_dirs()
        } else {
            cli.unit_dirs.clone()
        },
        check_interval: Duration::from_millis(cli.interval_ms),
        evaluation_guard: cli.evaluation_guard_ms.map(Duration::from_millis),
    };
    if config.unit_dirs.is_empty() {
        error!("No unit directories found; use --unit-dir");
        process::exit(1);
    }

    let mut units = match load_path_units(&config.unit_dirs) {
        Ok(units) => units,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };
    if units.is_empty() {
        error!(
            "No .path units found in {:?}",
            config.unit_dirs
        );
        process::exit(1);
    }
    info!("Loaded {} path unit(s)", units.len());

    let mgr = Arc::new(InMemoryManager::new());
    for unit in &units {
        mgr.add_unit(unit.target_name());
    }

    for unit in &mut units {
        if let Err(e) = unit.start() {
            error!("{e}");
        }
    }

    if cli.oneshot {
        run_path_pass(&mut units, &*mgr, config.evaluation_guard);
        for unit in &units {
            println!(
                "{}: state={} result={} target={}",
                unit.name,
                unit.state(),
                unit.result(),
                unit.target_name()
            );
        }
        return;
    }

    let shared_units = Arc::new(RwLock::new(units));
    let scheduler = start_path_scheduler_thread(
        shared_units,
        mgr,
        SchedulerConfig {
            check_interval: config.check_interval,
            evaluation_guard: config.evaluation_guard,
        },
    );

    // The scheduler loops until the process is killed.
    if scheduler.join().is_err() {
        error!("Path scheduler thread panicked");
        process::exit(1);
    }
}

//! Configuration for pathd-rs.
//!
//! There is no config file; the monitor reads `.path` unit files from
//! well-known directories (overridable on the command line) and takes
//! everything else from defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::path_scheduler::PATH_CHECK_INTERVAL;

#[derive(Debug)]
pub struct LoggingConfig {
    pub log_to_stdout: bool,
    pub level: log::LevelFilter,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_to_stdout: true,
            level: log::LevelFilter::Info,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Unit search directories, in priority order.
    pub unit_dirs: Vec<PathBuf>,
    pub check_interval: Duration,
    pub evaluation_guard: Option<Duration>,
}

/// Well-known unit search directories (system instance), in priority order.
const SYSTEM_UNIT_DIRS: &[&str] = &[
    "/etc/pathd/units",
    "/run/pathd/units",
    "/usr/local/lib/pathd/units",
    "/usr/lib/pathd/units",
];

/// The well-known unit directories that exist on this system.
pub fn default_unit_dirs() -> Vec<PathBuf> {
    SYSTEM_UNIT_DIRS
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            unit_dirs: default_unit_dirs(),
            check_interval: PATH_CHECK_INTERVAL,
            evaluation_guard: None,
        }
    }
}

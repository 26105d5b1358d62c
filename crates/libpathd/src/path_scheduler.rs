//! Path unit scheduling — drives condition evaluation passes.
//!
//! The scheduler thread wakes up periodically and runs one evaluation
//! pass over every path unit.  All trigger logic lives in
//! [`PathUnit::evaluate_pass`]; this module only supplies the wake-ups,
//! so a notification-based front-end could replace the sleep loop without
//! touching the state machine.

use log::{error, info};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::manager::UnitManager;
use crate::units::{PathState, PathUnit};

/// How often the scheduler thread wakes up to evaluate conditions.
pub const PATH_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Shared table of path units, written by the scheduler thread.
pub type SharedPathUnits = Arc<RwLock<Vec<PathUnit>>>;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    pub check_interval: Duration,
    /// When set, a unit whose evaluation exceeds this bound fails with
    /// result `Timeout`.  Off by default.
    pub evaluation_guard: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            check_interval: PATH_CHECK_INTERVAL,
            evaluation_guard: None,
        }
    }
}

/// One pass of the evaluation loop over all units, in table order.
///
/// Errors fail only the unit they belong to; the pass continues with the
/// remaining units.
pub fn run_path_pass<M: UnitManager + ?Sized>(
    units: &mut [PathUnit],
    mgr: &M,
    evaluation_guard: Option<Duration>,
) {
    for unit in units.iter_mut() {
        let begin = Instant::now();
        if let Err(e) = unit.evaluate_pass(mgr) {
            error!("{e}");
            continue;
        }
        if let Some(guard) = evaluation_guard
            && begin.elapsed() > guard
            && matches!(unit.state(), PathState::Waiting | PathState::Running)
        {
            unit.mark_timed_out();
        }
    }
}

/// Start the background path scheduler thread.
///
/// Call after the path units have been loaded and started.
pub fn start_path_scheduler_thread<M>(
    units: SharedPathUnits,
    mgr: Arc<M>,
    conf: SchedulerConfig,
) -> std::thread::JoinHandle<()>
where
    M: UnitManager + Send + Sync + 'static,
{
    std::thread::Builder::new()
        .name("path-scheduler".into())
        .spawn(move || {
            info!("Path scheduler started");
            loop {
                {
                    let mut units = units.write().unwrap_or_else(|e| e.into_inner());
                    run_path_pass(&mut units, &*mgr, conf.evaluation_guard);
                }
                std::thread::sleep(conf.check_interval);
            }
        })
        .expect("Failed to spawn path-scheduler thread")
}

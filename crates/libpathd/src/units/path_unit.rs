//! The path trigger unit and its state machine.

use log::{info, trace, warn};
use std::path::PathBuf;

use super::condition::{ConditionMemory, EvaluationError, PathCondition, PathConditionKind};
use super::dispatcher::{ActivationError, fire_target};
use super::provision::ensure_directory;
use super::ConfigError;
use crate::manager::UnitManager;
use crate::unit_name;

/// Default for `DirectoryMode=` per systemd.path(5).
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o755;

/// Consecutive failed start requests tolerated before the trigger fails.
pub const MAX_ACTIVATION_RETRIES: u32 = 5;

/// Lifecycle state of a path trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathState {
    /// Not watching anything.
    Dead,
    /// Watching, no condition currently calls for activation.
    Waiting,
    /// A condition fired and the target was dispatched.
    Running,
    /// The trigger gave up; see the result for why.
    Failed,
}

impl std::fmt::Display for PathState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PathState::Dead => "dead",
            PathState::Waiting => "waiting",
            PathState::Running => "running",
            PathState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Why a trigger ended up in its current terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathResult {
    Success,
    /// The activation retry budget was exhausted.
    Failure,
    /// Provisioning or condition evaluation hit a filesystem error.
    ResourceExhaustion,
    /// An evaluation pass exceeded the configured time guard.
    Timeout,
}

impl std::fmt::Display for PathResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PathResult::Success => "success",
            PathResult::Failure => "failure",
            PathResult::ResourceExhaustion => "resources",
            PathResult::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

/// Runtime configuration of a path trigger, i.e. its `[Path]` section.
#[derive(Clone, Debug)]
pub struct PathConfig {
    pub conditions: Vec<PathCondition>,
    /// Explicit `Unit=` override; derived from the trigger's own name
    /// when absent.
    pub unit: Option<String>,
    /// `MakeDirectory=`: create watched directories before watching.
    pub make_directory: bool,
    /// `DirectoryMode=`: mode for directories created by `MakeDirectory=`.
    pub directory_mode: u32,
}

impl Default for PathConfig {
    fn default() -> Self {
        PathConfig {
            conditions: Vec::new(),
            unit: None,
            make_directory: false,
            directory_mode: DEFAULT_DIRECTORY_MODE,
        }
    }
}

/// Error during a trigger operation, recorded together with the unit it
/// happened to.  The trigger's state already reflects the failure when
/// one of these is returned.
#[derive(Clone, Debug)]
pub struct PathOperationError {
    pub unit_name: String,
    pub reason: PathOperationErrorReason,
}

#[derive(Clone, Debug)]
pub enum PathOperationErrorReason {
    ProvisionError { path: PathBuf, message: String },
    EvaluationError(EvaluationError),
    ActivationError(ActivationError),
}

impl std::fmt::Display for PathOperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            PathOperationErrorReason::ProvisionError { path, message } => write!(
                f,
                "Error in path unit {}: could not create directory {}: {}",
                self.unit_name,
                path.display(),
                message
            ),
            PathOperationErrorReason::EvaluationError(e) => {
                write!(f, "Error in path unit {}: {}", self.unit_name, e)
            }
            PathOperationErrorReason::ActivationError(e) => {
                write!(f, "Error in path unit {}: {}", self.unit_name, e)
            }
        }
    }
}

/// A `.path` unit: a set of filesystem conditions plus the state needed
/// to decide when to start the target unit.
#[derive(Debug)]
pub struct PathUnit {
    pub name: String,
    pub conf: PathConfig,
    target_name: String,
    state: PathState,
    result: PathResult,
    memories: Vec<ConditionMemory>,
    activation_retries: u32,
    /// A qualifying signal was seen but the fire has not succeeded yet.
    pending_fire: bool,
}

impl PathUnit {
    /// Validate the configuration and build a trigger in state `Dead`.
    pub fn new(name: impl Into<String>, conf: PathConfig) -> Result<Self, ConfigError> {
        let name = name.into();
        if conf.conditions.is_empty() {
            return Err(ConfigError::NoConditions { unit_name: name });
        }
        let target_name = match &conf.unit {
            Some(explicit) => {
                if unit_name::unit_suffix(explicit).is_none() {
                    return Err(ConfigError::BadUnitName {
                        name: explicit.clone(),
                    });
                }
                explicit.clone()
            }
            None => unit_name::replace_suffix(&name, ".service").ok_or_else(|| {
                ConfigError::BadUnitName { name: name.clone() }
            })?,
        };
        let memories = vec![ConditionMemory::default(); conf.conditions.len()];
        Ok(PathUnit {
            name,
            conf,
            target_name,
            state: PathState::Dead,
            result: PathResult::Success,
            memories,
            activation_retries: 0,
            pending_fire: false,
        })
    }

    pub const fn state(&self) -> PathState {
        self.state
    }

    pub const fn result(&self) -> PathResult {
        self.result
    }

    /// Name of the unit this trigger starts.
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Begin watching: provision directories if configured, snapshot the
    /// current filesystem state as the change baseline, enter `Waiting`.
    ///
    /// Allowed from `Dead` and from `Failed` (which resets the failure).
    pub fn start(&mut self) -> Result<(), PathOperationError> {
        trace!("Starting path unit {}", self.name);
        if self.conf.make_directory {
            self.provision_directories()?;
        }
        for (condition, memory) in self.conf.conditions.iter().zip(self.memories.iter_mut()) {
            condition.arm(memory);
        }
        self.activation_retries = 0;
        self.pending_fire = false;
        self.state = PathState::Waiting;
        self.result = PathResult::Success;
        info!(
            "Path unit {} is now waiting on {} condition(s), target {}",
            self.name,
            self.conf.conditions.len(),
            self.target_name
        );
        Ok(())
    }

    /// Stop watching.  If the target is still active a stop is requested
    /// for it as well.  Safe from any state.
    pub fn stop<M: UnitManager + ?Sized>(&mut self, mgr: &M) {
        if self.state == PathState::Dead {
            return;
        }
        if let Some(handle) = mgr.lookup_unit(&self.target_name)
            && mgr.unit_state(handle).is_active()
            && let Err(e) = mgr.request_stop(handle)
        {
            warn!(
                "Path unit {} could not stop target {}: {}",
                self.name, self.target_name, e
            );
        }
        self.state = PathState::Dead;
        self.pending_fire = false;
        info!("Path unit {} stopped", self.name);
    }

    /// One reactor wake-up: evaluate every condition against the current
    /// filesystem state, then commit at most one transition.
    pub fn evaluate_pass<M: UnitManager + ?Sized>(
        &mut self,
        mgr: &M,
    ) -> Result<(), PathOperationError> {
        match self.state {
            PathState::Dead | PathState::Failed => return Ok(()),
            PathState::Waiting | PathState::Running => {}
        }

        // Evaluate everything before committing anything, so a pass never
        // observes a half-updated trigger.
        let mut qualifying = false;
        for (condition, memory) in self.conf.conditions.iter().zip(self.memories.iter_mut()) {
            match condition.evaluate(memory) {
                Ok(eval) => {
                    if condition.kind.is_edge_triggered() {
                        qualifying |= eval.new_edge;
                    } else {
                        qualifying |= eval.satisfied;
                    }
                }
                // Fail closed: a path we cannot inspect must not count as
                // "not satisfied".
                Err(e) => {
                    warn!("Path unit {} failed to evaluate {}: {}", self.name, condition, e);
                    self.state = PathState::Failed;
                    self.result = PathResult::ResourceExhaustion;
                    return Err(PathOperationError {
                        unit_name: self.name.clone(),
                        reason: PathOperationErrorReason::EvaluationError(e),
                    });
                }
            }
        }
        if qualifying {
            self.pending_fire = true;
        }

        match self.state {
            PathState::Waiting => {
                if self.pending_fire {
                    self.try_fire(mgr)?;
                }
            }
            PathState::Running => {
                if self.pending_fire {
                    // Level conditions that still hold restart a finished
                    // target; the dispatcher makes this a no-op while the
                    // target is active.
                    self.try_fire(mgr)?;
                } else if self.target_is_terminal(mgr) {
                    self.rearm();
                }
            }
            PathState::Dead | PathState::Failed => {}
        }
        Ok(())
    }

    /// Used by the scheduler when a pass exceeded the evaluation guard.
    pub(crate) fn mark_timed_out(&mut self) {
        warn!("Path unit {} exceeded its evaluation time guard", self.name);
        self.state = PathState::Failed;
        self.result = PathResult::Timeout;
        self.pending_fire = false;
    }

    fn provision_directories(&mut self) -> Result<(), PathOperationError> {
        for condition in &self.conf.conditions {
            // Only kinds that watch a concrete directory get one created;
            // existence checks and glob patterns do not.
            match condition.kind {
                PathConditionKind::Exists | PathConditionKind::ExistsGlob => continue,
                PathConditionKind::Changed
                | PathConditionKind::Modified
                | PathConditionKind::DirectoryNotEmpty => {}
            }
            let dir = PathBuf::from(&condition.pattern);
            if let Err(e) = ensure_directory(&dir, self.conf.directory_mode) {
                self.state = PathState::Failed;
                self.result = PathResult::ResourceExhaustion;
                return Err(PathOperationError {
                    unit_name: self.name.clone(),
                    reason: PathOperationErrorReason::ProvisionError {
                        path: dir,
                        message: e.to_string(),
                    },
                });
            }
        }
        Ok(())
    }

    fn target_is_terminal<M: UnitManager + ?Sized>(&self, mgr: &M) -> bool {
        match mgr.lookup_unit(&self.target_name) {
            Some(handle) => mgr.unit_state(handle).is_terminal(),
            // The target vanished from the manager's table.
            None => true,
        }
    }

    fn try_fire<M: UnitManager + ?Sized>(&mut self, mgr: &M) -> Result<(), PathOperationError> {
        match fire_target(mgr, &self.name, &self.target_name) {
            Ok(()) => {
                self.pending_fire = false;
                self.activation_retries = 0;
                if self.state != PathState::Running {
                    self.state = PathState::Running;
                }
                Ok(())
            }
            Err(e) => {
                self.activation_retries += 1;
                if self.activation_retries >= MAX_ACTIVATION_RETRIES {
                    warn!(
                        "Path unit {} giving up on target {} after {} failed attempts",
                        self.name, self.target_name, self.activation_retries
                    );
                    self.state = PathState::Failed;
                    self.result = PathResult::Failure;
                    return Err(PathOperationError {
                        unit_name: self.name.clone(),
                        reason: PathOperationErrorReason::ActivationError(e),
                    });
                }
                warn!(
                    "Path unit {} could not start target {} (attempt {}/{}): {}; will retry",
                    self.name, self.target_name, self.activation_retries, MAX_ACTIVATION_RETRIES, e
                );
                Ok(())
            }
        }
    }

    /// The target terminated and no condition calls for another start:
    /// take fresh baselines and go back to `Waiting`.
    fn rearm(&mut self) {
        for (condition, memory) in self.conf.conditions.iter().zip(self.memories.iter_mut()) {
            condition.arm(memory);
        }
        self.pending_fire = false;
        self.activation_retries = 0;
        self.state = PathState::Waiting;
        info!(
            "Path unit {}: target {} is inactive, waiting again",
            self.name, self.target_name
        );
    }
}

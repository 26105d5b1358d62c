//! Filesystem condition evaluation for path triggers.
//!
//! Each condition is a `(kind, pattern)` pair plus a per-condition
//! [`ConditionMemory`] owned by the trigger.  Evaluation is a pure function
//! of the current filesystem state and that memory, so the state machine
//! can evaluate everything first and commit transitions afterwards.

use glob::Pattern;
use log::trace;
use nix::errno::Errno;
use nix::sys::stat::{FileStat, stat};
use std::path::Path;

use super::ConfigError;

/// The five condition kinds of a `[Path]` section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathConditionKind {
    /// `PathExists=`: the path exists.
    Exists,
    /// `PathExistsGlob=`: at least one path matches the glob pattern.
    ExistsGlob,
    /// `PathChanged=`: any attribute of the path changed since last seen,
    /// including appearing or disappearing.
    Changed,
    /// `PathModified=`: the path appeared, or its modification time advanced.
    Modified,
    /// `DirectoryNotEmpty=`: the path is a directory with at least one entry.
    DirectoryNotEmpty,
}

impl PathConditionKind {
    /// Edge-triggered kinds fire once per distinct change; the others hold
    /// for as long as the condition is true.
    pub const fn is_edge_triggered(&self) -> bool {
        matches!(self, Self::Changed | Self::Modified)
    }

    /// The `[Path]` directive this kind is configured with.
    pub const fn directive(&self) -> &'static str {
        match self {
            Self::Exists => "PathExists",
            Self::ExistsGlob => "PathExistsGlob",
            Self::Changed => "PathChanged",
            Self::Modified => "PathModified",
            Self::DirectoryNotEmpty => "DirectoryNotEmpty",
        }
    }
}

/// One configured watch of a path trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathCondition {
    pub kind: PathConditionKind,
    pub pattern: String,
}

impl std::fmt::Display for PathCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.kind.directive(), self.pattern)
    }
}

/// Attributes of a watched path used to detect changes between passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatSnapshot {
    pub ino: u64,
    pub mode: u32,
    pub size: i64,
    /// Modification time as (seconds, nanoseconds).
    pub mtime: (i64, i64),
}

impl From<&FileStat> for StatSnapshot {
    fn from(st: &FileStat) -> Self {
        StatSnapshot {
            ino: st.st_ino as u64,
            mode: st.st_mode as u32,
            size: st.st_size as i64,
            mtime: (st.st_mtime as i64, st.st_mtime_nsec as i64),
        }
    }
}

/// Per-condition evaluation memory owned by the trigger.
#[derive(Clone, Debug, Default)]
pub struct ConditionMemory {
    last_satisfied: bool,
    last_snapshot: Option<StatSnapshot>,
}

/// Result of evaluating one condition in one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConditionEval {
    /// The condition holds right now.  For edge-triggered kinds this means
    /// "a change was observed in this pass".
    pub satisfied: bool,
    /// The condition was not satisfied the last time it was evaluated.
    pub new_edge: bool,
}

/// Hard failure while inspecting the filesystem.  Deliberately distinct
/// from "condition not satisfied": a path we cannot inspect must fail the
/// trigger, not silently count as absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvaluationError {
    Stat { path: String, errno: Errno },
    ReadDir { path: String, message: String },
    Glob { pattern: String, message: String },
}

impl std::fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationError::Stat { path, errno } => {
                write!(f, "Could not stat path {path}: {errno}")
            }
            EvaluationError::ReadDir { path, message } => {
                write!(f, "Could not read directory {path}: {message}")
            }
            EvaluationError::Glob { pattern, message } => {
                write!(f, "Could not expand glob pattern {pattern}: {message}")
            }
        }
    }
}

impl PathCondition {
    /// Build a condition, rejecting patterns that could never match.
    pub fn new(
        kind: PathConditionKind,
        pattern: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(ConfigError::EmptyPattern { kind });
        }
        if kind == PathConditionKind::ExistsGlob
            && let Err(e) = Pattern::new(&pattern)
        {
            return Err(ConfigError::InvalidGlob {
                pattern,
                message: e.to_string(),
            });
        }
        Ok(PathCondition { kind, pattern })
    }

    /// Record the current filesystem state as the change-detection baseline.
    ///
    /// Called when the trigger enters `Waiting`.  Snapshotting (rather than
    /// clearing) the memory is what keeps an existing but unchanged file
    /// from re-firing an edge-triggered condition after the target exits.
    pub fn arm(&self, memory: &mut ConditionMemory) {
        memory.last_satisfied = false;
        // Inspection errors are left for the first evaluation to surface.
        memory.last_snapshot = take_snapshot(&self.pattern).ok().flatten();
    }

    /// Evaluate the condition against the current filesystem state.
    pub fn evaluate(
        &self,
        memory: &mut ConditionMemory,
    ) -> Result<ConditionEval, EvaluationError> {
        let eval = match self.kind {
            PathConditionKind::Exists => {
                self.level_eval(take_snapshot(&self.pattern)?.is_some(), memory)
            }
            PathConditionKind::ExistsGlob => {
                self.level_eval(glob_matches_anything(&self.pattern)?, memory)
            }
            PathConditionKind::DirectoryNotEmpty => {
                self.level_eval(directory_not_empty(&self.pattern)?, memory)
            }
            PathConditionKind::Changed | PathConditionKind::Modified => {
                let current = take_snapshot(&self.pattern)?;
                let changed = match self.kind {
                    PathConditionKind::Modified => {
                        modified_since(memory.last_snapshot, current)
                    }
                    _ => current != memory.last_snapshot,
                };
                memory.last_snapshot = current;
                memory.last_satisfied = changed;
                // Every distinct change is its own edge.
                ConditionEval {
                    satisfied: changed,
                    new_edge: changed,
                }
            }
        };
        if eval.satisfied {
            trace!("Condition {self} is satisfied (new edge: {})", eval.new_edge);
        }
        Ok(eval)
    }

    fn level_eval(&self, satisfied: bool, memory: &mut ConditionMemory) -> ConditionEval {
        let new_edge = satisfied && !memory.last_satisfied;
        memory.last_satisfied = satisfied;
        ConditionEval {
            satisfied,
            new_edge,
        }
    }
}

/// `Ok(None)` when the path does not exist, `Err` for anything that keeps
/// us from knowing whether it does.
fn take_snapshot(path: &str) -> Result<Option<StatSnapshot>, EvaluationError> {
    match stat(Path::new(path)) {
        Ok(st) => Ok(Some(StatSnapshot::from(&st))),
        Err(Errno::ENOENT | Errno::ENOTDIR) => Ok(None),
        Err(errno) => Err(EvaluationError::Stat {
            path: path.to_owned(),
            errno,
        }),
    }
}

/// `PathModified=` ignores disappearance; only creation or an mtime that
/// moved forward count.
fn modified_since(last: Option<StatSnapshot>, current: Option<StatSnapshot>) -> bool {
    match (last, current) {
        (None, Some(_)) => true,
        (Some(last), Some(current)) => current.mtime > last.mtime,
        (_, None) => false,
    }
}

fn glob_matches_anything(pattern: &str) -> Result<bool, EvaluationError> {
    let paths = glob::glob(pattern).map_err(|e| EvaluationError::Glob {
        pattern: pattern.to_owned(),
        message: e.to_string(),
    })?;
    for entry in paths {
        match entry {
            Ok(_) => return Ok(true),
            // An unreadable directory during expansion means we cannot tell
            // whether anything matches.
            Err(e) => {
                return Err(EvaluationError::Glob {
                    pattern: pattern.to_owned(),
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(false)
}

fn directory_not_empty(path: &str) -> Result<bool, EvaluationError> {
    let mut entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => return Ok(false),
        Err(e) => {
            return Err(EvaluationError::ReadDir {
                path: path.to_owned(),
                message: e.to_string(),
            });
        }
    };
    match entries.next() {
        None => Ok(false),
        Some(Ok(_)) => Ok(true),
        Some(Err(e)) => Err(EvaluationError::ReadDir {
            path: path.to_owned(),
            message: e.to_string(),
        }),
    }
}

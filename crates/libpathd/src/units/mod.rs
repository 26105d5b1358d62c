//! Path trigger units: conditions, the state machine, provisioning,
//! target activation, and unit file parsing.

mod condition;
mod dispatcher;
mod from_parsed_config;
mod loading;
mod path_unit;
mod provision;
mod unit_parsing;

pub use condition::{
    ConditionEval, ConditionMemory, EvaluationError, PathCondition, PathConditionKind,
    StatSnapshot,
};
pub use dispatcher::{ActivationError, fire_target};
pub use loading::{LoadingError, load_path_units};
pub use path_unit::{
    DEFAULT_DIRECTORY_MODE, MAX_ACTIVATION_RETRIES, PathConfig, PathOperationError,
    PathOperationErrorReason, PathResult, PathState, PathUnit,
};
pub use provision::ensure_directory;
pub use unit_parsing::{
    ParsedFile, ParsedPathConfig, ParsedPathSection, ParsedSection, ParsingErrorReason,
    parse_file, parse_path,
};

use condition::PathConditionKind as Kind;

/// Rejected trigger configuration.  A unit with one of these problems is
/// refused at construction and never enters the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A condition directive with an empty pattern.
    EmptyPattern { kind: Kind },
    /// A `PathExistsGlob=` pattern that is not a valid glob.
    InvalidGlob { pattern: String, message: String },
    /// The `[Path]` section configures nothing to watch.
    NoConditions { unit_name: String },
    /// A unit name without a recognized type suffix.
    BadUnitName { name: String },
    /// A `DirectoryMode=` value that is not an octal mode.
    BadDirectoryMode { value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EmptyPattern { kind } => {
                write!(f, "{}= requires a non-empty path", kind.directive())
            }
            ConfigError::InvalidGlob { pattern, message } => {
                write!(f, "Invalid glob pattern {pattern}: {message}")
            }
            ConfigError::NoConditions { unit_name } => {
                write!(f, "Path unit {unit_name} has no conditions to watch")
            }
            ConfigError::BadUnitName { name } => {
                write!(f, "Name {name} has no recognized unit type suffix")
            }
            ConfigError::BadDirectoryMode { value } => {
                write!(f, "DirectoryMode={value} is not a valid octal mode")
            }
        }
    }
}

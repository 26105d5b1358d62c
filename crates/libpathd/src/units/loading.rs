//! Discovery and loading of `.path` unit files from unit directories.

use log::{trace, warn};
use std::path::{Path, PathBuf};

use super::path_unit::PathUnit;
use super::unit_parsing::{parse_file, parse_path};
use super::ConfigError;
use super::unit_parsing::ParsingErrorReason;

#[derive(Clone, Debug)]
pub enum LoadingError {
    Io { path: PathBuf, message: String },
    Parsing { path: PathBuf, reason: ParsingErrorReason },
    Config { path: PathBuf, reason: ConfigError },
}

impl std::fmt::Display for LoadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadingError::Io { path, message } => {
                write!(f, "Could not read {}: {}", path.display(), message)
            }
            LoadingError::Parsing { path, reason } => {
                write!(f, "Could not parse {}: {}", path.display(), reason)
            }
            LoadingError::Config { path, reason } => {
                write!(f, "Invalid path unit {}: {}", path.display(), reason)
            }
        }
    }
}

/// Load every `*.path` file found in the given directories.
///
/// Directories are searched in priority order: when the same unit name
/// appears in more than one directory, the first occurrence wins and the
/// later ones are skipped.
pub fn load_path_units(unit_dirs: &[PathBuf]) -> Result<Vec<PathUnit>, LoadingError> {
    let mut units: Vec<PathUnit> = Vec::new();

    for dir in unit_dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping unit directory {}: {}", dir.display(), e);
                continue;
            }
        };
        for entry in entries {
            let entry = entry.map_err(|e| LoadingError::Io {
                path: dir.clone(),
                message: e.to_string(),
            })?;
            let file_path = entry.path();
            if file_path.extension().and_then(|e| e.to_str()) != Some("path") {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if units.iter().any(|u| u.name == name) {
                trace!(
                    "Skipping {}: unit {} already loaded from an earlier directory",
                    file_path.display(),
                    name
                );
                continue;
            }
            units.push(load_path_unit(&file_path)?);
        }
    }

    Ok(units)
}

fn load_path_unit(file_path: &Path) -> Result<PathUnit, LoadingError> {
    let content = std::fs::read_to_string(file_path).map_err(|e| LoadingError::Io {
        path: file_path.to_owned(),
        message: e.to_string(),
    })?;
    let parsed_file = parse_file(&content).map_err(|reason| LoadingError::Parsing {
        path: file_path.to_owned(),
        reason,
    })?;
    let parsed = parse_path(parsed_file, file_path).map_err(|reason| LoadingError::Parsing {
        path: file_path.to_owned(),
        reason,
    })?;
    parsed.try_into().map_err(|reason| LoadingError::Config {
        path: file_path.to_owned(),
        reason,
    })
}

//! Conversion from raw parsed unit files into validated runtime units.

use super::condition::{PathCondition, PathConditionKind};
use super::path_unit::{DEFAULT_DIRECTORY_MODE, PathConfig, PathUnit};
use super::unit_parsing::ParsedPathConfig;
use super::ConfigError;

fn parse_directory_mode(value: &str) -> Result<u32, ConfigError> {
    u32::from_str_radix(value, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| ConfigError::BadDirectoryMode {
            value: value.to_owned(),
        })
}

impl TryFrom<ParsedPathConfig> for PathUnit {
    type Error = ConfigError;

    fn try_from(parsed: ParsedPathConfig) -> Result<Self, Self::Error> {
        let mut conditions = Vec::new();
        let kinds = [
            (PathConditionKind::Exists, &parsed.path.path_exists),
            (PathConditionKind::ExistsGlob, &parsed.path.path_exists_glob),
            (PathConditionKind::Changed, &parsed.path.path_changed),
            (PathConditionKind::Modified, &parsed.path.path_modified),
            (
                PathConditionKind::DirectoryNotEmpty,
                &parsed.path.directory_not_empty,
            ),
        ];
        for (kind, patterns) in kinds {
            for pattern in patterns {
                conditions.push(PathCondition::new(kind, pattern.clone())?);
            }
        }

        let directory_mode = match &parsed.path.directory_mode {
            Some(value) => parse_directory_mode(value)?,
            None => DEFAULT_DIRECTORY_MODE,
        };

        PathUnit::new(
            parsed.name,
            PathConfig {
                conditions,
                unit: parsed.path.unit,
                make_directory: parsed.path.make_directory,
                directory_mode,
            },
        )
    }
}

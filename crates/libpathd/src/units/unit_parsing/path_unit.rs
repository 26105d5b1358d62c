use log::trace;

use super::{ParsedFile, ParsedSection, ParsingErrorReason};
use std::path::Path;

/// Raw string values of a `[Path]` section, before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedPathSection {
    pub path_exists: Vec<String>,
    pub path_exists_glob: Vec<String>,
    pub path_changed: Vec<String>,
    pub path_modified: Vec<String>,
    pub directory_not_empty: Vec<String>,
    pub unit: Option<String>,
    pub make_directory: bool,
    pub directory_mode: Option<String>,
}

/// A `.path` unit file as read from disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPathConfig {
    /// File name, e.g. `backup.path`.
    pub name: String,
    pub description: String,
    pub path: ParsedPathSection,
}

/// Extract the path-unit configuration from a parsed unit file.
pub fn parse_path(
    parsed_file: ParsedFile,
    path: &Path,
) -> Result<ParsedPathConfig, ParsingErrorReason> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !name.ends_with(".path") || name == ".path" {
        return Err(ParsingErrorReason::NotAPathFile(name));
    }

    let mut description = String::new();
    let mut path_section = ParsedPathSection::default();

    for (section_name, section) in parsed_file {
        match section_name.as_str() {
            "[Unit]" => {
                description = parse_unit_section(&section);
            }
            "[Install]" => {
                trace!("Ignoring [Install] section in path unit {path:?}");
            }
            "[Path]" => {
                parse_path_section(&section, &mut path_section);
            }
            _ if section_name.starts_with("[X-") || section_name.starts_with("[x-") => {
                trace!(
                    "Silently ignoring vendor extension section in path unit {path:?}: {section_name}"
                );
            }
            _ => {
                trace!("Ignoring unknown section in path unit {path:?}: {section_name}");
            }
        }
    }

    Ok(ParsedPathConfig {
        name,
        description,
        path: path_section,
    })
}

fn parse_unit_section(section: &ParsedSection) -> String {
    // Only Description= matters to a trigger; dependency directives belong
    // to the manager that owns the unit graph.
    section
        .get("Description")
        .and_then(|values| values.iter().max_by_key(|(line, _)| *line))
        .map(|(_, value)| value.clone())
        .unwrap_or_default()
}

fn parse_path_section(section: &ParsedSection, path: &mut ParsedPathSection) {
    // Collect all key-value pairs sorted by line number so that
    // later assignments override earlier ones (matching systemd semantics).
    let mut entries: Vec<(u32, &str, &str)> = Vec::new();
    for (key, values) in section {
        for (line, value) in values {
            entries.push((*line, key.as_str(), value.as_str()));
        }
    }
    entries.sort_by_key(|(line, _, _)| *line);

    for (_line, key, value) in entries {
        match key {
            "PathExists" => {
                if value.is_empty() {
                    path.path_exists.clear();
                } else {
                    path.path_exists.push(value.to_owned());
                }
            }
            "PathExistsGlob" => {
                if value.is_empty() {
                    path.path_exists_glob.clear();
                } else {
                    path.path_exists_glob.push(value.to_owned());
                }
            }
            "PathChanged" => {
                if value.is_empty() {
                    path.path_changed.clear();
                } else {
                    path.path_changed.push(value.to_owned());
                }
            }
            "PathModified" => {
                if value.is_empty() {
                    path.path_modified.clear();
                } else {
                    path.path_modified.push(value.to_owned());
                }
            }
            "DirectoryNotEmpty" => {
                if value.is_empty() {
                    path.directory_not_empty.clear();
                } else {
                    path.directory_not_empty.push(value.to_owned());
                }
            }
            "Unit" => {
                path.unit = if value.is_empty() {
                    None
                } else {
                    Some(value.to_owned())
                };
            }
            "MakeDirectory" => {
                path.make_directory = parse_bool(value);
            }
            "DirectoryMode" => {
                path.directory_mode = if value.is_empty() {
                    None
                } else {
                    Some(value.to_owned())
                };
            }
            other => {
                trace!("Ignoring unknown key in [Path] section: {other}={value}");
            }
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "on" | "1")
}

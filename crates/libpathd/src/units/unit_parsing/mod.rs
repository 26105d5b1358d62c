//! INI-style unit file parsing, scoped to what `.path` units need.

mod path_unit;

pub use path_unit::{ParsedPathConfig, ParsedPathSection, parse_path};

use std::collections::HashMap;

/// Key → occurrences of that key as `(line number, value)`.  Line numbers
/// keep the original assignment order so later lines can override earlier
/// ones during conversion.
pub type ParsedSection = HashMap<String, Vec<(u32, String)>>;

/// Sections in file order, with the bracketed header as the name.
pub type ParsedFile = Vec<(String, ParsedSection)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsingErrorReason {
    /// A section header line that does not close its bracket.
    MalformedSectionHeader(String),
    /// A non-comment line without a `=` assignment.
    MissingAssignment(String),
    /// An assignment before any section header.
    EntryOutsideSection(String),
    /// The file name carries no `.path` suffix.
    NotAPathFile(String),
}

impl std::fmt::Display for ParsingErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsingErrorReason::MalformedSectionHeader(line) => {
                write!(f, "Malformed section header: {line}")
            }
            ParsingErrorReason::MissingAssignment(line) => {
                write!(f, "Line is not a key=value assignment: {line}")
            }
            ParsingErrorReason::EntryOutsideSection(line) => {
                write!(f, "Assignment outside of any section: {line}")
            }
            ParsingErrorReason::NotAPathFile(name) => {
                write!(f, "File {name} does not name a .path unit")
            }
        }
    }
}

/// Split a unit file into sections and per-key assignment lists.
///
/// Comment lines start with `#` or `;`.  Repeated sections of the same
/// name are merged, as systemd does.
pub fn parse_file(content: &str) -> Result<ParsedFile, ParsingErrorReason> {
    let mut sections: ParsedFile = Vec::new();
    let mut current: Option<usize> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(ParsingErrorReason::MalformedSectionHeader(line.to_owned()));
            }
            let existing = sections.iter().position(|(name, _)| name == line);
            current = Some(existing.unwrap_or_else(|| {
                sections.push((line.to_owned(), ParsedSection::new()));
                sections.len() - 1
            }));
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ParsingErrorReason::MissingAssignment(line.to_owned()));
        };
        let Some(section_idx) = current else {
            return Err(ParsingErrorReason::EntryOutsideSection(line.to_owned()));
        };
        sections[section_idx]
            .1
            .entry(key.trim().to_owned())
            .or_default()
            .push((idx as u32 + 1, value.trim().to_owned()));
    }

    Ok(sections)
}

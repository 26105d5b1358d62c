//! Unit name helpers: suffix recognition and target-name derivation.

/// Unit type suffixes recognized in unit names, with the leading dot.
pub const RECOGNIZED_SUFFIXES: &[&str] = &[
    ".service",
    ".socket",
    ".target",
    ".device",
    ".mount",
    ".automount",
    ".swap",
    ".path",
    ".timer",
    ".slice",
    ".scope",
];

/// Return the recognized type suffix of a unit name, if it has one.
///
/// ```
/// use libpathd::unit_name::unit_suffix;
/// assert_eq!(unit_suffix("foo.path"), Some(".path"));
/// assert_eq!(unit_suffix("foo.service"), Some(".service"));
/// assert_eq!(unit_suffix("foo.conf"), None);
/// assert_eq!(unit_suffix("foo"), None);
/// ```
pub fn unit_suffix(name: &str) -> Option<&'static str> {
    RECOGNIZED_SUFFIXES
        .iter()
        .find(|suffix| name.len() > suffix.len() && name.ends_with(*suffix))
        .copied()
}

/// Replace the type suffix of a unit name with another recognized suffix.
///
/// Returns `None` when the name carries no recognized suffix.
///
/// ```
/// use libpathd::unit_name::replace_suffix;
/// assert_eq!(
///     replace_suffix("foo.path", ".service"),
///     Some("foo.service".to_owned())
/// );
/// assert_eq!(replace_suffix("foo", ".service"), None);
/// ```
pub fn replace_suffix(name: &str, new_suffix: &str) -> Option<String> {
    let old_suffix = unit_suffix(name)?;
    let stem = &name[..name.len() - old_suffix.len()];
    Some(format!("{stem}{new_suffix}"))
}

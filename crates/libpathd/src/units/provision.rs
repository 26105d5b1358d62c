//! Watched-directory provisioning for `MakeDirectory=`.

use log::trace;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Create `path` as a directory, applying `mode` to the leaf.
///
/// Parents are created with the default mode.  The mode is applied with
/// `set_permissions` after creation so the process umask cannot strip
/// bits from it.  An existing directory is left alone, mode included.
pub fn ensure_directory(path: &Path, mode: u32) -> io::Result<()> {
    if path.is_dir() {
        trace!("Directory {} already exists", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::create_dir(path) {
        Ok(()) => {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
            trace!("Created directory {} with mode {:04o}", path.display(), mode);
            Ok(())
        }
        // Lost a race against someone else creating it.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

#![allow(clippy::result_large_err)]

//! `libpathd` is the core library for pathd-rs, a path-based activation
//! monitor in the style of systemd `.path` units.
//!
//! It contains:
//! - `.path` unit file parsing (INI-style `[Path]` sections)
//! - Filesystem condition evaluation (exists/glob/changed/modified/non-empty)
//! - The per-trigger state machine (dead/waiting/running/failed)
//! - Watched-directory provisioning (MakeDirectory=/DirectoryMode=)
//! - The polling scheduler thread that drives evaluation passes
//! - The `UnitManager` interface through which target units are started

pub mod config;
pub mod logging;
pub mod manager;
pub mod path_scheduler;
pub mod unit_name;
pub mod units;

#[cfg(test)]
mod tests;

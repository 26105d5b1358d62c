//! The interface to the unit manager that owns the target units.
//!
//! Path triggers do not run services themselves.  When a condition fires
//! they resolve the target unit by name and ask the manager to start it;
//! while the target runs they watch its state through the same interface.
//! The manager is free to rearrange its unit table between passes, which
//! is why a [`UnitHandle`] is never cached across wake-ups.

use log::warn;
use std::sync::Mutex;

/// Opaque reference to a unit inside the manager's table.
///
/// Only valid for the duration of one evaluation pass; look units up by
/// name again on the next pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnitHandle(pub usize);

/// Lifecycle state of a managed unit, as far as triggers care about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitActiveState {
    Dead,
    Activating,
    Running,
    Deactivating,
    Failed,
}

impl UnitActiveState {
    /// Starting a unit in one of these states would be redundant.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Activating | Self::Running)
    }

    /// The unit has terminated and will not change state on its own.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Dead | Self::Failed)
    }
}

/// Outcome of the last completed run of a managed unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitStateResult {
    Success,
    Failure,
}

/// Error reported by the manager for a refused start/stop request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerError {
    pub unit_name: String,
    pub message: String,
}

impl std::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Manager refused request for unit {}: {}",
            self.unit_name, self.message
        )
    }
}

/// Operations path triggers need from the manager that owns target units.
pub trait UnitManager {
    /// Look a unit up by full name (e.g. `backup.service`).
    fn lookup_unit(&self, name: &str) -> Option<UnitHandle>;
    /// Request that the unit be started.
    fn request_start(&self, unit: UnitHandle) -> Result<(), ManagerError>;
    /// Request that the unit be stopped.
    fn request_stop(&self, unit: UnitHandle) -> Result<(), ManagerError>;
    /// Current lifecycle state of the unit.
    fn unit_state(&self, unit: UnitHandle) -> UnitActiveState;
    /// Result of the unit's last completed run.
    fn unit_result(&self, unit: UnitHandle) -> UnitStateResult;
}

#[derive(Debug)]
struct ManagedUnit {
    name: String,
    state: UnitActiveState,
    result: UnitStateResult,
    start_requests: u64,
    stop_requests: u64,
    refuse_starts: u32,
}

/// Table-backed [`UnitManager`] used by the scenario tests and by the
/// `pathd` binary's dry-run mode.  Start requests mark the unit `Running`
/// immediately; callers simulate unit exits with [`set_unit_state`].
///
/// [`set_unit_state`]: InMemoryManager::set_unit_state
#[derive(Debug, Default)]
pub struct InMemoryManager {
    units: Mutex<Vec<ManagedUnit>>,
}

impl InMemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit, initially `Dead`.  Re-registering an existing name
    /// returns the existing handle.
    pub fn add_unit(&self, name: &str) -> UnitHandle {
        let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(idx) = units.iter().position(|u| u.name == name) {
            return UnitHandle(idx);
        }
        units.push(ManagedUnit {
            name: name.to_owned(),
            state: UnitActiveState::Dead,
            result: UnitStateResult::Success,
            start_requests: 0,
            stop_requests: 0,
            refuse_starts: 0,
        });
        UnitHandle(units.len() - 1)
    }

    /// Overwrite a unit's state, e.g. to simulate the unit exiting.
    pub fn set_unit_state(&self, name: &str, state: UnitActiveState, result: UnitStateResult) {
        let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(unit) = units.iter_mut().find(|u| u.name == name) {
            unit.state = state;
            unit.result = result;
        } else {
            warn!("Cannot set state of unknown unit {name}");
        }
    }

    /// Make the next `count` start requests for the unit fail.
    pub fn refuse_next_starts(&self, name: &str, count: u32) {
        let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(unit) = units.iter_mut().find(|u| u.name == name) {
            unit.refuse_starts = count;
        }
    }

    /// How many start requests the unit has accepted so far.
    pub fn start_requests(&self, name: &str) -> u64 {
        let units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        units
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.start_requests)
            .unwrap_or(0)
    }

    /// How many stop requests the unit has accepted so far.
    pub fn stop_requests(&self, name: &str) -> u64 {
        let units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        units
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.stop_requests)
            .unwrap_or(0)
    }
}

impl UnitManager for InMemoryManager {
    fn lookup_unit(&self, name: &str) -> Option<UnitHandle> {
        let units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        units.iter().position(|u| u.name == name).map(UnitHandle)
    }

    fn request_start(&self, unit: UnitHandle) -> Result<(), ManagerError> {
        let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        let Some(unit) = units.get_mut(unit.0) else {
            return Err(ManagerError {
                unit_name: format!("<handle {}>", unit.0),
                message: "unknown unit handle".to_owned(),
            });
        };
        if unit.refuse_starts > 0 {
            unit.refuse_starts -= 1;
            return Err(ManagerError {
                unit_name: unit.name.clone(),
                message: "start refused".to_owned(),
            });
        }
        unit.start_requests += 1;
        unit.state = UnitActiveState::Running;
        unit.result = UnitStateResult::Success;
        Ok(())
    }

    fn request_stop(&self, unit: UnitHandle) -> Result<(), ManagerError> {
        let mut units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        let Some(unit) = units.get_mut(unit.0) else {
            return Err(ManagerError {
                unit_name: format!("<handle {}>", unit.0),
                message: "unknown unit handle".to_owned(),
            });
        };
        unit.stop_requests += 1;
        unit.state = UnitActiveState::Dead;
        Ok(())
    }

    fn unit_state(&self, unit: UnitHandle) -> UnitActiveState {
        let units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        match units.get(unit.0) {
            Some(unit) => unit.state,
            None => {
                warn!("State queried for unknown unit handle {}", unit.0);
                UnitActiveState::Dead
            }
        }
    }

    fn unit_result(&self, unit: UnitHandle) -> UnitStateResult {
        let units = self.units.lock().unwrap_or_else(|e| e.into_inner());
        match units.get(unit.0) {
            Some(unit) => unit.result,
            None => UnitStateResult::Success,
        }
    }
}

//! Target activation for path triggers.

use log::{debug, info};

use crate::manager::{ManagerError, UnitManager};

/// Failure to start a trigger's target unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActivationError {
    /// The manager knows no unit by the target's name.
    NotFound(String),
    /// The manager refused the start request.
    StartFailed(ManagerError),
}

impl std::fmt::Display for ActivationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationError::NotFound(name) => {
                write!(f, "Target unit {name} was not found")
            }
            ActivationError::StartFailed(err) => {
                write!(f, "Target unit could not be started: {err}")
            }
        }
    }
}

/// Start the trigger's target unit by name.
///
/// The target is looked up fresh on every fire; handles are never carried
/// across passes.  Firing while the target is already activating or
/// running is a no-op, which is what makes multiple conditions matching
/// in the same pass harmless.
pub fn fire_target<M: UnitManager + ?Sized>(
    mgr: &M,
    trigger_name: &str,
    target_name: &str,
) -> Result<(), ActivationError> {
    let Some(handle) = mgr.lookup_unit(target_name) else {
        return Err(ActivationError::NotFound(target_name.to_owned()));
    };

    let state = mgr.unit_state(handle);
    if state.is_active() {
        debug!("{trigger_name}: target {target_name} is already {state:?}, not starting it again");
        return Ok(());
    }

    info!("{trigger_name}: starting target {target_name}");
    mgr.request_start(handle).map_err(ActivationError::StartFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{InMemoryManager, UnitActiveState, UnitStateResult};

    #[test]
    fn test_fire_starts_dead_target() {
        let mgr = InMemoryManager::new();
        mgr.add_unit("job.service");
        fire_target(&mgr, "job.path", "job.service").unwrap();
        assert_eq!(mgr.start_requests("job.service"), 1);
    }

    #[test]
    fn test_fire_is_idempotent_while_target_runs() {
        let mgr = InMemoryManager::new();
        mgr.add_unit("job.service");
        fire_target(&mgr, "job.path", "job.service").unwrap();
        fire_target(&mgr, "job.path", "job.service").unwrap();
        fire_target(&mgr, "job.path", "job.service").unwrap();
        assert_eq!(mgr.start_requests("job.service"), 1);
    }

    #[test]
    fn test_fire_restarts_failed_target() {
        let mgr = InMemoryManager::new();
        mgr.add_unit("job.service");
        mgr.set_unit_state(
            "job.service",
            UnitActiveState::Failed,
            UnitStateResult::Failure,
        );
        fire_target(&mgr, "job.path", "job.service").unwrap();
        assert_eq!(mgr.start_requests("job.service"), 1);
    }

    #[test]
    fn test_fire_unknown_target() {
        let mgr = InMemoryManager::new();
        assert_eq!(
            fire_target(&mgr, "job.path", "job.service"),
            Err(ActivationError::NotFound("job.service".to_owned()))
        );
    }
}

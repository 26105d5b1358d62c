//! End-to-end trigger scenarios: a path unit driving a target unit
//! through an `InMemoryManager`, with real files under a temp directory.

use crate::manager::{InMemoryManager, UnitActiveState, UnitStateResult};
use crate::units::{
    MAX_ACTIVATION_RETRIES, PathCondition, PathConditionKind, PathConfig, PathResult, PathState,
    PathUnit,
};
use std::path::Path;
use std::time::Duration;

fn single_condition_unit(name: &str, kind: PathConditionKind, pattern: &Path) -> PathUnit {
    let conf = PathConfig {
        conditions: vec![
            PathCondition::new(kind, pattern.to_string_lossy().into_owned()).unwrap(),
        ],
        ..Default::default()
    };
    PathUnit::new(name, conf).unwrap()
}

fn manager_for(unit: &PathUnit) -> InMemoryManager {
    let mgr = InMemoryManager::new();
    mgr.add_unit(unit.target_name());
    mgr
}

fn simulate_target_exit(mgr: &InMemoryManager, target: &str) {
    mgr.set_unit_state(target, UnitActiveState::Dead, UnitStateResult::Success);
}

#[test]
fn test_path_exists_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("flag");

    let mut unit = single_condition_unit("flag.path", PathConditionKind::Exists, &watched);
    let mgr = manager_for(&unit);
    assert_eq!(unit.target_name(), "flag.service");

    unit.start().unwrap();
    assert_eq!(unit.state(), PathState::Waiting);

    // Nothing exists yet; several passes stay in Waiting.
    for _ in 0..3 {
        unit.evaluate_pass(&mgr).unwrap();
        assert_eq!(unit.state(), PathState::Waiting);
    }
    assert_eq!(mgr.start_requests("flag.service"), 0);

    std::fs::write(&watched, b"x").unwrap();
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("flag.service"), 1);

    // While the target runs, more passes do not re-dispatch.
    for _ in 0..3 {
        unit.evaluate_pass(&mgr).unwrap();
    }
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("flag.service"), 1);

    // Target exits while the file still exists: restarted without the
    // trigger ever leaving Running.
    simulate_target_exit(&mgr, "flag.service");
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("flag.service"), 2);

    // File removed and target exited: back to Waiting.
    std::fs::remove_file(&watched).unwrap();
    simulate_target_exit(&mgr, "flag.service");
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Waiting);
    assert_eq!(mgr.start_requests("flag.service"), 2);

    unit.stop(&mgr);
    assert_eq!(unit.state(), PathState::Dead);
}

#[test]
fn test_path_modified_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("state");
    std::fs::write(&watched, b"initial").unwrap();

    let mut unit = single_condition_unit("state.path", PathConditionKind::Modified, &watched);
    let mgr = manager_for(&unit);

    unit.start().unwrap();
    assert_eq!(unit.state(), PathState::Waiting);

    // The file existed before start and has not changed since: no fire.
    for _ in 0..3 {
        unit.evaluate_pass(&mgr).unwrap();
        assert_eq!(unit.state(), PathState::Waiting);
    }
    assert_eq!(mgr.start_requests("state.service"), 0);

    // Let the filesystem clock move, then write.
    std::thread::sleep(Duration::from_millis(25));
    std::fs::write(&watched, b"updated").unwrap();
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("state.service"), 1);

    // Target exits, file unchanged since the fire: no restart, back to
    // Waiting with a fresh baseline.
    simulate_target_exit(&mgr, "state.service");
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Waiting);
    for _ in 0..3 {
        unit.evaluate_pass(&mgr).unwrap();
        assert_eq!(unit.state(), PathState::Waiting);
    }
    assert_eq!(mgr.start_requests("state.service"), 1);

    // A fresh write fires again.
    std::thread::sleep(Duration::from_millis(25));
    std::fs::write(&watched, b"updated again").unwrap();
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("state.service"), 2);
}

#[test]
fn test_path_changed_does_not_refire_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("conf");
    std::fs::write(&watched, b"v1").unwrap();

    let mut unit = single_condition_unit("conf.path", PathConditionKind::Changed, &watched);
    let mgr = manager_for(&unit);
    unit.start().unwrap();

    std::fs::write(&watched, b"v2 is longer").unwrap();
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("conf.service"), 1);

    simulate_target_exit(&mgr, "conf.service");
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Waiting);

    // The file still exists but is unchanged; no amount of passes fires.
    for _ in 0..5 {
        unit.evaluate_pass(&mgr).unwrap();
        assert_eq!(unit.state(), PathState::Waiting);
    }
    assert_eq!(mgr.start_requests("conf.service"), 1);
}

#[test]
fn test_path_exists_glob_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = dir.path().join("*.req");

    let mut unit = single_condition_unit("req.path", PathConditionKind::ExistsGlob, &pattern);
    let mgr = manager_for(&unit);
    unit.start().unwrap();

    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Waiting);

    std::fs::write(dir.path().join("job-1.req"), b"x").unwrap();
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("req.service"), 1);

    // Level semantics: target exits while a match remains → restarted.
    simulate_target_exit(&mgr, "req.service");
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("req.service"), 2);
}

#[test]
fn test_directory_not_empty_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let spool = dir.path().join("spool");
    std::fs::create_dir(&spool).unwrap();

    let mut unit =
        single_condition_unit("spool.path", PathConditionKind::DirectoryNotEmpty, &spool);
    let mgr = manager_for(&unit);
    unit.start().unwrap();

    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Waiting);

    std::fs::write(spool.join("job"), b"x").unwrap();
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("spool.service"), 1);

    // Emptying the directory while the target exits re-arms the trigger.
    std::fs::remove_file(spool.join("job")).unwrap();
    simulate_target_exit(&mgr, "spool.service");
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Waiting);
}

#[test]
fn test_make_directory_applies_exact_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("made");

    let conf = PathConfig {
        conditions: vec![
            PathCondition::new(
                PathConditionKind::DirectoryNotEmpty,
                watched.to_string_lossy().into_owned(),
            )
            .unwrap(),
        ],
        make_directory: true,
        directory_mode: 0o744,
        ..Default::default()
    };
    let mut unit = PathUnit::new("made.path", conf).unwrap();
    unit.start().unwrap();

    assert!(watched.is_dir());
    let mode = std::fs::metadata(&watched).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode, 0o744);
}

#[test]
fn test_make_directory_defaults_to_off() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("not-made");

    let mut unit =
        single_condition_unit("not-made.path", PathConditionKind::DirectoryNotEmpty, &watched);
    assert!(!unit.conf.make_directory);
    unit.start().unwrap();
    assert!(!watched.exists());
}

#[test]
fn test_make_directory_skips_exists_conditions() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("flag");

    let conf = PathConfig {
        conditions: vec![
            PathCondition::new(
                PathConditionKind::Exists,
                watched.to_string_lossy().into_owned(),
            )
            .unwrap(),
        ],
        make_directory: true,
        ..Default::default()
    };
    let mut unit = PathUnit::new("flag.path", conf).unwrap();
    unit.start().unwrap();
    // PathExists= watches are not provisioned; the path would otherwise
    // be satisfied immediately by its own directory.
    assert!(!watched.exists());
}

#[test]
fn test_provision_failure_fails_the_unit() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();

    let conf = PathConfig {
        conditions: vec![
            PathCondition::new(
                PathConditionKind::DirectoryNotEmpty,
                blocker.join("inside").to_string_lossy().into_owned(),
            )
            .unwrap(),
        ],
        make_directory: true,
        ..Default::default()
    };
    let mut unit = PathUnit::new("blocked.path", conf).unwrap();
    assert!(unit.start().is_err());
    assert_eq!(unit.state(), PathState::Failed);
    assert_eq!(unit.result(), PathResult::ResourceExhaustion);
}

#[test]
fn test_activation_retry_exhaustion() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("flag");
    std::fs::write(&watched, b"x").unwrap();

    let mut unit = single_condition_unit("flag.path", PathConditionKind::Exists, &watched);
    let mgr = manager_for(&unit);
    mgr.refuse_next_starts("flag.service", MAX_ACTIVATION_RETRIES);

    unit.start().unwrap();
    for attempt in 1..MAX_ACTIVATION_RETRIES {
        unit.evaluate_pass(&mgr).unwrap();
        assert_eq!(unit.state(), PathState::Waiting, "attempt {attempt}");
    }
    // The final refused attempt exhausts the budget.
    assert!(unit.evaluate_pass(&mgr).is_err());
    assert_eq!(unit.state(), PathState::Failed);
    assert_eq!(unit.result(), PathResult::Failure);
    assert_eq!(mgr.start_requests("flag.service"), 0);

    // The unit can be started again after a failure.
    unit.start().unwrap();
    assert_eq!(unit.state(), PathState::Waiting);
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("flag.service"), 1);
}

#[test]
fn test_retry_succeeding_before_budget_resets_counter() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("flag");
    std::fs::write(&watched, b"x").unwrap();

    let mut unit = single_condition_unit("flag.path", PathConditionKind::Exists, &watched);
    let mgr = manager_for(&unit);
    mgr.refuse_next_starts("flag.service", MAX_ACTIVATION_RETRIES - 1);

    unit.start().unwrap();
    for _ in 0..MAX_ACTIVATION_RETRIES - 1 {
        unit.evaluate_pass(&mgr).unwrap();
        assert_eq!(unit.state(), PathState::Waiting);
    }
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("flag.service"), 1);
}

#[test]
fn test_edge_fire_is_retried_until_start_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("state");
    std::fs::write(&watched, b"v1").unwrap();

    let mut unit = single_condition_unit("state.path", PathConditionKind::Changed, &watched);
    let mgr = manager_for(&unit);
    mgr.refuse_next_starts("state.service", 2);

    unit.start().unwrap();
    std::fs::write(&watched, b"v2 is longer").unwrap();

    // The edge is seen once but stays pending across the refused starts.
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Waiting);
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Waiting);
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    assert_eq!(mgr.start_requests("state.service"), 1);
}

#[test]
fn test_stop_running_trigger_stops_target() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("flag");
    std::fs::write(&watched, b"x").unwrap();

    let mut unit = single_condition_unit("flag.path", PathConditionKind::Exists, &watched);
    let mgr = manager_for(&unit);
    unit.start().unwrap();
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);

    unit.stop(&mgr);
    assert_eq!(unit.state(), PathState::Dead);
    assert_eq!(mgr.stop_requests("flag.service"), 1);

    // Stopping again is a no-op.
    unit.stop(&mgr);
    assert_eq!(mgr.stop_requests("flag.service"), 1);
}

#[test]
fn test_stop_waiting_trigger() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("flag");

    let mut unit = single_condition_unit("flag.path", PathConditionKind::Exists, &watched);
    let mgr = manager_for(&unit);
    unit.start().unwrap();

    unit.stop(&mgr);
    assert_eq!(unit.state(), PathState::Dead);
    assert_eq!(mgr.stop_requests("flag.service"), 0);

    // A stopped trigger ignores its conditions.
    std::fs::write(&watched, b"x").unwrap();
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Dead);
    assert_eq!(mgr.start_requests("flag.service"), 0);
}

#[test]
fn test_missing_target_eventually_fails_the_trigger() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("flag");
    std::fs::write(&watched, b"x").unwrap();

    let mut unit = single_condition_unit("flag.path", PathConditionKind::Exists, &watched);
    // Manager without the target registered.
    let mgr = InMemoryManager::new();

    unit.start().unwrap();
    for _ in 0..MAX_ACTIVATION_RETRIES - 1 {
        unit.evaluate_pass(&mgr).unwrap();
        assert_eq!(unit.state(), PathState::Waiting);
    }
    assert!(unit.evaluate_pass(&mgr).is_err());
    assert_eq!(unit.state(), PathState::Failed);
    assert_eq!(unit.result(), PathResult::Failure);
}

#[test]
fn test_evaluation_error_fails_closed() {
    // A path that cannot be inspected at all must fail the trigger
    // instead of counting as "not satisfied".
    let unreadable = Path::new("/tmp").join("y".repeat(5000));

    let mut unit = single_condition_unit("deep.path", PathConditionKind::Exists, &unreadable);
    let mgr = manager_for(&unit);
    unit.start().unwrap();

    assert!(unit.evaluate_pass(&mgr).is_err());
    assert_eq!(unit.state(), PathState::Failed);
    assert_eq!(unit.result(), PathResult::ResourceExhaustion);
    assert_eq!(mgr.start_requests("deep.service"), 0);

    // Failed triggers sit still until restarted.
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Failed);
}

#[test]
fn test_multiple_conditions_fire_once_per_pass() {
    let dir = tempfile::tempdir().unwrap();
    let flag_a = dir.path().join("a");
    let flag_b = dir.path().join("b");
    std::fs::write(&flag_a, b"x").unwrap();
    std::fs::write(&flag_b, b"x").unwrap();

    let conf = PathConfig {
        conditions: vec![
            PathCondition::new(
                PathConditionKind::Exists,
                flag_a.to_string_lossy().into_owned(),
            )
            .unwrap(),
            PathCondition::new(
                PathConditionKind::Exists,
                flag_b.to_string_lossy().into_owned(),
            )
            .unwrap(),
        ],
        ..Default::default()
    };
    let mut unit = PathUnit::new("both.path", conf).unwrap();
    let mgr = manager_for(&unit);

    unit.start().unwrap();
    unit.evaluate_pass(&mgr).unwrap();
    assert_eq!(unit.state(), PathState::Running);
    // Both conditions matched in the same pass; the target started once.
    assert_eq!(mgr.start_requests("both.service"), 1);
}

use foxy_brain::*;
use std::path::Path;

fn config_at(path: &Path, seed: u64) -> CompanionConfig {
    CompanionConfig {
        brain_path: path.to_path_buf(),
        seed: Some(seed),
        ..CompanionConfig::default()
    }
}

/// Tick `ticks` times, clicking whenever `favourite` starts playing.
fn drive(companion: &mut Companion, ticks: u32, favourite: Action) {
    for _ in 0..ticks {
        if companion.tick() == Some(Phase::Performing(favourite)) {
            assert_eq!(companion.on_click(), ClickOutcome::Recorded(favourite));
        }
    }
}

#[test]
fn companion_learns_favourite_and_persists_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("brain.json");

    let mut companion = Companion::open(config_at(&path, 2024)).unwrap();
    assert_eq!(companion.current_phase(), Phase::Idle);
    assert_eq!(companion.brain_state(), BrainState::fresh());

    drive(&mut companion, 24 * 60 * 30, Action::Walk);
    companion.shutdown().unwrap();

    let learned = companion.brain_state();
    let walk = learned.weights[Action::Walk];
    for action in [Action::Excited, Action::Relax, Action::Sleep] {
        assert!(
            walk > learned.weights[action],
            "walk {} should beat {} {}",
            walk,
            action,
            learned.weights[action]
        );
    }
    assert!(learned.stats[Action::Walk].positive_feedback > 0);

    let on_disk = JsonFileStore::new(&path).load().unwrap().unwrap();
    assert_eq!(on_disk, learned);
    drop(companion);

    let reopened = Companion::open(config_at(&path, 7)).unwrap();
    assert_eq!(reopened.brain_state(), learned);
}

#[test]
fn corrupt_brain_missing_walk_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("brain.json");
    std::fs::write(
        &path,
        r#"{
            "weights": {"excited": 3.0, "relax": 1.0, "sleep": 1.0},
            "action_counts": {"excited": 9, "relax": 0, "sleep": 0},
            "positive_feedback": {"excited": 9, "relax": 0, "sleep": 0}
        }"#,
    )
    .unwrap();

    let companion = Companion::open(config_at(&path, 1)).unwrap();
    assert_eq!(companion.brain_state(), BrainState::fresh());
}

#[test]
fn unwritable_brain_does_not_stop_the_companion() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be makes every write fail.
    let path = dir.path().join("brain.json");
    std::fs::create_dir(&path).unwrap();

    let mut companion = Companion::open(config_at(&path, 3)).unwrap();
    drive(&mut companion, 24 * 60 * 5, Action::Sleep);
    companion.shutdown().unwrap();

    let state = companion.brain_state();
    let chosen: u64 = state.stats.iter().map(|(_, s)| s.times_chosen).sum();
    assert!(chosen > 0);
    assert!(path.is_dir());
}

#[test]
fn shutdown_retries_the_final_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("brain.json");
    std::fs::create_dir(&path).unwrap();

    let mut companion = Companion::open(config_at(&path, 5)).unwrap();
    drive(&mut companion, 24 * 60 * 5, Action::Excited);

    // Every write so far failed; the disk recovers before exit.
    std::fs::remove_dir(&path).unwrap();
    companion.shutdown().unwrap();

    let on_disk = JsonFileStore::new(&path).load().unwrap().unwrap();
    assert_eq!(on_disk, companion.brain_state());
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = CompanionConfig {
        min_idle_secs: 20.0,
        ..config_at(&dir.path().join("brain.json"), 1)
    };

    assert!(Companion::open(config).is_err());
}

#[test]
fn seeded_machines_are_deterministic() {
    let phases = |seed: u64| -> Vec<Phase> {
        let mut machine = ActionStateMachine::new(
            ActionSelector::default(),
            TimingConfig::default(),
            fastrand::Rng::with_seed(seed),
        );
        (0..24 * 60 * 5).filter_map(|_| machine.tick()).collect()
    };

    assert_eq!(phases(77), phases(77));
}

#[test]
fn feedback_scenario_probabilities() {
    let mut selector = ActionSelector::default();
    for _ in 0..3 {
        selector.give_feedback(Action::Excited, true);
    }
    for _ in 0..2 {
        selector.give_feedback(Action::Relax, false);
    }

    let rows = selector.stats();
    let pct: Vec<f64> = rows
        .iter()
        .map(|r| (r.probability * 1000.0).round() / 10.0)
        .collect();
    assert_eq!(pct, vec![33.3, 20.7, 23.0, 23.0]);
}

//! Action State Machine
//!
//! Cycles Idle -> Performing(action) -> Idle forever. Decisions are made when
//! an idle rest runs out; feedback windows are open while an action plays.
//!
//! Each `tick()` counts down one unit. A phase whose count has reached zero is
//! only left on the following tick, so clicks that arrive between those two
//! ticks still belong to the phase being shown.

use crate::action_selector::ActionSelector;
use crate::config::TimingConfig;
use crate::persistence::BrainStore;
use crate::random::RandomSource;
use crate::types::{Action, Phase};

/// The phase currently playing and how far along it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionInstance {
    phase: Phase,
    duration: u32,
    elapsed: u32,
    feedback_recorded: bool,
}

impl ActionInstance {
    fn idle(duration: u32) -> Self {
        Self {
            phase: Phase::Idle,
            duration,
            elapsed: 0,
            feedback_recorded: false,
        }
    }

    fn performing(action: Action, duration: u32) -> Self {
        Self {
            phase: Phase::Performing(action),
            duration,
            elapsed: 0,
            feedback_recorded: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn duration_ticks(&self) -> u32 {
        self.duration
    }

    /// Ticks counted since the phase began; renderers use it as a frame index.
    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.duration.saturating_sub(self.elapsed)
    }

    /// Meaningless while idle.
    pub fn feedback_recorded(&self) -> bool {
        self.feedback_recorded
    }
}

/// What a click did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Nothing is playing, so there is nothing to reward.
    IgnoredIdle,
    /// First click on this action instance; positive feedback applied.
    Recorded(Action),
    /// This instance was already rewarded.
    AlreadyRecorded(Action),
}

pub struct ActionStateMachine<R: RandomSource = fastrand::Rng> {
    selector: ActionSelector,
    timing: TimingConfig,
    rng: R,
    instance: ActionInstance,
    store: Option<Box<dyn BrainStore>>,
}

impl<R: RandomSource> ActionStateMachine<R> {
    /// Start in Idle with a freshly drawn rest.
    pub fn new(selector: ActionSelector, timing: TimingConfig, mut rng: R) -> Self {
        let instance = ActionInstance::idle(draw_idle(&timing, &mut rng));

        log::debug!("Starting idle for {} ticks", instance.duration);

        Self {
            selector,
            timing,
            rng,
            instance,
            store: None,
        }
    }

    /// Persist the brain to `store` after every feedback event.
    pub fn with_store(mut self, store: Box<dyn BrainStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn current_phase(&self) -> Phase {
        self.instance.phase
    }

    pub fn instance(&self) -> &ActionInstance {
        &self.instance
    }

    pub fn selector(&self) -> &ActionSelector {
        &self.selector
    }

    /// Advance one tick. Returns the newly entered phase when this tick
    /// completed a transition.
    pub fn tick(&mut self) -> Option<Phase> {
        if self.instance.remaining_ticks() == 0 {
            return Some(self.expire());
        }

        self.instance.elapsed += 1;
        None
    }

    /// Deliver a click on the companion.
    pub fn on_click(&mut self) -> ClickOutcome {
        let action = match self.instance.phase {
            Phase::Idle => return ClickOutcome::IgnoredIdle,
            Phase::Performing(action) => action,
        };

        if self.instance.feedback_recorded {
            return ClickOutcome::AlreadyRecorded(action);
        }

        log::info!("User clicked during '{}'!", action);
        self.instance.feedback_recorded = true;
        self.apply_feedback(action, true);
        ClickOutcome::Recorded(action)
    }

    fn expire(&mut self) -> Phase {
        match self.instance.phase {
            Phase::Idle => {
                let action = self.selector.choose_action_with(&mut self.rng);
                self.instance = ActionInstance::performing(action, self.timing.action_ticks);
                log::info!("Starting action: {}", action);
            }
            Phase::Performing(action) => {
                if !self.instance.feedback_recorded {
                    self.apply_feedback(action, false);
                }
                self.instance = ActionInstance::idle(draw_idle(&self.timing, &mut self.rng));
                log::debug!("Starting idle for {} ticks", self.instance.duration);
            }
        }

        self.instance.phase
    }

    fn apply_feedback(&mut self, action: Action, positive: bool) {
        self.selector.give_feedback(action, positive);

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.selector.serialize()) {
                log::warn!("⚠️ Could not persist brain: {}", e);
            }
        }
    }
}

fn draw_idle<R: RandomSource>(timing: &TimingConfig, rng: &mut R) -> u32 {
    let lo = timing.min_idle_ticks.min(timing.max_idle_ticks);
    let hi = timing.min_idle_ticks.max(timing.max_idle_ticks);
    rng.between(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::random::scripted::ScriptedRng;
    use crate::types::{BrainState, LEARNING_RATE_POSITIVE};
    use std::sync::{Arc, Mutex};

    const TIMING: TimingConfig = TimingConfig {
        min_idle_ticks: 2,
        max_idle_ticks: 5,
        action_ticks: 3,
    };

    #[derive(Default)]
    struct RecordingStore {
        saves: Mutex<Vec<BrainState>>,
    }

    impl BrainStore for RecordingStore {
        fn load(&self) -> Result<Option<BrainState>> {
            Ok(self.saves.lock().unwrap().last().cloned())
        }

        fn save(&self, state: &BrainState) -> Result<()> {
            self.saves.lock().unwrap().push(state.clone());
            Ok(())
        }
    }

    /// Idle for `idle` ticks, then explore into `action`.
    fn scripted(idle: u32, action: Action) -> ScriptedRng {
        let mut rng = ScriptedRng::with_units(&[0.0]);
        rng.betweens.push_back(idle);
        rng.indices.push_back(action as usize);
        rng
    }

    fn machine(idle: u32, action: Action) -> ActionStateMachine<ScriptedRng> {
        ActionStateMachine::new(ActionSelector::new(1.0), TIMING, scripted(idle, action))
    }

    fn run(machine: &mut ActionStateMachine<ScriptedRng>, ticks: u32) -> Vec<Phase> {
        (0..ticks).filter_map(|_| machine.tick()).collect()
    }

    #[test]
    fn test_starts_idle() {
        let m = machine(2, Action::Walk);
        assert_eq!(m.current_phase(), Phase::Idle);
        assert_eq!(m.instance().remaining_ticks(), 2);
    }

    #[test]
    fn test_transition_happens_on_following_tick() {
        let mut m = machine(2, Action::Walk);

        assert_eq!(m.tick(), None);
        assert_eq!(m.tick(), None);
        assert_eq!(m.instance().remaining_ticks(), 0);
        assert_eq!(m.current_phase(), Phase::Idle);

        assert_eq!(m.tick(), Some(Phase::Performing(Action::Walk)));
        assert_eq!(m.instance().remaining_ticks(), TIMING.action_ticks);
        assert!(!m.instance().feedback_recorded());
        assert_eq!(m.selector().state().stats[Action::Walk].times_chosen, 1);
    }

    #[test]
    fn test_full_cycle_returns_to_idle() {
        let mut m = machine(2, Action::Sleep);
        m.rng.betweens.push_back(4);

        let transitions = run(&mut m, 3 + 4);
        assert_eq!(
            transitions,
            vec![Phase::Performing(Action::Sleep), Phase::Idle]
        );
        assert_eq!(m.instance().duration_ticks(), 4);
    }

    #[test]
    fn test_click_while_idle_is_ignored() {
        let mut m = machine(3, Action::Excited);
        let before = m.selector().serialize();

        assert_eq!(m.on_click(), ClickOutcome::IgnoredIdle);
        assert_eq!(m.selector().serialize(), before);
    }

    #[test]
    fn test_only_first_click_counts() {
        let store = Arc::new(RecordingStore::default());
        let mut m = machine(2, Action::Excited).with_store(Box::new(store.clone()));
        run(&mut m, 3);

        assert_eq!(m.on_click(), ClickOutcome::Recorded(Action::Excited));
        for _ in 0..5 {
            assert_eq!(m.on_click(), ClickOutcome::AlreadyRecorded(Action::Excited));
        }

        let state = m.selector().state();
        assert_eq!(state.stats[Action::Excited].positive_feedback, 1);
        assert!((state.weights[Action::Excited] - 1.0 - LEARNING_RATE_POSITIVE).abs() < 1e-9);
        assert_eq!(store.saves.lock().unwrap().len(), 1);

        // Clicked instance finishes without a negative update.
        m.rng.betweens.push_back(2);
        run(&mut m, 4);
        assert_eq!(m.current_phase(), Phase::Idle);
        assert_eq!(store.saves.lock().unwrap().len(), 1);
        assert!((m.selector().weight(Action::Excited) - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_ignored_action_gets_negative_feedback() {
        let store = Arc::new(RecordingStore::default());
        let mut m = machine(2, Action::Relax).with_store(Box::new(store.clone()));
        m.rng.betweens.push_back(2);

        run(&mut m, 3 + 4);

        assert_eq!(m.current_phase(), Phase::Idle);
        assert!((m.selector().weight(Action::Relax) - 0.95).abs() < 1e-9);
        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0], m.selector().serialize());
    }

    #[test]
    fn test_click_on_last_tick_still_counts() {
        let mut m = machine(2, Action::Walk);
        run(&mut m, 3 + 3);
        assert_eq!(m.instance().remaining_ticks(), 0);
        assert_eq!(m.current_phase(), Phase::Performing(Action::Walk));

        assert_eq!(m.on_click(), ClickOutcome::Recorded(Action::Walk));
        m.rng.betweens.push_back(2);
        assert_eq!(m.tick(), Some(Phase::Idle));
        assert!((m.selector().weight(Action::Walk) - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_tracks_frames() {
        let mut m = machine(5, Action::Walk);
        run(&mut m, 3);
        assert_eq!(m.instance().elapsed_ticks(), 3);
        assert_eq!(m.instance().remaining_ticks(), 2);
    }

    #[test]
    fn test_idle_duration_within_bounds() {
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..500 {
            let ticks = draw_idle(&TIMING, &mut rng);
            assert!((TIMING.min_idle_ticks..=TIMING.max_idle_ticks).contains(&ticks));
        }
    }

    #[test]
    fn test_runs_indefinitely() {
        let timing = TimingConfig::default();
        let mut m = ActionStateMachine::new(
            ActionSelector::default(),
            timing,
            fastrand::Rng::with_seed(5),
        );

        let mut performances = 0;
        for _ in 0..24 * 60 * 10 {
            if let Some(Phase::Performing(_)) = m.tick() {
                performances += 1;
            }
        }

        assert!(performances > 20);
        let chosen: u64 = m
            .selector()
            .state()
            .stats
            .iter()
            .map(|(_, s)| s.times_chosen)
            .sum();
        assert_eq!(chosen, performances);
    }
}

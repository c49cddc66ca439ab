//! Action Selector - the "brain"
//!
//! Epsilon-greedy choice over the learned weight table, and the only place
//! that table is changed.

use crate::random::RandomSource;
use crate::types::{
    Action, ActionMap, ActionReport, BrainState, DEFAULT_EXPLORATION_RATE, LEARNING_RATE_NEGATIVE,
    LEARNING_RATE_POSITIVE, WEIGHT_FLOOR,
};

/// Which branch of epsilon-greedy produced a choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionBranch {
    Explore,
    Exploit,
}

pub struct ActionSelector {
    state: BrainState,
    exploration_rate: f64,
}

impl ActionSelector {
    /// Fresh brain with the given exploration rate (clamped into `[0, 1]`).
    pub fn new(exploration_rate: f64) -> Self {
        Self::with_state(BrainState::fresh(), exploration_rate)
    }

    pub fn with_state(state: BrainState, exploration_rate: f64) -> Self {
        Self {
            state,
            exploration_rate: clamp_rate(exploration_rate),
        }
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    /// Pick the next action and count it as chosen.
    pub fn choose_action_with<R: RandomSource>(&mut self, rng: &mut R) -> Action {
        let (action, branch) = self.decide(rng);

        match branch {
            SelectionBranch::Explore => {
                log::debug!("🔍 Exploring: chose '{}' at random", action)
            }
            SelectionBranch::Exploit => {
                log::debug!(
                    "🧠 Exploiting: chose '{}' (p={:.3})",
                    action,
                    self.probability(action)
                )
            }
        }

        self.state.stats[action].times_chosen += 1;
        action
    }

    /// Epsilon-greedy draw without side effects.
    pub fn decide<R: RandomSource>(&self, rng: &mut R) -> (Action, SelectionBranch) {
        if rng.unit() < self.exploration_rate {
            let action = Action::ALL[rng.index(Action::COUNT)];
            (action, SelectionBranch::Explore)
        } else {
            (self.sample_weighted(rng.unit()), SelectionBranch::Exploit)
        }
    }

    /// Cumulative-weight sampling for a draw in `[0, 1)`.
    ///
    /// Walks `Action::ALL` and returns the first action whose cumulative
    /// probability is `>= draw`. Rounding can leave the final sum a hair
    /// under 1.0; such draws land on the last action.
    pub fn sample_weighted(&self, draw: f64) -> Action {
        let total = self.state.total_weight();
        let mut cumulative = 0.0;

        for (action, weight) in self.state.weights.iter() {
            cumulative += weight / total;
            if cumulative >= draw {
                return action;
            }
        }

        Action::ALL[Action::COUNT - 1]
    }

    /// Apply one feedback signal.
    ///
    /// Positive adds 0.15 with no ceiling; negative removes 0.05 but never
    /// goes below 0.1.
    pub fn give_feedback(&mut self, action: Action, positive: bool) {
        let weight = &mut self.state.weights[action];

        if positive {
            *weight += LEARNING_RATE_POSITIVE;
            self.state.stats[action].positive_feedback += 1;
            log::info!("✓ Positive feedback for '{}' - new weight: {:.2}", action, weight);
        } else {
            *weight = (*weight - LEARNING_RATE_NEGATIVE).max(WEIGHT_FLOOR);
            log::info!("✗ Negative feedback for '{}' - new weight: {:.2}", action, weight);
        }
    }

    pub fn weight(&self, action: Action) -> f64 {
        self.state.weights[action]
    }

    /// Exploitation probability of `action`.
    pub fn probability(&self, action: Action) -> f64 {
        self.state.weights[action] / self.state.total_weight()
    }

    pub fn probabilities(&self) -> ActionMap<f64> {
        let total = self.state.total_weight();
        self.state.weights.map(|_, w| w / total)
    }

    pub fn stats(&self) -> Vec<ActionReport> {
        report(&self.state)
    }

    pub fn state(&self) -> &BrainState {
        &self.state
    }

    /// Snapshot of everything learned so far.
    pub fn serialize(&self) -> BrainState {
        self.state.clone()
    }

    /// Replace the learned state wholesale. Validation happens when a
    /// document is turned into a `BrainState`, so any value reaching here is
    /// already complete.
    pub fn restore(&mut self, state: BrainState) {
        self.state = state;
    }
}

impl Default for ActionSelector {
    fn default() -> Self {
        Self::new(DEFAULT_EXPLORATION_RATE)
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        DEFAULT_EXPLORATION_RATE
    } else {
        rate.clamp(0.0, 1.0)
    }
}

/// Per-action summary of a brain state.
pub fn report(state: &BrainState) -> Vec<ActionReport> {
    let total = state.total_weight();

    state
        .weights
        .iter()
        .map(|(action, weight)| {
            let stats = state.stats[action];
            let click_rate = if stats.times_chosen == 0 {
                0.0
            } else {
                stats.positive_feedback as f64 / stats.times_chosen as f64
            };

            ActionReport {
                action,
                weight: *weight,
                probability: weight / total,
                times_chosen: stats.times_chosen,
                positive_feedback: stats.positive_feedback,
                click_rate,
            }
        })
        .collect()
}

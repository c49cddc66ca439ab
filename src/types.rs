//! Foxy Brain - core data structures
//!
//! Actions, the fixed-cardinality tables keyed by them, and the persisted
//! brain state.

use crate::error::BrainError;
use serde::Serialize;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// Weight added when the user clicks during an action.
pub const LEARNING_RATE_POSITIVE: f64 = 0.15;
/// Weight removed when an action finishes without a click.
pub const LEARNING_RATE_NEGATIVE: f64 = 0.05;
/// No action weight ever drops below this.
pub const WEIGHT_FLOOR: f64 = 0.1;
/// Starting weight for every action.
pub const INITIAL_WEIGHT: f64 = 1.0;
/// Default probability of picking uniformly instead of by weight.
pub const DEFAULT_EXPLORATION_RATE: f64 = 0.3;

/// A selectable behaviour. Idle is a resting phase, not an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Excited = 0,
    Relax = 1,
    Sleep = 2,
    Walk = 3,
}

impl Action {
    /// Number of actions in the fixed set.
    pub const COUNT: usize = 4;

    /// Canonical iteration order. Cumulative sampling walks actions in this
    /// order, so ties on a bucket boundary resolve toward the earlier action.
    pub const ALL: [Action; Action::COUNT] =
        [Action::Excited, Action::Relax, Action::Sleep, Action::Walk];

    pub fn name(self) -> &'static str {
        match self {
            Action::Excited => "excited",
            Action::Relax => "relax",
            Action::Sleep => "sleep",
            Action::Walk => "walk",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = BrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.name() == s)
            .ok_or_else(|| BrainError::UnknownAction { name: s.to_string() })
    }
}

/// One value per action, always complete.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionMap<T> {
    values: [T; Action::COUNT],
}

impl<T> ActionMap<T> {
    pub fn from_fn(mut f: impl FnMut(Action) -> T) -> Self {
        Self {
            values: Action::ALL.map(&mut f),
        }
    }

    pub fn get(&self, action: Action) -> &T {
        &self.values[action.index()]
    }

    pub fn get_mut(&mut self, action: Action) -> &mut T {
        &mut self.values[action.index()]
    }

    /// Entries in `Action::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (Action, &T)> + '_ {
        Action::ALL.into_iter().zip(self.values.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Action, &T) -> U) -> ActionMap<U> {
        ActionMap::from_fn(|action| f(action, self.get(action)))
    }
}

impl<T: Clone> ActionMap<T> {
    pub fn filled(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl<T> Index<Action> for ActionMap<T> {
    type Output = T;

    fn index(&self, action: Action) -> &T {
        self.get(action)
    }
}

impl<T> IndexMut<Action> for ActionMap<T> {
    fn index_mut(&mut self, action: Action) -> &mut T {
        self.get_mut(action)
    }
}

/// Counters kept next to each weight. Both only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStats {
    pub times_chosen: u64,
    pub positive_feedback: u64,
}

/// Everything the brain has learned; the unit of persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct BrainState {
    pub weights: ActionMap<f64>,
    pub stats: ActionMap<ActionStats>,
}

impl BrainState {
    /// First-run state: every weight 1.0, every counter zero.
    pub fn fresh() -> Self {
        Self {
            weights: ActionMap::filled(INITIAL_WEIGHT),
            stats: ActionMap::filled(ActionStats::default()),
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().map(|(_, w)| *w).sum()
    }
}

impl Default for BrainState {
    fn default() -> Self {
        Self::fresh()
    }
}

/// What the companion is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Performing(Action),
}

impl Phase {
    pub fn action(self) -> Option<Action> {
        match self {
            Phase::Idle => None,
            Phase::Performing(action) => Some(action),
        }
    }

    pub fn is_idle(self) -> bool {
        matches!(self, Phase::Idle)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::Performing(action) => write!(f, "{}", action),
        }
    }
}

/// Per-action learning summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionReport {
    pub action: Action,
    pub weight: f64,
    /// Share of the exploitation distribution.
    pub probability: f64,
    pub times_chosen: u64,
    pub positive_feedback: u64,
    /// positive_feedback / times_chosen, zero when never chosen.
    pub click_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_order_is_stable() {
        let names: Vec<&str> = Action::ALL.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["excited", "relax", "sleep", "walk"]);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("walk".parse::<Action>().unwrap(), Action::Walk);
        assert!(matches!(
            "idle".parse::<Action>(),
            Err(BrainError::UnknownAction { .. })
        ));
    }

    #[test]
    fn test_action_map_indexing() {
        let mut map = ActionMap::filled(0u32);
        map[Action::Sleep] += 3;
        *map.get_mut(Action::Walk) = 7;

        assert_eq!(map[Action::Sleep], 3);
        assert_eq!(*map.get(Action::Walk), 7);
        assert_eq!(map.iter().map(|(_, v)| *v).sum::<u32>(), 10);
    }

    #[test]
    fn test_fresh_state() {
        let state = BrainState::fresh();
        assert_eq!(state.total_weight(), 4.0);
        for (_, stats) in state.stats.iter() {
            assert_eq!(*stats, ActionStats::default());
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Idle.to_string(), "idle");
        assert_eq!(Phase::Performing(Action::Relax).to_string(), "relax");
        assert_eq!(Phase::Performing(Action::Relax).action(), Some(Action::Relax));
        assert!(Phase::Idle.is_idle());
    }
}

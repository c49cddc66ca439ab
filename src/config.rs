//! Companion configuration.

use crate::error::{BrainError, Result};
use crate::types::DEFAULT_EXPLORATION_RATE;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration for the companion, loadable from TOML
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Frame rate of the tick clock
    pub fps: u32,
    /// Shortest rest between actions (seconds)
    pub min_idle_secs: f64,
    /// Longest rest between actions (seconds)
    pub max_idle_secs: f64,
    /// How long each action plays (seconds)
    pub action_secs: f64,
    /// Probability of ignoring the learned weights
    pub exploration_rate: f64,
    /// Where the brain is persisted
    pub brain_path: PathBuf,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            fps: 24,
            min_idle_secs: 2.0,
            max_idle_secs: 10.0,
            action_secs: 3.0,
            exploration_rate: DEFAULT_EXPLORATION_RATE,
            brain_path: PathBuf::from("foxy_brain.json"),
            seed: None,
        }
    }
}

impl CompanionConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BrainError::io(path, e))?;
        toml::from_str(&content).map_err(|e| BrainError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(BrainError::InvalidConfig("fps must be at least 1".into()));
        }
        for (name, secs) in [
            ("min_idle_secs", self.min_idle_secs),
            ("max_idle_secs", self.max_idle_secs),
            ("action_secs", self.action_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(BrainError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, secs
                )));
            }
        }
        if self.min_idle_secs > self.max_idle_secs {
            return Err(BrainError::InvalidConfig(format!(
                "min_idle_secs ({}) exceeds max_idle_secs ({})",
                self.min_idle_secs, self.max_idle_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.exploration_rate) {
            return Err(BrainError::InvalidConfig(format!(
                "exploration_rate must be within [0, 1], got {}",
                self.exploration_rate
            )));
        }

        let timing = self.timing();
        if timing.action_ticks == 0 {
            return Err(BrainError::InvalidConfig(
                "action_secs is shorter than one frame".into(),
            ));
        }

        Ok(())
    }

    /// Durations converted to ticks at the configured frame rate.
    pub fn timing(&self) -> TimingConfig {
        let to_ticks = |secs: f64| (secs * self.fps as f64).round() as u32;

        TimingConfig {
            min_idle_ticks: to_ticks(self.min_idle_secs),
            max_idle_ticks: to_ticks(self.max_idle_secs),
            action_ticks: to_ticks(self.action_secs),
        }
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

/// Phase durations measured in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    pub min_idle_ticks: u32,
    pub max_idle_ticks: u32,
    pub action_ticks: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        CompanionConfig::default().timing()
    }
}

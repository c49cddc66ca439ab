//! # Foxy Brain
//!
//! Behaviour engine for an on-screen companion that learns which actions its
//! user enjoys.
//!
//! ## Architecture
//!
//! - **Action Selector**: epsilon-greedy choice over per-action weights, updated
//!   from click feedback
//! - **Action State Machine**: Idle -> Performing -> Idle cycle driven by frame
//!   ticks; opens one feedback window per performance
//! - **Persistence**: JSON brain document written through a background worker
//!   after every feedback event
//!
//! Rendering, windowing and input capture live outside this crate. They call
//! [`Companion::tick`] once per frame, draw [`Companion::current_phase`], and
//! forward clicks to [`Companion::on_click`].
//!
//! ## Example
//!
//! ```no_run
//! use foxy_brain::{Companion, CompanionConfig, Phase};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut companion = Companion::open(CompanionConfig::default())?;
//!
//!     for _ in 0..24 * 60 {
//!         if let Some(Phase::Performing(action)) = companion.tick() {
//!             println!("now playing {}", action);
//!         }
//!     }
//!
//!     companion.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod action_selector;
pub mod config;
pub mod error;
pub mod persistence;
pub mod random;
pub mod state_machine;
pub mod types;

pub use action_selector::{ActionSelector, SelectionBranch};
pub use config::{CompanionConfig, TimingConfig};
pub use error::BrainError;
pub use persistence::{load_or_default, BrainStore, JsonFileStore, PersistenceWorker};
pub use random::RandomSource;
pub use state_machine::{ActionInstance, ActionStateMachine, ClickOutcome};
pub use types::*;

use anyhow::{Context, Result};
use std::sync::Arc;

/// Main companion system - wires the brain, its storage and the state machine
pub struct Companion {
    config: CompanionConfig,
    machine: ActionStateMachine,
    writer: Arc<PersistenceWorker<JsonFileStore>>,
}

impl Companion {
    /// Load (or start) the brain at `config.brain_path` and begin idling.
    pub fn open(config: CompanionConfig) -> Result<Self> {
        config.validate().context("Invalid companion configuration")?;

        let timing = config.timing();
        log::info!("═══════════════════════════════════════");
        log::info!("  Foxy Brain");
        log::info!("═══════════════════════════════════════");
        log::info!("Brain file: {}", config.brain_path.display());
        log::info!(
            "Idle: {}-{} ticks, action: {} ticks @ {} fps",
            timing.min_idle_ticks,
            timing.max_idle_ticks,
            timing.action_ticks,
            config.fps
        );
        log::info!("Exploration rate: {:.2}", config.exploration_rate);

        let store = JsonFileStore::new(&config.brain_path);
        let state = load_or_default(&store);

        let writer = Arc::new(
            PersistenceWorker::spawn(store).context("Failed to start persistence worker")?,
        );

        let selector = ActionSelector::with_state(state, config.exploration_rate);
        let machine = ActionStateMachine::new(selector, timing, random::rng_from_seed(config.seed))
            .with_store(Box::new(writer.clone()));

        Ok(Self {
            config,
            machine,
            writer,
        })
    }

    /// Advance one frame
    pub fn tick(&mut self) -> Option<Phase> {
        self.machine.tick()
    }

    /// Forward a click on the companion
    pub fn on_click(&mut self) -> ClickOutcome {
        self.machine.on_click()
    }

    pub fn current_phase(&self) -> Phase {
        self.machine.current_phase()
    }

    pub fn instance(&self) -> &ActionInstance {
        self.machine.instance()
    }

    pub fn stats(&self) -> Vec<ActionReport> {
        self.machine.selector().stats()
    }

    pub fn brain_state(&self) -> BrainState {
        self.machine.selector().serialize()
    }

    /// Write the final brain and wait for it to land on disk.
    ///
    /// The current state is queued once more so an earlier failed write is
    /// retried before exit.
    pub fn shutdown(&self) -> Result<()> {
        log::info!("Flushing brain to {}", self.config.brain_path.display());
        self.writer.save(&self.brain_state())?;
        self.writer.flush().context("Failed to flush brain")?;
        Ok(())
    }
}

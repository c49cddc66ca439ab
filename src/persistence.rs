//! Brain persistence
//!
//! The on-disk document keeps the string-keyed layout:
//!
//! ```json
//! {
//!   "weights": { "excited": 1.0, "relax": 1.0, "sleep": 1.0, "walk": 1.0 },
//!   "action_counts": { "excited": 0, "relax": 0, "sleep": 0, "walk": 0 },
//!   "positive_feedback": { "excited": 0, "relax": 0, "sleep": 0, "walk": 0 }
//! }
//! ```
//!
//! A document only becomes a `BrainState` after every table has been checked
//! for exactly the four action keys. Writes go through a background worker so
//! a slow disk never stalls the tick loop.

use crate::error::{BrainError, Result};
use crate::types::{Action, ActionMap, ActionStats, BrainState, WEIGHT_FLOOR};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Durable home of a `BrainState`.
pub trait BrainStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<BrainState>>;

    fn save(&self, state: &BrainState) -> Result<()>;
}

impl<S: BrainStore + ?Sized> BrainStore for Arc<S> {
    fn load(&self) -> Result<Option<BrainState>> {
        (**self).load()
    }

    fn save(&self, state: &BrainState) -> Result<()> {
        (**self).save(state)
    }
}

/// Serialized form of a brain, exactly as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBrain {
    pub weights: BTreeMap<String, f64>,
    pub action_counts: BTreeMap<String, u64>,
    pub positive_feedback: BTreeMap<String, u64>,
}

impl From<&BrainState> for PersistedBrain {
    fn from(state: &BrainState) -> Self {
        Self {
            weights: named(&state.weights),
            action_counts: named(&state.stats.map(|_, s| s.times_chosen)),
            positive_feedback: named(&state.stats.map(|_, s| s.positive_feedback)),
        }
    }
}

fn named<T: Copy>(table: &ActionMap<T>) -> BTreeMap<String, T> {
    table
        .iter()
        .map(|(action, value)| (action.name().to_string(), *value))
        .collect()
}

impl TryFrom<PersistedBrain> for BrainState {
    type Error = BrainError;

    fn try_from(doc: PersistedBrain) -> Result<Self> {
        let weights = complete_table("weights", &doc.weights)?;
        let counts = complete_table("action_counts", &doc.action_counts)?;
        let positive = complete_table("positive_feedback", &doc.positive_feedback)?;

        for (action, weight) in weights.iter() {
            if !weight.is_finite() || *weight < WEIGHT_FLOOR {
                return Err(BrainError::InvalidWeight {
                    action: action.name(),
                    value: *weight,
                    floor: WEIGHT_FLOOR,
                });
            }
        }

        Ok(BrainState {
            weights,
            stats: ActionMap::from_fn(|a| ActionStats {
                times_chosen: counts[a],
                positive_feedback: positive[a],
            }),
        })
    }
}

/// Turn a string-keyed table into an `ActionMap`, rejecting unknown and
/// missing actions.
fn complete_table<T: Copy>(table: &'static str, raw: &BTreeMap<String, T>) -> Result<ActionMap<T>> {
    for name in raw.keys() {
        name.parse::<Action>()?;
    }

    if let Some(missing) = Action::ALL.into_iter().find(|a| !raw.contains_key(a.name())) {
        return Err(BrainError::MissingAction {
            table,
            action: missing.name(),
        });
    }

    Ok(ActionMap::from_fn(|action| raw[action.name()]))
}

/// Parse and validate a JSON brain document.
pub fn parse_document(json: &str) -> Result<BrainState> {
    let doc: PersistedBrain = serde_json::from_str(json)?;
    BrainState::try_from(doc)
}

pub fn render_document(state: &BrainState) -> Result<String> {
    Ok(serde_json::to_string_pretty(&PersistedBrain::from(state))?)
}

/// JSON file on local disk
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "brain".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl BrainStore for JsonFileStore {
    fn load(&self) -> Result<Option<BrainState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path).map_err(|e| BrainError::io(&self.path, e))?;
        parse_document(&json).map(Some)
    }

    fn save(&self, state: &BrainState) -> Result<()> {
        let json = render_document(state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BrainError::io(parent, e))?;
        }

        // Write-then-rename so a crash mid-write leaves the old brain intact.
        let tmp = self.temp_path();
        std::fs::write(&tmp, json).map_err(|e| BrainError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| BrainError::io(&self.path, e))?;

        log::debug!("Brain saved to {}", self.path.display());
        Ok(())
    }
}

/// Load the stored brain, falling back to a fresh one on any problem.
pub fn load_or_default(store: &dyn BrainStore) -> BrainState {
    match store.load() {
        Ok(Some(state)) => {
            log::info!("Brain loaded from storage");
            state
        }
        Ok(None) => {
            log::info!("No saved brain found, starting fresh");
            BrainState::fresh()
        }
        Err(e) if e.is_corrupt_state() => {
            log::warn!("⚠️ Saved brain is corrupt ({}), starting fresh", e);
            BrainState::fresh()
        }
        Err(e) => {
            log::warn!("⚠️ Could not read saved brain ({}), starting fresh", e);
            BrainState::fresh()
        }
    }
}

enum WorkerCommand {
    Save(BrainState),
    Flush(Sender<()>),
}

/// Write counters for a `PersistenceWorker`
#[derive(Debug, Default)]
pub struct WorkerStatistics {
    pub written: AtomicU64,
    pub failed: AtomicU64,
    pub coalesced: AtomicU64,
}

/// Fire-and-forget writer running on its own thread.
///
/// `save` only enqueues a snapshot. The thread writes the newest queued
/// snapshot and drops older ones; a failed write is logged and the next
/// snapshot simply tries again.
pub struct PersistenceWorker<S: BrainStore + 'static> {
    store: Arc<S>,
    tx: Option<Sender<WorkerCommand>>,
    handle: Option<JoinHandle<()>>,
    stats: Arc<WorkerStatistics>,
}

impl<S: BrainStore + 'static> PersistenceWorker<S> {
    pub fn spawn(store: S) -> Result<Self> {
        let store = Arc::new(store);
        let stats = Arc::new(WorkerStatistics::default());
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = {
            let store = store.clone();
            let stats = stats.clone();
            std::thread::Builder::new()
                .name("foxy-persist".into())
                .spawn(move || run_worker(store, rx, stats))
                .map_err(|e| BrainError::io("<persistence thread>", e))?
        };

        Ok(Self {
            store,
            tx: Some(tx),
            handle: Some(handle),
            stats,
        })
    }

    /// Block until every snapshot queued so far has been written (or failed).
    pub fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.send(WorkerCommand::Flush(ack_tx))?;
        ack_rx.recv().map_err(|_| BrainError::WorkerStopped)
    }

    pub fn statistics(&self) -> &WorkerStatistics {
        &self.stats
    }

    fn send(&self, cmd: WorkerCommand) -> Result<()> {
        self.tx
            .as_ref()
            .ok_or(BrainError::WorkerStopped)?
            .send(cmd)
            .map_err(|_| BrainError::WorkerStopped)
    }

    /// Drain the queue and stop the thread.
    pub fn shutdown(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Persistence thread panicked");
            }
        }
    }
}

impl<S: BrainStore + 'static> BrainStore for PersistenceWorker<S> {
    fn load(&self) -> Result<Option<BrainState>> {
        self.flush()?;
        self.store.load()
    }

    fn save(&self, state: &BrainState) -> Result<()> {
        self.send(WorkerCommand::Save(state.clone()))
    }
}

impl<S: BrainStore + 'static> Drop for PersistenceWorker<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<S: BrainStore>(store: Arc<S>, rx: Receiver<WorkerCommand>, stats: Arc<WorkerStatistics>) {
    while let Ok(first) = rx.recv() {
        let mut latest = None;
        let mut acks = Vec::new();

        for cmd in std::iter::once(first).chain(rx.try_iter()) {
            match cmd {
                WorkerCommand::Save(state) => {
                    if latest.replace(state).is_some() {
                        stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    }
                }
                WorkerCommand::Flush(ack) => acks.push(ack),
            }
        }

        if let Some(state) = latest {
            match store.save(&state) {
                Ok(()) => {
                    stats.written.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!("⚠️ Failed to persist brain, will retry on next feedback: {}", e);
                }
            }
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }

    log::debug!("Persistence worker stopped");
}

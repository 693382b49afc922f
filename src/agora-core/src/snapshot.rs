//! Session snapshots and auto-save.
//!
//! The whole session is serialized as one camelCase JSON blob under a single
//! key. New fields must default so older snapshots still load.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::error::SessionError;
use crate::scenario::{CharacterSheet, NpcResponse, Scenario, VotingOption};
use crate::schedule::TriggeredEvents;
use crate::transcript::Transcript;

/// Quiet period before a change is written.
pub const DEFAULT_AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Everything needed to resume a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub scenario: Scenario,
    #[serde(default)]
    pub current_stage_index: usize,
    #[serde(default)]
    pub timer_seconds: i64,
    pub transcript: Transcript,
    #[serde(default)]
    pub npc_responses: Vec<NpcResponse>,
    #[serde(default)]
    pub voting_options: Vec<VotingOption>,
    #[serde(default)]
    pub triggered_event_ids: TriggeredEvents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<Vec<CharacterSheet>>,
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(blob: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(blob)?)
    }
}

/// Storage for the single auto-save blob.
pub trait SnapshotStore: Send + Sync {
    /// The stored blob, or `None` if nothing is saved.
    fn read(&self) -> Result<Option<String>, SessionError>;

    fn write(&self, blob: &str) -> Result<(), SessionError>;

    /// Remove the blob. Deleting a missing blob is not an error.
    fn delete(&self) -> Result<(), SessionError>;
}

/// One JSON file on disk, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read(&self) -> Result<Option<String>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn write(&self, blob: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn delete(&self) -> Result<(), SessionError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-memory store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    blob: Option<String>,
    writes: usize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.inner.lock().map(|slot| slot.writes).unwrap_or(0)
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, MemorySlot>, SessionError> {
        self.inner
            .lock()
            .map_err(|_| SessionError::ConfigError("snapshot store lock poisoned".to_string()))
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self) -> Result<Option<String>, SessionError> {
        Ok(self.slot()?.blob.clone())
    }

    fn write(&self, blob: &str) -> Result<(), SessionError> {
        let mut slot = self.slot()?;
        slot.blob = Some(blob.to_string());
        slot.writes += 1;
        Ok(())
    }

    fn delete(&self) -> Result<(), SessionError> {
        self.slot()?.blob = None;
        Ok(())
    }
}

/// Read the stored snapshot once at startup.
///
/// Missing, unreadable or malformed data all mean "nothing to resume".
pub fn load_resumable(store: &dyn SnapshotStore) -> Option<SessionSnapshot> {
    let blob = match store.read() {
        Ok(Some(blob)) => blob,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "could not read saved session");
            return None;
        }
    };

    match SessionSnapshot::from_json(&blob) {
        Ok(snapshot) if snapshot.scenario.validate().is_err() => {
            warn!("ignoring saved session with an empty scenario");
            None
        }
        Ok(snapshot) => {
            info!(
                scenario = %snapshot.scenario.title,
                saved_at = %snapshot.saved_at,
                "found resumable session"
            );
            Some(snapshot)
        }
        Err(e) => {
            warn!(error = %e, "ignoring malformed saved session");
            None
        }
    }
}

/// Debounced, best-effort writer of session snapshots.
pub struct AutoSaver {
    store: Box<dyn SnapshotStore>,
    debouncer: Debouncer<SessionSnapshot>,
}

impl AutoSaver {
    pub fn new(store: Box<dyn SnapshotStore>) -> Self {
        Self::with_debounce(store, DEFAULT_AUTOSAVE_DEBOUNCE)
    }

    pub fn with_debounce(store: Box<dyn SnapshotStore>, window: Duration) -> Self {
        Self {
            store,
            debouncer: Debouncer::new(window),
        }
    }

    /// Record a state change. Any save still waiting is superseded.
    pub fn note_change(&mut self, now: Instant, snapshot: SessionSnapshot) {
        self.debouncer.schedule(now, snapshot);
    }

    /// When the pending save is due, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Write the pending snapshot if its quiet period has passed.
    /// Returns `true` when a write succeeded.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.debouncer.poll(now) {
            Some(snapshot) => self.write(&snapshot),
            None => false,
        }
    }

    /// Write the pending snapshot immediately, if any.
    pub fn flush(&mut self) -> bool {
        match self.debouncer.flush() {
            Some(snapshot) => self.write(&snapshot),
            None => false,
        }
    }

    /// Drop any pending save and delete the stored blob.
    pub fn discard(&mut self) {
        self.debouncer.cancel();
        if let Err(e) = self.store.delete() {
            debug!(error = %e, "failed to delete saved session");
        }
    }

    fn write(&self, snapshot: &SessionSnapshot) -> bool {
        let result = snapshot.to_json().and_then(|blob| self.store.write(&blob));
        match result {
            Ok(()) => {
                debug!(
                    stage = snapshot.current_stage_index,
                    entries = snapshot.transcript.len(),
                    "session auto-saved"
                );
                true
            }
            Err(e) => {
                debug!(error = %e, "auto-save failed");
                false
            }
        }
    }
}

//! Session persistence.
//!
//! A [`SessionSnapshot`] is the serialisable form of a [`Session`]. Only the
//! aggregate is stored; nothing in flight (generations, capture, clocks) is.
//! See [`Session::restore`] for how a snapshot is brought back to life.
//!
//! [`Session`]: crate::session::Session
//! [`Session::restore`]: crate::session::Session::restore

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SparringError;
use crate::judge::JudgeReport;
use crate::message::Message;
use crate::session::{SessionStatus, UserDraft};
use crate::stage_plan::{DebateConfig, StageConfig};
use crate::timer::Countdown;
use crate::topic::{DebateMode, Difficulty, Stance, Topic};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub topic: Topic,
    pub user_stance: Stance,
    pub difficulty: Difficulty,
    pub config: DebateConfig,
    pub mode: DebateMode,
    pub stages: Vec<StageConfig>,
    pub current_stage_index: usize,
    pub status: SessionStatus,
    pub paused_status: Option<SessionStatus>,
    pub countdown: Countdown,
    pub countdown_remaining: u32,
    pub messages: Vec<Message>,
    pub streaming_text: String,
    pub draft: UserDraft,
    pub turns_taken: u8,
    pub ai_turns_taken: u8,
    pub turn_handled: bool,
    pub next_message_id: u64,
    pub report: Option<JudgeReport>,
}

/// A JSON file holding at most one snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/sparring/session.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("sparring").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot through a temporary file and a rename, so a crash
    /// never leaves a half-written file behind.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SparringError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    SparringError::SnapshotError(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| SparringError::SnapshotError(format!("Failed to serialize session: {}", e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        };
        write().map_err(|e| {
            SparringError::SnapshotError(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), status = ?snapshot.status, "snapshot saved");
        Ok(())
    }

    /// Returns `Ok(None)` when there is nothing to resume.
    pub fn load(&self) -> Result<Option<SessionSnapshot>, SparringError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            SparringError::SnapshotError(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let snapshot = serde_json::from_str(&content)
            .map_err(|e| SparringError::SnapshotError(format!("Corrupt session file: {}", e)))?;
        Ok(Some(snapshot))
    }

    pub fn clear(&self) -> Result<(), SparringError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SparringError::SnapshotError(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

//! Persisted data model
//!
//! One [`ImageRecord`] exists per screenshot in the remote store. Its status only
//! moves forward; the helper methods enforce the allowed transitions so the batch
//! processor cannot write an inconsistent record.

use crate::error::ValidationError;
use crate::naming::ProcessedName;
use crate::recognition::SceneMatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Processing status of a screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Recognized,
    Unrecognized,
    Renamed,
    Failed,
}

impl RecordStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [RecordStatus; 5] = [
        RecordStatus::Pending,
        RecordStatus::Recognized,
        RecordStatus::Unrecognized,
        RecordStatus::Renamed,
        RecordStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Recognized => "recognized",
            Self::Unrecognized => "unrecognized",
            Self::Renamed => "renamed",
            Self::Failed => "failed",
        }
    }

    /// Terminal statuses are never left without an explicit re-scan
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unrecognized | Self::Renamed | Self::Failed)
    }

    /// Check whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Pending, Recognized | Unrecognized | Failed) | (Recognized, Renamed | Failed)
        )
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::invalid_configuration(&format!("unknown status '{s}'")))
    }
}

/// The record persisted for each screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Identifier of the file in the remote store
    pub source_id: String,
    /// File name at discovery time
    pub original_name: String,
    /// File name after a successful rename
    pub new_name: Option<String>,
    pub status: RecordStatus,
    pub recognized_title: Option<String>,
    pub episode: Option<String>,
    /// Position in the episode, `HH:MM:SS`
    pub matched_timestamp: Option<String>,
    /// Match confidence between 0 and 1
    pub similarity: Option<f64>,
    pub anilist_id: Option<u64>,
    /// Recognition attempts, accumulated across re-scans
    #[serde(default)]
    pub attempts: u32,
    pub last_error: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Create a pending record for a newly discovered file
    pub fn new(source_id: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            original_name: original_name.into(),
            new_name: None,
            status: RecordStatus::Pending,
            recognized_title: None,
            episode: None,
            matched_timestamp: None,
            similarity: None,
            anilist_id: None,
            attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Build a `renamed` record for a file whose name shows it was renamed by an
    /// earlier run that never wrote its record
    pub fn backfilled(
        source_id: impl Into<String>,
        name: impl Into<String>,
        parsed: &ProcessedName,
    ) -> Self {
        let name = name.into();
        Self {
            source_id: source_id.into(),
            original_name: name.clone(),
            new_name: Some(name),
            status: RecordStatus::Renamed,
            recognized_title: Some(parsed.title.clone()),
            episode: Some(parsed.episode.clone()),
            matched_timestamp: Some(parsed.timestamp.clone()),
            similarity: None,
            anilist_id: None,
            attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    fn transition(&mut self, next: RecordStatus) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::invalid_transition(self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// pending -> recognized
    pub fn mark_recognized(&mut self, scene: &SceneMatch) -> Result<(), ValidationError> {
        self.transition(RecordStatus::Recognized)?;
        self.recognized_title = Some(scene.resolved_title());
        self.episode = Some(scene.episode.clone());
        self.matched_timestamp = Some(scene.timestamp.clone());
        self.similarity = Some(scene.similarity);
        self.anilist_id = Some(scene.anilist_id);
        self.last_error = None;
        Ok(())
    }

    /// pending -> unrecognized
    pub fn mark_unrecognized(&mut self, reason: impl Into<String>) -> Result<(), ValidationError> {
        self.transition(RecordStatus::Unrecognized)?;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// recognized -> renamed
    pub fn mark_renamed(&mut self, new_name: impl Into<String>) -> Result<(), ValidationError> {
        self.transition(RecordStatus::Renamed)?;
        self.new_name = Some(new_name.into());
        self.last_error = None;
        Ok(())
    }

    /// pending|recognized -> failed
    ///
    /// Match details are dropped: they are only kept for recognized or renamed
    /// records.
    pub fn mark_failed(&mut self, error: impl fmt::Display) -> Result<(), ValidationError> {
        self.transition(RecordStatus::Failed)?;
        self.recognized_title = None;
        self.episode = None;
        self.matched_timestamp = None;
        self.last_error = Some(error.to_string());
        Ok(())
    }

    /// failed -> pending, only on an operator-requested re-scan
    pub fn reset_for_rescan(&mut self) -> Result<(), ValidationError> {
        if self.status != RecordStatus::Failed {
            return Err(ValidationError::invalid_transition(
                self.status,
                RecordStatus::Pending,
            ));
        }
        self.status = RecordStatus::Pending;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Entry of the per-title index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeTitleEntry {
    pub title: String,
    pub last_updated: DateTime<Utc>,
}

impl AnimeTitleEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            last_updated: Utc::now(),
        }
    }

    /// Database key for a title: alphanumerics, `_` and `-` only
    pub fn key_for(title: &str) -> String {
        let key: String = title
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if key.is_empty() {
            "untitled".to_string()
        } else {
            key
        }
    }
}

//! Recognition data types

use crate::naming::{UNKNOWN_TITLE, clean_source_filename, clean_title};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Raw image bytes plus the content type reported by storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContent {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageContent {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// SHA-1 hex digest of the bytes, used as the cache key
    pub fn signature(&self) -> String {
        format!("{:x}", Sha1::digest(&self.bytes))
    }
}

/// Best match for a screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMatch {
    pub anilist_id: u64,
    /// Name of the source video the frame was found in
    pub source_filename: String,
    /// Formatted episode, e.g. `05`
    pub episode: String,
    /// Position in the episode, `HH:MM:SS`
    pub timestamp: String,
    pub from_seconds: f64,
    /// Confidence between 0 and 1
    pub similarity: f64,
    /// Native (or romaji) title from the localization lookup
    pub localized_title: Option<String>,
}

impl SceneMatch {
    /// Title to use in file names: localized title, then the cleaned source
    /// filename, then `Unknown`
    pub fn resolved_title(&self) -> String {
        self.localized_title
            .as_deref()
            .map(clean_title)
            .filter(|title| !title.is_empty())
            .or_else(|| clean_source_filename(&self.source_filename))
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
    }
}

/// Result of one identification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Identification {
    Match(SceneMatch),
    Unrecognized { reason: String },
}

impl Identification {
    pub fn unrecognized(reason: impl Into<String>) -> Self {
        Self::Unrecognized {
            reason: reason.into(),
        }
    }
}

/// Identification plus bookkeeping from the service layer
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOutcome {
    pub identification: Identification,
    /// Calls made to the backend for this lookup (0 for a cache hit)
    pub attempts: u32,
    pub cached: bool,
}

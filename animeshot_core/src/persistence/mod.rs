//! Record persistence
//!
//! One [`ImageRecord`] per source file plus an index of every recognized title.

pub mod firebase;

use crate::error::Result;
use crate::models::{AnimeTitleEntry, ImageRecord, RecordStatus};
use std::collections::HashMap;

pub use firebase::{FirebaseClient, FirebaseConfig};

/// Record store operations
#[async_trait::async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Fetch the record of a source file
    async fn get(&self, source_id: &str) -> Result<Option<ImageRecord>>;

    /// Create or replace the record keyed by its source id
    async fn upsert(&self, record: &ImageRecord) -> Result<()>;

    /// Status of every known record, keyed by source id
    async fn list_processed_ids(&self) -> Result<HashMap<String, RecordStatus>>;

    /// Register a recognized title in the title index
    async fn update_title_index(&self, title: &str) -> Result<()>;

    /// Records whose recognized title equals `title`
    async fn find_by_title(&self, title: &str) -> Result<Vec<ImageRecord>>;

    /// Every indexed title, sorted by title
    async fn list_titles(&self) -> Result<Vec<AnimeTitleEntry>>;
}

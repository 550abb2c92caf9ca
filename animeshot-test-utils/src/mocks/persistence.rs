//! Mock record store

use animeshot_core::error::PersistenceError;
use animeshot_core::{AnimeTitleEntry, ImageRecord, PersistenceClient, RecordStatus, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory record store
#[derive(Clone, Default)]
pub struct MockPersistence {
    state: Arc<Mutex<PersistenceState>>,
}

#[derive(Default)]
struct PersistenceState {
    records: HashMap<String, ImageRecord>,
    titles: HashMap<String, AnimeTitleEntry>,
    upserts: usize,
    /// Upserts succeed this many times, then fail with a server error
    fail_upserts_after: Option<usize>,
}

impl MockPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record
    pub fn with_record(self, record: ImageRecord) -> Self {
        self.lock()
            .records
            .insert(record.source_id.clone(), record);
        self
    }

    /// Let `successes` upserts through, fail every one after that
    pub fn fail_upserts_after(self, successes: usize) -> Self {
        self.lock().fail_upserts_after = Some(successes);
        self
    }

    /// Stop injecting upsert failures
    pub fn heal(&self) {
        self.lock().fail_upserts_after = None;
    }

    pub fn record(&self, source_id: &str) -> Option<ImageRecord> {
        self.lock().records.get(source_id).cloned()
    }

    pub fn records(&self) -> Vec<ImageRecord> {
        let mut records: Vec<_> = self.lock().records.values().cloned().collect();
        records.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        records
    }

    /// Successful upserts so far
    pub fn upserts(&self) -> usize {
        self.lock().upserts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PersistenceState> {
        self.state.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl PersistenceClient for MockPersistence {
    async fn get(&self, source_id: &str) -> Result<Option<ImageRecord>> {
        Ok(self.record(source_id))
    }

    async fn upsert(&self, record: &ImageRecord) -> Result<()> {
        let mut state = self.lock();
        if let Some(limit) = state.fail_upserts_after
            && state.upserts >= limit
        {
            return Err(PersistenceError::api(503, "mock write failure").into());
        }
        state.upserts += 1;
        state
            .records
            .insert(record.source_id.clone(), record.clone());
        Ok(())
    }

    async fn list_processed_ids(&self) -> Result<HashMap<String, RecordStatus>> {
        Ok(self
            .lock()
            .records
            .values()
            .map(|r| (r.source_id.clone(), r.status))
            .collect())
    }

    async fn update_title_index(&self, title: &str) -> Result<()> {
        self.lock()
            .titles
            .insert(AnimeTitleEntry::key_for(title), AnimeTitleEntry::new(title));
        Ok(())
    }

    async fn find_by_title(&self, title: &str) -> Result<Vec<ImageRecord>> {
        Ok(self
            .records()
            .into_iter()
            .filter(|r| r.recognized_title.as_deref() == Some(title))
            .collect())
    }

    async fn list_titles(&self) -> Result<Vec<AnimeTitleEntry>> {
        let mut titles: Vec<_> = self.lock().titles.values().cloned().collect();
        titles.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(titles)
    }
}

//! Progress reporting abstractions
//!
//! The batch processor reports through the [`ProgressProvider`] trait so the core
//! library never depends on a particular renderer.

use std::sync::Arc;

/// Core trait for progress reporting
pub trait ProgressProvider: Send + Sync {
    /// Report a progress update
    fn report(&self, update: ProgressUpdate);

    /// Create a child provider for nested operations
    fn create_child(&self, name: &str) -> Box<dyn ProgressProvider>;

    /// Signal that the operation is complete
    fn complete(&self);
}

/// Unified progress update type
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// Counters of the running batch
    BatchProgress {
        discovered: usize,
        processed: usize,
        renamed: usize,
        failed: usize,
        skipped: usize,
        current_file: Option<String>,
    },

    /// A single item moved to another pipeline stage
    ItemStage {
        source_id: String,
        name: String,
        stage: String,
    },

    /// Generic status message
    Status { message: String },
}

/// Null implementation for when no progress is needed
pub struct NullProvider;

impl ProgressProvider for NullProvider {
    fn report(&self, _update: ProgressUpdate) {}

    fn create_child(&self, _name: &str) -> Box<dyn ProgressProvider> {
        Box::new(NullProvider)
    }

    fn complete(&self) {}
}

/// Arc-wrapped provider for sharing across async tasks
pub struct SharedProvider {
    inner: Arc<dyn ProgressProvider>,
}

impl SharedProvider {
    pub fn new(provider: Arc<dyn ProgressProvider>) -> Self {
        Self { inner: provider }
    }
}

impl ProgressProvider for SharedProvider {
    fn report(&self, update: ProgressUpdate) {
        self.inner.report(update);
    }

    fn create_child(&self, _name: &str) -> Box<dyn ProgressProvider> {
        Box::new(SharedProvider {
            inner: Arc::clone(&self.inner),
        })
    }

    fn complete(&self) {
        self.inner.complete();
    }
}

impl dyn ProgressProvider {
    /// Create a null provider (useful for tests and when progress isn't needed)
    pub fn null() -> Arc<dyn ProgressProvider> {
        Arc::new(NullProvider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<ProgressUpdate>>,
    }

    impl ProgressProvider for Recorder {
        fn report(&self, update: ProgressUpdate) {
            self.updates.lock().unwrap().push(update);
        }

        fn create_child(&self, _name: &str) -> Box<dyn ProgressProvider> {
            Box::new(NullProvider)
        }

        fn complete(&self) {}
    }

    #[test]
    fn test_shared_provider_forwards_to_inner() {
        let recorder = Arc::new(Recorder::default());
        let shared = SharedProvider::new(recorder.clone());
        let child = shared.create_child("item");

        shared.report(ProgressUpdate::Status {
            message: "one".into(),
        });
        child.report(ProgressUpdate::Status {
            message: "two".into(),
        });

        assert_eq!(recorder.updates.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_null_provider_discards() {
        let provider = <dyn ProgressProvider>::null();
        provider.report(ProgressUpdate::Status {
            message: "ignored".into(),
        });
        provider.complete();
    }
}

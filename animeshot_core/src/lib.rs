//! animeshot core library
//!
//! Identifies anime screenshots with a visual search service, renames them in a
//! remote file store and keeps one record per screenshot in a document database.
//! The three external services sit behind the [`RecognitionClient`],
//! [`StorageClient`] and [`PersistenceClient`] traits; the [`BatchProcessor`]
//! drives them.

pub mod batch_processor;
pub mod checkpoint;
pub mod error;
pub mod models;
pub mod naming;
pub mod persistence;
pub mod progress;
pub mod recognition;
pub mod retry;
pub mod secret;
pub mod storage;

// Re-export main types
pub use batch_processor::{BatchConfig, BatchProcessor, RunReport, RunStats};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use error::{Error, Result};
pub use models::{AnimeTitleEntry, ImageRecord, RecordStatus};
pub use persistence::{FirebaseClient, FirebaseConfig, PersistenceClient};
pub use progress::{NullProvider, ProgressProvider, ProgressUpdate, SharedProvider};
pub use recognition::{
    Identification, ImageContent, RecognitionClient, RecognitionOutcome, RecognitionService,
    SceneMatch, TraceMoeClient, TraceMoeConfig,
};
pub use retry::RetryPolicy;
pub use secret::SecretString;
pub use storage::{
    DriveClient, DriveConfig, FileFilter, FilePage, FileRef, FolderInfo, LocalFolderStorage,
    StorageClient, list_files,
};

//! Mock implementations for testing

mod persistence;
mod recognition;
mod storage;

pub use persistence::MockPersistence;
pub use recognition::MockRecognitionClient;
pub use storage::MockStorage;

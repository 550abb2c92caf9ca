//! Test utilities for animeshot
//!
//! In-memory stand-ins for the recognition, storage and persistence services,
//! plus builders for match data.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::SceneMatchBuilder;
pub use mocks::{MockPersistence, MockRecognitionClient, MockStorage};

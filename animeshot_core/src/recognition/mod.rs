//! Screenshot recognition
//!
//! A [`RecognitionClient`] performs exactly one identification attempt. The
//! [`RecognitionService`] adds the content-signature cache and the retry budget
//! on top of any client.

pub mod anilist;
pub mod cache;
pub mod service;
pub mod trace_moe;
pub mod types;

use crate::error::Result;

pub use anilist::AnilistClient;
pub use cache::{CacheStats, RecognitionCache};
pub use service::RecognitionService;
pub use trace_moe::{TraceMoeClient, TraceMoeConfig};
pub use types::{Identification, ImageContent, RecognitionOutcome, SceneMatch};

/// A single identification attempt against a visual search backend
#[async_trait::async_trait]
pub trait RecognitionClient: Send + Sync {
    /// Identify the scene shown in `image`
    async fn identify(&self, image: &ImageContent) -> Result<Identification>;
}

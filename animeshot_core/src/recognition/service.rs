//! Recognition service: cache and retry budget around a [`RecognitionClient`]

use super::RecognitionClient;
use super::cache::{CacheStats, RecognitionCache};
use super::types::{ImageContent, RecognitionOutcome};
use crate::error::{Error, RecognitionError, Result};
use crate::retry::RetryPolicy;
use log::debug;
use std::sync::Arc;

/// Identifies screenshots with caching and bounded retries
pub struct RecognitionService {
    client: Arc<dyn RecognitionClient>,
    cache: RecognitionCache,
    retry: RetryPolicy,
}

impl RecognitionService {
    pub fn new(client: Arc<dyn RecognitionClient>, cache: RecognitionCache, retry: RetryPolicy) -> Self {
        Self {
            client,
            cache,
            retry,
        }
    }

    /// Identify an image
    ///
    /// Rate-limit and other transient failures back off and retry until the
    /// attempt ceiling. Anything else, or running out of attempts, yields
    /// [`RecognitionError::Unavailable`].
    pub async fn identify(&self, image: &ImageContent) -> Result<RecognitionOutcome> {
        let signature = image.signature();
        if let Some(identification) = self.cache.get(&signature).await {
            debug!("Recognition cache hit for {signature}");
            return Ok(RecognitionOutcome {
                identification,
                attempts: 0,
                cached: true,
            });
        }

        let (result, attempts) = self
            .retry
            .execute("recognition", || self.client.identify(image))
            .await;

        match result {
            Ok(identification) => {
                self.cache.put(&signature, &identification).await;
                Ok(RecognitionOutcome {
                    identification,
                    attempts,
                    cached: false,
                })
            }
            Err(Error::Recognition(RecognitionError::Unavailable { reason, .. })) => {
                Err(RecognitionError::unavailable(attempts, reason).into())
            }
            Err(e) => Err(RecognitionError::unavailable(attempts, e.to_string()).into()),
        }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

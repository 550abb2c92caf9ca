//! Mock recognition client

use animeshot_core::error::RecognitionError;
use animeshot_core::{Identification, ImageContent, RecognitionClient, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted recognition client
///
/// Responses are keyed by image content. Unknown content is reported as
/// unrecognized.
#[derive(Clone, Default)]
pub struct MockRecognitionClient {
    behavior: Arc<Mutex<MockBehavior>>,
}

#[derive(Default)]
struct MockBehavior {
    responses: HashMap<Vec<u8>, Identification>,
    /// Content that always fails permanently
    failures: HashMap<Vec<u8>, String>,
    /// Remaining rate-limit answers before responses are served
    rate_limits_remaining: usize,
    always_rate_limited: bool,
    delay: Duration,
    calls: usize,
}

impl MockRecognitionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `identification` for images whose bytes equal `content`
    pub fn respond(&self, content: &[u8], identification: Identification) -> &Self {
        self.lock()
            .responses
            .insert(content.to_vec(), identification);
        self
    }

    /// Fail permanently for images whose bytes equal `content`
    pub fn fail_for(&self, content: &[u8], message: &str) -> &Self {
        self.lock()
            .failures
            .insert(content.to_vec(), message.to_string());
        self
    }

    /// Answer the next `count` calls with a rate limit
    pub fn rate_limit_next(&self, count: usize) -> &Self {
        self.lock().rate_limits_remaining = count;
        self
    }

    /// Answer every call with a rate limit
    pub fn always_rate_limited(&self) -> &Self {
        self.lock().always_rate_limited = true;
        self
    }

    /// Delay every call
    pub fn with_delay(&self, delay: Duration) -> &Self {
        self.lock().delay = delay;
        self
    }

    /// Number of identify calls made
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockBehavior> {
        self.behavior.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl RecognitionClient for MockRecognitionClient {
    async fn identify(&self, image: &ImageContent) -> Result<Identification> {
        let delay = {
            let mut behavior = self.lock();
            behavior.calls += 1;
            behavior.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut behavior = self.lock();
        if behavior.always_rate_limited {
            return Err(RecognitionError::rate_limited(None).into());
        }
        if behavior.rate_limits_remaining > 0 {
            behavior.rate_limits_remaining -= 1;
            return Err(RecognitionError::rate_limited(None).into());
        }
        if let Some(message) = behavior.failures.get(&image.bytes) {
            return Err(RecognitionError::invalid_response(message.clone()).into());
        }

        Ok(behavior
            .responses
            .get(&image.bytes)
            .cloned()
            .unwrap_or_else(|| Identification::unrecognized("no matches")))
    }
}

//! trace.moe search client
//!
//! Sends the raw image to the search endpoint, validates the best result and
//! resolves its title through Anilist. Requests are spaced by a minimum interval
//! so a batch never bursts the API.

use super::RecognitionClient;
use super::anilist::{AnilistClient, DEFAULT_ANILIST_URL};
use super::types::{Identification, ImageContent, SceneMatch};
use crate::error::{RecognitionError, Result};
use crate::naming::{format_episode, format_timestamp};
use crate::secret::SecretString;
use log::{debug, info, warn};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_SEARCH_URL: &str = "https://api.trace.moe/search";
const USER_AGENT: &str = concat!("animeshot/", env!("CARGO_PKG_VERSION"));
const API_KEY_HEADER: &str = "x-trace-key";
/// A result without an episode is still a match, formatted as episode `00`
const REQUIRED_FIELDS: [&str; 3] = ["anilist", "filename", "similarity"];

/// trace.moe client configuration
#[derive(Debug, Clone)]
pub struct TraceMoeConfig {
    pub search_url: String,
    pub anilist_url: String,
    pub api_key: Option<SecretString>,
    /// Best matches below this similarity count as unrecognized
    pub min_similarity: f64,
    /// Minimum spacing between two search requests
    pub min_request_interval: Duration,
    pub timeout: Duration,
}

impl Default for TraceMoeConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            anilist_url: DEFAULT_ANILIST_URL.to_string(),
            api_key: None,
            min_similarity: 0.8,
            min_request_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    result: Vec<Value>,
}

/// Spaces out requests to the search API
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("trace.moe rate limiting: waiting {wait_time:?}");
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// trace.moe API client
pub struct TraceMoeClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    anilist: AnilistClient,
    config: TraceMoeConfig,
}

impl TraceMoeClient {
    pub fn new(config: TraceMoeConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| RecognitionError::network(e.to_string()))?;

        Ok(Self {
            anilist: AnilistClient::new(http_client.clone(), config.anilist_url.clone()),
            rate_limiter: Arc::new(RateLimiter::new(config.min_request_interval)),
            http_client,
            config,
        })
    }

    async fn search(&self, image: &ImageContent) -> Result<SearchResponse> {
        self.rate_limiter.wait().await;

        let mut request = self
            .http_client
            .post(&self.config.search_url)
            .header(CONTENT_TYPE, image.mime_type.as_str())
            .body(image.bytes.clone());
        if let Some(key) = self.config.api_key.as_ref().filter(|k| !k.is_empty()) {
            request = request.header(API_KEY_HEADER, key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| RecognitionError::network(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(RecognitionError::rate_limited(retry_after).into())
            }
            StatusCode::PAYMENT_REQUIRED => Err(RecognitionError::QuotaExceeded.into()),
            s if !s.is_success() => {
                let text = response.text().await.unwrap_or_default();
                Err(RecognitionError::server_error(s.as_u16(), &text).into())
            }
            _ => response
                .json::<SearchResponse>()
                .await
                .map_err(|e| RecognitionError::invalid_response(e.to_string()).into()),
        }
    }

    async fn localized_title(&self, anilist_id: u64) -> Option<String> {
        match self.anilist.title(anilist_id).await {
            Ok(title) => title,
            Err(e) => {
                warn!("Anilist lookup for {anilist_id} failed, using source filename: {e}");
                None
            }
        }
    }
}

/// Anilist id from a result; plain number, numeric string or `{ "id": n }`
fn anilist_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => map.get("id").and_then(anilist_id),
        _ => None,
    }
}

fn missing_fields(result: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .into_iter()
        .filter(|field| !result.contains_key(*field))
        .collect()
}

#[async_trait::async_trait]
impl RecognitionClient for TraceMoeClient {
    async fn identify(&self, image: &ImageContent) -> Result<Identification> {
        let response = self.search(image).await?;

        if !response.error.is_empty() {
            return Err(RecognitionError::invalid_response(response.error).into());
        }

        let Some(best) = response.result.first().and_then(Value::as_object) else {
            return Ok(Identification::unrecognized("no matches"));
        };

        let missing = missing_fields(best);
        if !missing.is_empty() {
            warn!("Invalid match data from trace.moe, missing {missing:?}");
            return Ok(Identification::unrecognized(format!(
                "incomplete match data (missing {})",
                missing.join(", ")
            )));
        }

        let Some(anilist_id) = best.get("anilist").and_then(anilist_id) else {
            return Ok(Identification::unrecognized("match has no anilist id"));
        };
        let similarity = best.get("similarity").and_then(Value::as_f64).unwrap_or(0.0);
        if similarity < self.config.min_similarity {
            return Ok(Identification::unrecognized(format!(
                "best match similarity {:.2}% below threshold {:.2}%",
                similarity * 100.0,
                self.config.min_similarity * 100.0
            )));
        }

        let from_seconds = best.get("from").and_then(Value::as_f64);
        let scene = SceneMatch {
            anilist_id,
            source_filename: best
                .get("filename")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            episode: format_episode(best.get("episode")),
            timestamp: format_timestamp(from_seconds),
            from_seconds: from_seconds.unwrap_or(0.0),
            similarity,
            localized_title: self.localized_title(anilist_id).await,
        };

        info!(
            "trace.moe match: anilist {} episode {} at {} ({:.2}%)",
            scene.anilist_id,
            scene.episode,
            scene.timestamp,
            scene.similarity * 100.0
        );
        Ok(Identification::Match(scene))
    }
}

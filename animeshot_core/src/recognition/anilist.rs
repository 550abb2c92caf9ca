//! Anilist title lookup
//!
//! Resolves an Anilist media id to its native title (romaji when no native title
//! exists). Lookups are cached per id for the lifetime of the client.

use crate::error::{RecognitionError, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

pub const DEFAULT_ANILIST_URL: &str = "https://graphql.anilist.co";

const TITLE_QUERY: &str = "query ($id: Int) { Media (id: $id, type: ANIME) { title { native romaji } } }";

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<MediaData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MediaData {
    media: Option<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    title: Option<MediaTitle>,
}

#[derive(Debug, Deserialize)]
struct MediaTitle {
    native: Option<String>,
    romaji: Option<String>,
}

/// Client for the Anilist GraphQL API
pub struct AnilistClient {
    http_client: reqwest::Client,
    url: String,
    titles: RwLock<HashMap<u64, String>>,
}

impl AnilistClient {
    pub fn new(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
            titles: RwLock::new(HashMap::new()),
        }
    }

    /// Build a client with its own HTTP connection pool
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecognitionError::network(e.to_string()))?;
        Ok(Self::new(http_client, url))
    }

    /// Look up the localized title, `Ok(None)` when Anilist has none
    pub async fn title(&self, anilist_id: u64) -> Result<Option<String>> {
        if let Some(title) = self.titles.read().await.get(&anilist_id) {
            return Ok(Some(title.clone()));
        }

        debug!("Querying Anilist for media {anilist_id}");
        let response = self
            .http_client
            .post(&self.url)
            .json(&json!({ "query": TITLE_QUERY, "variables": { "id": anilist_id } }))
            .send()
            .await
            .map_err(|e| RecognitionError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RecognitionError::server_error(status.as_u16(), &text).into());
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::invalid_response(e.to_string()))?;

        let title = body
            .data
            .and_then(|data| data.media)
            .and_then(|media| media.title)
            .and_then(|title| {
                title
                    .native
                    .filter(|t| !t.trim().is_empty())
                    .or(title.romaji.filter(|t| !t.trim().is_empty()))
            });

        match &title {
            Some(title) => {
                self.titles.write().await.insert(anilist_id, title.clone());
            }
            None => warn!("Anilist returned no title for media {anilist_id}"),
        }

        Ok(title)
    }
}

//! Firebase Realtime Database client over the REST API
//!
//! Records live under `images/<key>` where the key is the source id with the
//! characters Firebase forbids in keys escaped. The title index lives under
//! `anime_titles/<key>`.

use super::PersistenceClient;
use crate::error::{PersistenceError, Result};
use crate::models::{AnimeTitleEntry, ImageRecord, RecordStatus};
use crate::secret::SecretString;
use log::{debug, warn};
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

const IMAGES_PATH: &str = "images";
const TITLES_PATH: &str = "anime_titles";

/// Firebase connection settings
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Database root, e.g. `https://project-default-rtdb.firebaseio.com`
    pub database_url: String,
    /// Database secret or ID token, sent as the `auth` query parameter
    pub auth_token: Option<SecretString>,
    pub timeout: Duration,
}

impl FirebaseConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            auth_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Escape a source id into a valid Firebase key
///
/// `. $ # [ ] /` are forbidden in keys; `%` and `~` are escaped too so the
/// mapping stays reversible.
pub fn record_key(source_id: &str) -> String {
    let mut key = String::with_capacity(source_id.len());
    for c in source_id.chars() {
        match c {
            '.' | '$' | '#' | '[' | ']' | '/' | '%' | '~' => {
                key.push_str(&format!("~{:02X}", c as u32));
            }
            c if c.is_control() => key.push_str(&format!("~{:02X}", c as u32)),
            c => key.push(c),
        }
    }
    key
}

/// Firebase Realtime Database client
pub struct FirebaseClient {
    http_client: reqwest::Client,
    config: FirebaseConfig,
}

impl FirebaseClient {
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PersistenceError::network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{path}.json",
            self.config.database_url.trim_end_matches('/')
        )
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.auth_token.as_ref().filter(|t| !t.is_empty()) {
            Some(token) => request.query(&[("auth", token.expose_secret())]),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .with_auth(request)
            .send()
            .await
            .map_err(|e| PersistenceError::network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(PersistenceError::api(status.as_u16(), &text).into())
    }

    /// GET a node; `null` decodes as `None`
    async fn read<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let request = self.http_client.get(self.url(path)).query(query);
        let response = self.send(request).await?;
        response
            .json::<Option<T>>()
            .await
            .map_err(|e| PersistenceError::serialization(e.to_string()).into())
    }

    async fn write<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        let request = self.http_client.put(self.url(path)).json(value);
        self.send(request).await?;
        Ok(())
    }

    async fn all_records(&self) -> Result<HashMap<String, ImageRecord>> {
        Ok(self
            .read::<HashMap<String, ImageRecord>>(IMAGES_PATH, &[])
            .await?
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl PersistenceClient for FirebaseClient {
    async fn get(&self, source_id: &str) -> Result<Option<ImageRecord>> {
        self.read(&format!("{IMAGES_PATH}/{}", record_key(source_id)), &[])
            .await
    }

    async fn upsert(&self, record: &ImageRecord) -> Result<()> {
        debug!("Saving record {} ({})", record.source_id, record.status);
        self.write(
            &format!("{IMAGES_PATH}/{}", record_key(&record.source_id)),
            record,
        )
        .await
    }

    async fn list_processed_ids(&self) -> Result<HashMap<String, RecordStatus>> {
        Ok(self
            .all_records()
            .await?
            .into_values()
            .map(|record| (record.source_id, record.status))
            .collect())
    }

    async fn update_title_index(&self, title: &str) -> Result<()> {
        let path = format!("{TITLES_PATH}/{}", AnimeTitleEntry::key_for(title));
        self.write(&path, &AnimeTitleEntry::new(title)).await
    }

    async fn find_by_title(&self, title: &str) -> Result<Vec<ImageRecord>> {
        let query = [
            ("orderBy", "\"recognized_title\"".to_string()),
            ("equalTo", serde_json::to_string(title)?),
        ];

        let records = match self
            .read::<HashMap<String, ImageRecord>>(IMAGES_PATH, &query)
            .await
        {
            Ok(records) => records.unwrap_or_default(),
            // Queries need an `.indexOn` rule; without one Firebase answers 400
            Err(crate::Error::Persistence(PersistenceError::Api { code, message }))
                if code == StatusCode::BAD_REQUEST.as_u16() =>
            {
                warn!("Title query rejected ({message}), filtering all records locally");
                self.all_records()
                    .await?
                    .into_iter()
                    .filter(|(_, r)| r.recognized_title.as_deref() == Some(title))
                    .collect()
            }
            Err(e) => return Err(e),
        };

        let mut records: Vec<ImageRecord> = records.into_values().collect();
        records.sort_by(|a, b| {
            a.episode
                .cmp(&b.episode)
                .then_with(|| a.matched_timestamp.cmp(&b.matched_timestamp))
        });
        Ok(records)
    }

    async fn list_titles(&self) -> Result<Vec<AnimeTitleEntry>> {
        let mut titles: Vec<AnimeTitleEntry> = self
            .read::<HashMap<String, AnimeTitleEntry>>(TITLES_PATH, &[])
            .await?
            .unwrap_or_default()
            .into_values()
            .collect();
        titles.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer, auth: Option<&str>) -> FirebaseClient {
        let mut config = FirebaseConfig::new(server.base_url());
        config.auth_token = auth.map(SecretString::from);
        FirebaseClient::new(config).unwrap()
    }

    fn renamed(source_id: &str, title: &str, episode: &str) -> ImageRecord {
        let mut record = ImageRecord::new(source_id, "shot.jpg");
        record.status = RecordStatus::Renamed;
        record.recognized_title = Some(title.to_string());
        record.episode = Some(episode.to_string());
        record.matched_timestamp = Some("00:01:00".to_string());
        record
    }

    #[test]
    fn test_record_key_escapes_forbidden_characters() {
        assert_eq!(record_key("1AbC-xyz_9"), "1AbC-xyz_9");
        assert_eq!(record_key("/tmp/a.jpg"), "~2Ftmp~2Fa~2Ejpg");
        assert_eq!(record_key("a~b%c"), "a~7Eb~25c");
        assert_eq!(record_key("$#[]"), "~24~23~5B~5D");
    }

    #[tokio::test]
    async fn test_upsert_puts_record_with_auth() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/images/file-1.json")
                .query_param("auth", "secret")
                .json_body_includes(r#"{ "source_id": "file-1", "status": "renamed" }"#);
            then.status(200).json_body(json!({}));
        });

        client(&server, Some("secret"))
            .upsert(&renamed("file-1", "Title", "01"))
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_get_missing_record_is_none() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/images/nope.json");
            then.status(200).body("null");
        });

        assert!(client(&server, None).get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_processed_ids() {
        let server = MockServer::start_async().await;
        let records = json!({
            "a": renamed("a", "T", "01"),
            "b": ImageRecord::new("b", "b.jpg"),
        });
        server.mock(|when, then| {
            when.method(GET).path("/images.json");
            then.status(200).json_body(records);
        });

        let ids = client(&server, None).list_processed_ids().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids["a"], RecordStatus::Renamed);
        assert_eq!(ids["b"], RecordStatus::Pending);
    }

    #[tokio::test]
    async fn test_empty_database_lists_nothing() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/images.json");
            then.status(200).body("null");
        });

        assert!(client(&server, None).list_processed_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_title_queries_and_sorts() {
        let server = MockServer::start_async().await;
        let records = json!({
            "b": renamed("b", "Frieren", "02"),
            "a": renamed("a", "Frieren", "01"),
        });
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/images.json")
                .query_param("orderBy", "\"recognized_title\"")
                .query_param("equalTo", "\"Frieren\"");
            then.status(200).json_body(records);
        });

        let found = client(&server, None).find_by_title("Frieren").await.unwrap();
        mock.assert();
        let ids: Vec<_> = found.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_find_by_title_falls_back_without_index() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/images.json")
                .query_param_exists("orderBy");
            then.status(400)
                .json_body(json!({ "error": "Index not defined" }));
        });
        let records = json!({
            "a": renamed("a", "Frieren", "01"),
            "b": renamed("b", "Mushishi", "01"),
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/images.json")
                .query_param_missing("orderBy");
            then.status(200).json_body(records);
        });

        let found = client(&server, None).find_by_title("Mushishi").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source_id, "b");
    }

    #[tokio::test]
    async fn test_title_index() {
        let server = MockServer::start_async().await;
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/anime_titles/SpyFamily.json")
                .json_body_includes(r#"{ "title": "Spy × Family" }"#);
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/anime_titles.json");
            then.status(200).json_body(json!({
                "b": { "title": "Mushishi", "last_updated": "2024-01-02T00:00:00Z" },
                "a": { "title": "Frieren", "last_updated": "2024-01-01T00:00:00Z" }
            }));
        });

        let firebase = client(&server, None);
        firebase.update_title_index("Spy × Family").await.unwrap();
        put.assert();

        let titles: Vec<_> = firebase
            .list_titles()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, ["Frieren", "Mushishi"]);
    }

    #[tokio::test]
    async fn test_permission_denied_is_not_transient() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(PUT).path("/images/x.json");
            then.status(401)
                .json_body(json!({ "error": "Permission denied" }));
        });

        let err = client(&server, None)
            .upsert(&ImageRecord::new("x", "x.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Persistence(PersistenceError::Unauthorized { .. })
        ));
        assert!(!err.is_transient());
    }
}

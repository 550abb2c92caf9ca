//! Google Drive v3 storage client
//!
//! Lists image files in a folder, downloads their content and renames them in
//! place. Shared drives are included in every call.

use super::{FOLDER_MIME_TYPE, FileRef, FilePage, FolderInfo, StorageClient};
use crate::error::{Result, StorageError};
use crate::recognition::ImageContent;
use crate::secret::SecretString;
use log::debug;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const FILE_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";
const FOLDER_FIELDS: &str = "id, name, mimeType";

/// Drive client configuration
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub api_base: String,
    /// OAuth access token sent as a bearer token
    pub access_token: SecretString,
    pub page_size: u32,
    pub timeout: Duration,
}

impl DriveConfig {
    pub fn new(access_token: impl Into<SecretString>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: access_token.into(),
            page_size: 100,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
}

impl From<DriveFile> for FileRef {
    fn from(file: DriveFile) -> Self {
        FileRef::new(file.id, file.name, file.mime_type)
    }
}

impl From<DriveFile> for FolderInfo {
    fn from(file: DriveFile) -> Self {
        FolderInfo {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
        }
    }
}

/// Google Drive API client
pub struct DriveClient {
    http_client: reqwest::Client,
    config: DriveConfig,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::network("client setup", e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(self.config.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| StorageError::network(operation, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(StorageError::api(operation, status.as_u16(), &text).into())
    }

    async fn list(&self, operation: &str, query: &[(&str, String)]) -> Result<FileList> {
        let request = self.http_client.get(self.url("files")).query(query);
        self.send(operation, request)
            .await?
            .json::<FileList>()
            .await
            .map_err(|e| StorageError::invalid_response(e.to_string()).into())
    }
}

#[async_trait::async_trait]
impl StorageClient for DriveClient {
    async fn list_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<FilePage> {
        let mut query = vec![
            (
                "q",
                format!("'{folder_id}' in parents and mimeType contains 'image/' and trashed=false"),
            ),
            ("pageSize", self.config.page_size.to_string()),
            ("fields", FILE_FIELDS.to_string()),
            ("orderBy", "name".to_string()),
            ("supportsAllDrives", "true".to_string()),
            ("includeItemsFromAllDrives", "true".to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let list = self.list("list files", &query).await?;
        debug!(
            "Listed {} files in folder {folder_id} (more: {})",
            list.files.len(),
            list.next_page_token.is_some()
        );

        Ok(FilePage {
            files: list.files.into_iter().map(FileRef::from).collect(),
            next_page_token: list.next_page_token,
        })
    }

    async fn download(&self, file: &FileRef) -> Result<ImageContent> {
        let request = self
            .http_client
            .get(self.url(&format!("files/{}", file.id)))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);
        let bytes = self
            .send("download", request)
            .await?
            .bytes()
            .await
            .map_err(|e| StorageError::network("download", e.to_string()))?;

        Ok(ImageContent::new(bytes.to_vec(), file.mime_type.clone()))
    }

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<()> {
        let request = self
            .http_client
            .patch(self.url(&format!("files/{file_id}")))
            .query(&[("supportsAllDrives", "true")])
            .json(&json!({ "name": new_name }));
        self.send("rename", request).await?;
        Ok(())
    }

    async fn check_folder(&self, folder_id: &str) -> Result<FolderInfo> {
        let request = self
            .http_client
            .get(self.url(&format!("files/{folder_id}")))
            .query(&[("fields", FOLDER_FIELDS), ("supportsAllDrives", "true")]);

        let response = match self.send("check folder", request).await {
            Ok(response) => response,
            Err(crate::Error::Storage(StorageError::Api { code, .. }))
                if code == StatusCode::NOT_FOUND.as_u16() =>
            {
                return Err(StorageError::not_found(folder_id).into());
            }
            Err(e) => return Err(e),
        };

        let folder: DriveFile = response
            .json()
            .await
            .map_err(|e| StorageError::invalid_response(e.to_string()))?;

        if folder.mime_type != FOLDER_MIME_TYPE {
            return Err(StorageError::not_a_folder(folder_id, folder.mime_type).into());
        }
        Ok(folder.into())
    }

    async fn list_folders(&self, limit: usize) -> Result<Vec<FolderInfo>> {
        let query = [
            (
                "q",
                format!("mimeType='{FOLDER_MIME_TYPE}' and trashed=false"),
            ),
            ("pageSize", limit.to_string()),
            ("fields", FILE_FIELDS.to_string()),
            ("supportsAllDrives", "true".to_string()),
            ("includeItemsFromAllDrives", "true".to_string()),
        ];

        let list = self.list("list folders", &query).await?;
        Ok(list
            .files
            .into_iter()
            .take(limit)
            .map(FolderInfo::from)
            .collect())
    }
}

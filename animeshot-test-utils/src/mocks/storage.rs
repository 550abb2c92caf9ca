//! Mock file store

use animeshot_core::error::StorageError;
use animeshot_core::{FilePage, FileRef, FolderInfo, ImageContent, Result, StorageClient};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory folder
///
/// File content defaults to the file id's bytes, which lets a
/// [`MockRecognitionClient`](crate::MockRecognitionClient) script answers per
/// file.
#[derive(Clone)]
pub struct MockStorage {
    state: Arc<Mutex<StorageState>>,
}

struct StorageState {
    files: Vec<FileRef>,
    contents: HashMap<String, Vec<u8>>,
    page_size: usize,
    stable_ids: bool,
    renames: Vec<(String, String)>,
    downloads: usize,
    failing_downloads: HashSet<String>,
    failing_renames: HashSet<String>,
    download_delay: Duration,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StorageState {
                files: Vec::new(),
                contents: HashMap::new(),
                page_size: 100,
                stable_ids: true,
                renames: Vec::new(),
                downloads: 0,
                failing_downloads: HashSet::new(),
                failing_renames: HashSet::new(),
                download_delay: Duration::ZERO,
            })),
        }
    }

    /// Add an image file
    pub fn with_file(self, id: &str, name: &str) -> Self {
        self.lock()
            .files
            .push(FileRef::new(id, name, "image/jpeg"));
        self
    }

    /// Add `count` files named `shot_<n>.jpg` with ids `file-<n>`
    pub fn with_files(self, count: usize) -> Self {
        for n in 0..count {
            self.lock().files.push(FileRef::new(
                format!("file-{n:03}"),
                format!("shot_{n:03}.jpg"),
                "image/jpeg",
            ));
        }
        self
    }

    /// Set the content returned for a file
    pub fn with_content(self, id: &str, content: &[u8]) -> Self {
        self.lock()
            .contents
            .insert(id.to_string(), content.to_vec());
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Behave like a store whose ids change on rename
    pub fn with_unstable_ids(self) -> Self {
        self.lock().stable_ids = false;
        self
    }

    /// Downloads of `id` fail with a server error
    pub fn fail_download(self, id: &str) -> Self {
        self.lock().failing_downloads.insert(id.to_string());
        self
    }

    /// Renames of `id` fail with a server error
    pub fn fail_rename(self, id: &str) -> Self {
        self.lock().failing_renames.insert(id.to_string());
        self
    }

    pub fn with_download_delay(self, delay: Duration) -> Self {
        self.lock().download_delay = delay;
        self
    }

    /// Renames performed, as `(id, new_name)`
    pub fn renames(&self) -> Vec<(String, String)> {
        self.lock().renames.clone()
    }

    /// Current name of a file
    pub fn name_of(&self, id: &str) -> Option<String> {
        self.lock()
            .files
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.name.clone())
    }

    pub fn downloads(&self) -> usize {
        self.lock().downloads
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StorageState> {
        self.state.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl StorageClient for MockStorage {
    async fn list_page(&self, _folder_id: &str, page_token: Option<&str>) -> Result<FilePage> {
        let state = self.lock();
        let offset = page_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let end = (offset + state.page_size).min(state.files.len());
        Ok(FilePage {
            files: state.files.get(offset..end).map(<[_]>::to_vec).unwrap_or_default(),
            next_page_token: (end < state.files.len()).then(|| end.to_string()),
        })
    }

    async fn download(&self, file: &FileRef) -> Result<ImageContent> {
        let delay = {
            let mut state = self.lock();
            state.downloads += 1;
            state.download_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let state = self.lock();
        if state.failing_downloads.contains(&file.id) {
            return Err(StorageError::api("download", 500, "mock download failure").into());
        }
        let bytes = state
            .contents
            .get(&file.id)
            .cloned()
            .unwrap_or_else(|| file.id.as_bytes().to_vec());
        Ok(ImageContent::new(bytes, file.mime_type.clone()))
    }

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<()> {
        let mut state = self.lock();
        if state.failing_renames.contains(file_id) {
            return Err(StorageError::api("rename", 500, "mock rename failure").into());
        }
        let stable = state.stable_ids;
        let mut found = false;
        // A file listed more than once is the same file in every position
        for file in state.files.iter_mut().filter(|f| f.id == file_id) {
            found = true;
            file.name = new_name.to_string();
            if !stable {
                file.id = format!("{file_id}@{new_name}");
            }
        }
        if !found {
            return Err(StorageError::not_found(file_id).into());
        }
        state
            .renames
            .push((file_id.to_string(), new_name.to_string()));
        Ok(())
    }

    async fn check_folder(&self, folder_id: &str) -> Result<FolderInfo> {
        Ok(FolderInfo {
            id: folder_id.to_string(),
            name: "Mock Folder".to_string(),
            mime_type: animeshot_core::storage::FOLDER_MIME_TYPE.to_string(),
        })
    }

    async fn list_folders(&self, limit: usize) -> Result<Vec<FolderInfo>> {
        Ok(vec![FolderInfo {
            id: "mock-folder".to_string(),
            name: "Mock Folder".to_string(),
            mime_type: animeshot_core::storage::FOLDER_MIME_TYPE.to_string(),
        }]
        .into_iter()
        .take(limit)
        .collect())
    }

    fn has_stable_ids(&self) -> bool {
        self.lock().stable_ids
    }
}

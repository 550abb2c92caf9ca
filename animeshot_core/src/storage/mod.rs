//! File storage
//!
//! The [`StorageClient`] trait hides the file store behind page-wise listing,
//! download and rename. [`list_files`] turns the pages into one lazy stream.

pub mod drive;
pub mod filter;
pub mod local;

use crate::error::{Error, Result};
use crate::recognition::ImageContent;
use crate::retry::RetryPolicy;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use drive::{DriveClient, DriveConfig};
pub use filter::FileFilter;
pub use local::LocalFolderStorage;

/// MIME type Google Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl FileRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// One page of a folder listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePage {
    pub files: Vec<FileRef>,
    /// Token for the next page, `None` on the last page
    pub next_page_token: Option<String>,
}

/// Folder metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

/// Storage operations used by the batch processor
#[async_trait::async_trait]
pub trait StorageClient: Send + Sync {
    /// List one page of image files in a folder
    async fn list_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<FilePage>;

    /// Download the content of a file
    async fn download(&self, file: &FileRef) -> Result<ImageContent>;

    /// Rename a file in place
    async fn rename(&self, file_id: &str, new_name: &str) -> Result<()>;

    /// Verify a folder exists and is a folder
    async fn check_folder(&self, folder_id: &str) -> Result<FolderInfo>;

    /// List folders visible to the current credentials
    async fn list_folders(&self, limit: usize) -> Result<Vec<FolderInfo>>;

    /// Whether a file keeps its id across renames
    fn has_stable_ids(&self) -> bool {
        true
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Stream every image file of a folder, fetching pages on demand
///
/// Each page request is retried according to `retry`; a page that still fails
/// ends the stream with that error.
pub fn list_files(
    storage: Arc<dyn StorageClient>,
    folder_id: String,
    retry: RetryPolicy,
) -> BoxStream<'static, Result<FileRef>> {
    stream::try_unfold(Cursor::Start, move |cursor| {
        let storage = Arc::clone(&storage);
        let folder_id = folder_id.clone();
        async move {
            let token = match cursor {
                Cursor::Done => return Ok::<_, Error>(None),
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
            };

            let (page, _) = retry
                .execute("list files", || storage.list_page(&folder_id, token.as_deref()))
                .await;
            let page = page?;

            let next = match page.next_page_token {
                Some(token) if !token.is_empty() => Cursor::Next(token),
                _ => Cursor::Done,
            };
            let files = stream::iter(page.files.into_iter().map(Ok::<FileRef, Error>));
            Ok::<_, Error>(Some((files, next)))
        }
    })
    .try_flatten()
    .boxed()
}

/// Guess an image MIME type from a file extension
pub fn mime_type_for(name: &str) -> Option<&'static str> {
    match crate::naming::extension_of(name)?.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use std::sync::Mutex;
    use std::time::Duration;

    struct PagedStorage {
        pages: Vec<FilePage>,
        requested: Mutex<Vec<Option<String>>>,
        fail_first: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl StorageClient for PagedStorage {
        async fn list_page(&self, _folder: &str, token: Option<&str>) -> Result<FilePage> {
            {
                let mut fail = self.fail_first.lock().unwrap();
                if *fail {
                    *fail = false;
                    return Err(StorageError::network("list", "reset").into());
                }
            }
            self.requested.lock().unwrap().push(token.map(str::to_string));
            let index = token.map_or(0, |t| t.parse::<usize>().unwrap());
            Ok(self.pages[index].clone())
        }

        async fn download(&self, _file: &FileRef) -> Result<ImageContent> {
            unreachable!()
        }

        async fn rename(&self, _file_id: &str, _new_name: &str) -> Result<()> {
            unreachable!()
        }

        async fn check_folder(&self, _folder_id: &str) -> Result<FolderInfo> {
            unreachable!()
        }

        async fn list_folders(&self, _limit: usize) -> Result<Vec<FolderInfo>> {
            unreachable!()
        }
    }

    fn page(names: &[&str], next: Option<&str>) -> FilePage {
        FilePage {
            files: names
                .iter()
                .map(|n| FileRef::new(*n, format!("{n}.jpg"), "image/jpeg"))
                .collect(),
            next_page_token: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_list_files_follows_page_tokens() {
        let storage = Arc::new(PagedStorage {
            pages: vec![page(&["a", "b"], Some("1")), page(&["c"], Some("2")), page(&[], None)],
            requested: Mutex::new(Vec::new()),
            fail_first: Mutex::new(true),
        });

        let retry = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1));
        let files: Vec<FileRef> = list_files(storage.clone(), "folder".into(), retry)
            .try_collect()
            .await
            .unwrap();

        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(
            *storage.requested.lock().unwrap(),
            vec![None, Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for("a.JPG"), Some("image/jpeg"));
        assert_eq!(mime_type_for("a.webp"), Some("image/webp"));
        assert_eq!(mime_type_for("a.txt"), None);
    }
}

//! Local directory storage
//!
//! Treats a directory on disk as the folder and each image file's full path as
//! its id. Renaming changes the id, so records cannot be backfilled.
//!
//! The first page reads the directory and later pages slice that same listing,
//! so files renamed mid-run cannot shift unprocessed files out of view.

use super::{FileRef, FilePage, FolderInfo, StorageClient, mime_type_for};
use crate::error::{Result, StorageError};
use crate::recognition::ImageContent;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use walkdir::WalkDir;

const FOLDER_MIME_TYPE: &str = "inode/directory";

/// Storage backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalFolderStorage {
    page_size: usize,
    snapshot: Arc<Mutex<Option<Snapshot>>>,
}

/// Directory listing taken when the first page was requested
#[derive(Debug)]
struct Snapshot {
    folder_id: String,
    files: Arc<Vec<FileRef>>,
}

impl Default for LocalFolderStorage {
    fn default() -> Self {
        Self::new(100)
    }
}

impl LocalFolderStorage {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            snapshot: Arc::new(Mutex::new(None)),
        }
    }

    async fn read_dir(folder_id: &str) -> Result<Vec<FileRef>> {
        let dir = PathBuf::from(folder_id);
        tokio::task::spawn_blocking(move || Self::image_files(&dir))
            .await
            .map_err(|e| StorageError::io(io::Error::other(e.to_string())))?
    }

    fn cached(&self, folder_id: &str) -> Option<Arc<Vec<FileRef>>> {
        let snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot
            .as_ref()
            .filter(|snapshot| snapshot.folder_id == folder_id)
            .map(|snapshot| Arc::clone(&snapshot.files))
    }

    /// Listing for `folder_id`, read fresh on the first page
    async fn listing(&self, folder_id: &str, first_page: bool) -> Result<Arc<Vec<FileRef>>> {
        if !first_page && let Some(files) = self.cached(folder_id) {
            return Ok(files);
        }

        let files = Arc::new(Self::read_dir(folder_id).await?);
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Snapshot {
            folder_id: folder_id.to_string(),
            files: Arc::clone(&files),
        });
        Ok(files)
    }

    /// Image files directly inside `dir`, sorted by name
    fn image_files(dir: &Path) -> Result<Vec<FileRef>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("directory walk failed"));
                StorageError::io_at(dir, source)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(mime_type) = mime_type_for(&name) {
                files.push(FileRef::new(
                    entry.path().to_string_lossy(),
                    name,
                    mime_type,
                ));
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn folder_info(path: &Path) -> FolderInfo {
        FolderInfo {
            id: path.to_string_lossy().to_string(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string()),
            mime_type: FOLDER_MIME_TYPE.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl StorageClient for LocalFolderStorage {
    async fn list_page(&self, folder_id: &str, page_token: Option<&str>) -> Result<FilePage> {
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StorageError::invalid_response(format!("bad page token '{token}'")))?,
            None => 0,
        };

        let files = self.listing(folder_id, page_token.is_none()).await?;

        let end = (offset + self.page_size).min(files.len());
        let next_page_token = (end < files.len()).then(|| end.to_string());
        Ok(FilePage {
            files: files.get(offset..end).map(<[_]>::to_vec).unwrap_or_default(),
            next_page_token,
        })
    }

    async fn download(&self, file: &FileRef) -> Result<ImageContent> {
        let path = Path::new(&file.id);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::io_at(path, e))?;
        Ok(ImageContent::new(bytes, file.mime_type.clone()))
    }

    async fn rename(&self, file_id: &str, new_name: &str) -> Result<()> {
        let from = Path::new(file_id);
        let to = from.with_file_name(new_name);
        if from == to {
            return Ok(());
        }

        if tokio::fs::try_exists(&to)
            .await
            .map_err(|e| StorageError::io_at(&to, e))?
        {
            return Err(StorageError::io_at(
                &to,
                io::Error::new(io::ErrorKind::AlreadyExists, "target name already exists"),
            )
            .into());
        }

        tokio::fs::rename(from, &to)
            .await
            .map_err(|e| StorageError::io_at(from, e))?;
        Ok(())
    }

    async fn check_folder(&self, folder_id: &str) -> Result<FolderInfo> {
        let path = Path::new(folder_id);
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(Self::folder_info(path)),
            Ok(_) => Err(StorageError::not_a_folder(folder_id, "file").into()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::not_found(folder_id).into())
            }
            Err(e) => Err(StorageError::io_at(path, e).into()),
        }
    }

    async fn list_folders(&self, limit: usize) -> Result<Vec<FolderInfo>> {
        let cwd = std::env::current_dir().map_err(StorageError::io)?;
        let mut folders: Vec<FolderInfo> = WalkDir::new(&cwd)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| Self::folder_info(entry.path()))
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        folders.truncate(limit);
        Ok(folders)
    }

    fn has_stable_ids(&self) -> bool {
        false
    }
}

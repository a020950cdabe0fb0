//! File-backed document store.
//!
//! Each document is a JSON file whose directory mirrors its path:
//! ```text
//! <DATA_DIR>/
//!   users/
//!     alice.json
//!     alice/
//!       months/
//!         2024-3.json
//!       backups/
//!         backup_<id>.json
//!   shared_progress/
//!     share_<id>.json
//! ```
//!
//! Writes go through a temp file and rename. Merge writes hold a store-wide
//! lock across their read-modify-write.

use std::io;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::storage::{
    merge_into, CollectionPath, DocPath, Document, DocumentStore, StoreError, WriteMode,
};

#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a new file store rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the full path of a document file.
    fn doc_file(&self, path: &DocPath) -> PathBuf {
        let segments = path.segments();
        let mut file = self.data_dir.clone();
        if let Some((id, parents)) = segments.split_last() {
            file.extend(parents);
            file.push(format!("{}.json", id));
        }
        file
    }

    /// Returns the directory holding a collection's documents.
    fn collection_dir(&self, collection: &CollectionPath) -> PathBuf {
        let mut dir = self.data_dir.clone();
        dir.extend(collection.segments());
        dir
    }

    async fn read_file(&self, file: PathBuf, label: String) -> Result<Option<Document>, StoreError> {
        match fs::read(&file).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Malformed(label, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(file, e)),
        }
    }

    async fn write_file(&self, file: &PathBuf, document: &Document) -> Result<(), StoreError> {
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
        }

        let bytes = serde_json::to_vec_pretty(document).map_err(StoreError::Encode)?;

        // Write atomically using temp file + rename
        let temp = file.with_extension("json.tmp");
        let result = Self::replace_via(&temp, file, &bytes).await;
        if result.is_err() {
            if let Err(e) = fs::remove_file(&temp).await {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", temp.display(), e);
                }
            }
        }
        result
    }

    async fn replace_via(temp: &PathBuf, file: &PathBuf, bytes: &[u8]) -> Result<(), StoreError> {
        let mut handle = fs::File::create(temp)
            .await
            .map_err(|e| StoreError::Io(temp.clone(), e))?;
        handle
            .write_all(bytes)
            .await
            .map_err(|e| StoreError::Io(temp.clone(), e))?;
        handle
            .sync_all()
            .await
            .map_err(|e| StoreError::Io(temp.clone(), e))?;
        drop(handle);

        fs::rename(temp, file)
            .await
            .map_err(|e| StoreError::Io(file.clone(), e))
    }
}

impl DocumentStore for FileStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.read_file(self.doc_file(path), path.to_string()).await
    }

    async fn set(
        &self,
        path: &DocPath,
        document: Document,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let file = self.doc_file(path);
        let _guard = self.write_lock.lock().await;

        let document = match mode {
            WriteMode::Overwrite => document,
            WriteMode::Merge => {
                let mut existing = self
                    .read_file(file.clone(), path.to_string())
                    .await?
                    .unwrap_or_default();
                merge_into(&mut existing, document);
                existing
            }
        };

        self.write_file(&file, &document).await?;
        tracing::debug!("Wrote {} ({:?})", path, mode);
        Ok(())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Document)>, StoreError> {
        let dir = self.collection_dir(collection);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(dir, e)),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Io(dir.clone(), e))?
        {
            let file = entry.path();
            // Subcollection directories and leftover temp files are skipped
            if file.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = file.file_stem().and_then(|stem| stem.to_str()).map(String::from) else {
                continue;
            };
            let label = format!("{}/{}", collection, id);
            if let Some(document) = self.read_file(file, label).await? {
                documents.push((id, document));
            }
        }

        documents.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(documents)
    }
}

use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::storage::{
    merge_into, CollectionPath, DocPath, Document, DocumentStore, StoreError, WriteMode,
};

/// In-memory document store. Contents live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<DocPath, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all collections.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.read().await.get(path).cloned())
    }

    async fn set(
        &self,
        path: &DocPath,
        document: Document,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        match mode {
            WriteMode::Overwrite => {
                documents.insert(path.clone(), document);
            }
            WriteMode::Merge => {
                merge_into(documents.entry(path.clone()).or_default(), document);
            }
        }
        Ok(())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Document)>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|(path, _)| path.is_child_of(collection))
            .map(|(path, document)| (path.id().to_string(), document.clone()))
            .collect())
    }
}

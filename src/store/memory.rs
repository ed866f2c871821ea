use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Collection, Document, DocumentId, DocumentStore, Filter, ID_FIELD};

/// Process-local store. Each collection keeps its documents in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> Result<DocumentId> {
        let id = DocumentId::generate();
        document.insert(ID_FIELD.to_string(), Value::from(&id));

        let mut collections = self.collections.write().await;
        collections.entry(collection).or_default().push(document);
        Ok(id)
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>> {
        filter.validate()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|documents| documents.iter().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn find_many(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
        filter.validate()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        filter.validate()?;
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|doc| !filter.matches(doc));
        Ok((before - documents.len()) as u64)
    }

    async fn upsert_one(
        &self,
        collection: Collection,
        filter: &Filter,
        mut document: Document,
    ) -> Result<DocumentId> {
        filter.validate()?;
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection).or_default();

        if let Some(existing) = documents.iter_mut().find(|doc| filter.matches(doc)) {
            let id = match existing.get(ID_FIELD) {
                Some(Value::String(raw)) => DocumentId::from(raw.as_str()),
                _ => DocumentId::generate(),
            };
            document.insert(ID_FIELD.to_string(), Value::from(&id));
            *existing = document;
            return Ok(id);
        }

        let id = DocumentId::generate();
        document.insert(ID_FIELD.to_string(), Value::from(&id));
        documents.push(document);
        Ok(id)
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        filter.validate()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|documents| documents.iter().filter(|doc| filter.matches(doc)).count())
            .unwrap_or(0) as u64)
    }
}

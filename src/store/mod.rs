use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const DATASET_NAMESPACE: &str = "rivm2016";
pub const STATE_NAMESPACE: &str = "main";
pub const ID_FIELD: &str = "_id";

/// A stored document: a JSON object whose `_id` field holds its [`DocumentId`].
pub type Document = Map<String, Value>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Collection {
    Entry,
    Indicator,
    Geography,
    Impact,
    Initialized,
}

impl Collection {
    /// The dataset collections, in the order a reset clears them.
    pub const DATASET: [Collection; 4] = [
        Self::Entry,
        Self::Indicator,
        Self::Geography,
        Self::Impact,
    ];

    pub fn namespace(self) -> &'static str {
        match self {
            Self::Initialized => STATE_NAMESPACE,
            _ => DATASET_NAMESPACE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Indicator => "indicator",
            Self::Geography => "geography",
            Self::Impact => "impact",
            Self::Initialized => "initialized",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace(), self.name())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&DocumentId> for Value {
    fn from(value: &DocumentId) -> Self {
        Value::String(value.0.clone())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conjunction of field equality clauses. An empty filter matches every document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: &DocumentId) -> Self {
        Self::all().and_eq(ID_FIELD, id)
    }

    pub fn and_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((field.to_string(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (field, _) in &self.clauses {
            validate_field_name(field)?;
        }
        Ok(())
    }
}

fn validate_field_name(field: &str) -> Result<()> {
    if field.is_empty()
        || !field
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        bail!("invalid filter field name: {field:?}");
    }
    Ok(())
}

/// Keyed collection interface consumed by the loader and the resolver.
///
/// Every operation is a suspension point; implementations must not hold
/// state that ties one call to the next.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts `document` under a freshly generated id and returns that id.
    /// Any `_id` already present on the document is replaced.
    async fn insert_one(&self, collection: Collection, document: Document) -> Result<DocumentId>;

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>>;

    /// Matching documents in insertion order.
    async fn find_many(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>>;

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64>;

    /// Replaces the body of the first document matching `filter`, keeping its
    /// id, or inserts `document` when nothing matches.
    async fn upsert_one(
        &self,
        collection: Collection,
        filter: &Filter,
        document: Document,
    ) -> Result<DocumentId>;

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64>;
}

pub type SharedStore = Arc<dyn DocumentStore>;

#[derive(Clone, Debug)]
pub enum StoreConfig {
    Sqlite { path: PathBuf },
}

pub fn open_store(config: &StoreConfig) -> Result<SharedStore> {
    match config {
        StoreConfig::Sqlite { path } => Ok(Arc::new(SqliteStore::open(path)?)),
    }
}

/// A typed document kind bound to the collection it lives in.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
}

pub trait HasId {
    fn id(&self) -> &DocumentId;
}

/// A record as read back from the store, together with its generated id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(flatten)]
    pub record: T,
}

impl<T> HasId for Stored<T> {
    fn id(&self) -> &DocumentId {
        &self.id
    }
}

pub fn to_document<T: Record>(record: &T) -> Result<Document> {
    match serde_json::to_value(record)
        .with_context(|| format!("failed to serialize {} record", T::COLLECTION))?
    {
        Value::Object(document) => Ok(document),
        other => bail!(
            "{} record serialized to a non-object value: {other}",
            T::COLLECTION
        ),
    }
}

pub fn from_document<T: Record>(document: Document) -> Result<Stored<T>> {
    serde_json::from_value(Value::Object(document))
        .with_context(|| format!("failed to decode {} document", T::COLLECTION))
}

pub async fn insert_record<T: Record>(store: &dyn DocumentStore, record: &T) -> Result<DocumentId> {
    store.insert_one(T::COLLECTION, to_document(record)?).await
}

pub async fn find_record<T: Record>(
    store: &dyn DocumentStore,
    filter: &Filter,
) -> Result<Option<Stored<T>>> {
    store
        .find_one(T::COLLECTION, filter)
        .await?
        .map(from_document)
        .transpose()
}

pub async fn find_records<T: Record>(
    store: &dyn DocumentStore,
    filter: &Filter,
) -> Result<Vec<Stored<T>>> {
    store
        .find_many(T::COLLECTION, filter)
        .await?
        .into_iter()
        .map(from_document)
        .collect()
}

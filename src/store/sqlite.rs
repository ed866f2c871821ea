use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use tracing::debug;

use super::{Collection, Document, DocumentId, DocumentStore, Filter, ID_FIELD};
use crate::util::{ensure_directory, now_utc_string};

const STORE_SCHEMA_VERSION: &str = "0.1.0";

/// Document store backed by a single SQLite table of JSON bodies.
///
/// rusqlite is blocking, so every call is shipped to the blocking pool and the
/// connection is shared behind a mutex.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }

        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;

        debug!(path = %path.display(), "opened sqlite document store");

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory sqlite database")?;
        ensure_schema(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    async fn with_connection<F, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|_| anyhow!("sqlite connection lock poisoned"))?;
            operation(&mut guard)
        })
        .await
        .context("sqlite store task failed")?
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
              namespace TEXT NOT NULL,
              collection TEXT NOT NULL,
              doc_id TEXT NOT NULL,
              body TEXT NOT NULL,
              PRIMARY KEY (namespace, collection, doc_id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_entry_ref
              ON documents(namespace, collection, json_extract(body, '$.entry_id'));
            CREATE INDEX IF NOT EXISTS idx_documents_indicator_ref
              ON documents(namespace, collection, json_extract(body, '$.indicator_id'));
            ",
        )
        .context("failed to initialize document store schema")?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('store_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [STORE_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('store_opened_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}

/// Renders `filter` as a WHERE clause scoped to `collection`.
fn where_clause(collection: Collection, filter: &Filter) -> Result<(String, Vec<SqlValue>)> {
    filter.validate()?;

    let mut sql = String::from("namespace = ? AND collection = ?");
    let mut values = vec![
        SqlValue::Text(collection.namespace().to_string()),
        SqlValue::Text(collection.name().to_string()),
    ];

    for (field, expected) in filter.clauses() {
        if field == ID_FIELD {
            let Value::String(id) = expected else {
                bail!("{ID_FIELD} filter must be a string, got {expected}");
            };
            sql.push_str(" AND doc_id = ?");
            values.push(SqlValue::Text(id.clone()));
            continue;
        }

        let column = format!("json_extract(body, '$.{field}')");
        match to_sql_value(expected) {
            Some(value) => {
                sql.push_str(&format!(" AND {column} = ?"));
                values.push(value);
            }
            None => sql.push_str(&format!(" AND {column} IS NULL")),
        }
    }

    Ok((sql, values))
}

fn to_sql_value(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => Some(match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
        }),
        Value::String(text) => Some(SqlValue::Text(text.clone())),
        other => Some(SqlValue::Text(other.to_string())),
    }
}

fn decode_body(raw: &str) -> Result<Document> {
    serde_json::from_str(raw).with_context(|| format!("failed to decode stored document: {raw}"))
}

fn encode_body(id: &DocumentId, mut document: Document) -> Result<String> {
    document.insert(ID_FIELD.to_string(), Value::from(id));
    serde_json::to_string(&document).context("failed to encode document body")
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_one(&self, collection: Collection, document: Document) -> Result<DocumentId> {
        self.with_connection(move |connection| {
            let id = DocumentId::generate();
            let body = encode_body(&id, document)?;
            connection
                .execute(
                    "INSERT INTO documents(namespace, collection, doc_id, body) VALUES(?1, ?2, ?3, ?4)",
                    params![collection.namespace(), collection.name(), id.as_str(), body],
                )
                .with_context(|| format!("failed to insert into {collection}"))?;
            Ok(id)
        })
        .await
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>> {
        let (clause, values) = where_clause(collection, filter)?;
        self.with_connection(move |connection| {
            let sql = format!("SELECT body FROM documents WHERE {clause} ORDER BY rowid LIMIT 1");
            let body = connection
                .query_row(&sql, params_from_iter(values), |row| row.get::<_, String>(0))
                .optional()
                .with_context(|| format!("failed to query {collection}"))?;
            body.as_deref().map(decode_body).transpose()
        })
        .await
    }

    async fn find_many(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
        let (clause, values) = where_clause(collection, filter)?;
        self.with_connection(move |connection| {
            let sql = format!("SELECT body FROM documents WHERE {clause} ORDER BY rowid");
            let mut statement = connection.prepare(&sql)?;
            let mut rows = statement
                .query(params_from_iter(values))
                .with_context(|| format!("failed to query {collection}"))?;

            let mut documents = Vec::new();
            while let Some(row) = rows.next()? {
                let raw: String = row.get(0)?;
                documents.push(decode_body(&raw)?);
            }
            Ok(documents)
        })
        .await
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let (clause, values) = where_clause(collection, filter)?;
        self.with_connection(move |connection| {
            let sql = format!("DELETE FROM documents WHERE {clause}");
            let removed = connection
                .execute(&sql, params_from_iter(values))
                .with_context(|| format!("failed to delete from {collection}"))?;
            Ok(removed as u64)
        })
        .await
    }

    async fn upsert_one(
        &self,
        collection: Collection,
        filter: &Filter,
        document: Document,
    ) -> Result<DocumentId> {
        let (clause, values) = where_clause(collection, filter)?;
        self.with_connection(move |connection| {
            let tx = connection.transaction()?;

            let sql = format!("SELECT doc_id FROM documents WHERE {clause} ORDER BY rowid LIMIT 1");
            let existing = tx
                .query_row(&sql, params_from_iter(values), |row| row.get::<_, String>(0))
                .optional()
                .with_context(|| format!("failed to query {collection}"))?;

            let id = match existing {
                Some(raw) => {
                    let id = DocumentId::from(raw);
                    tx.execute(
                        "UPDATE documents SET body = ?1
                         WHERE namespace = ?2 AND collection = ?3 AND doc_id = ?4",
                        params![
                            encode_body(&id, document)?,
                            collection.namespace(),
                            collection.name(),
                            id.as_str()
                        ],
                    )
                    .with_context(|| format!("failed to update {collection}"))?;
                    id
                }
                None => {
                    let id = DocumentId::generate();
                    tx.execute(
                        "INSERT INTO documents(namespace, collection, doc_id, body) VALUES(?1, ?2, ?3, ?4)",
                        params![
                            collection.namespace(),
                            collection.name(),
                            id.as_str(),
                            encode_body(&id, document)?
                        ],
                    )
                    .with_context(|| format!("failed to insert into {collection}"))?;
                    id
                }
            };

            tx.commit()?;
            Ok(id)
        })
        .await
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let (clause, values) = where_clause(collection, filter)?;
        self.with_connection(move |connection| {
            let sql = format!("SELECT COUNT(*) FROM documents WHERE {clause}");
            let count: i64 = connection
                .query_row(&sql, params_from_iter(values), |row| row.get(0))
                .with_context(|| format!("failed to count {collection}"))?;
            Ok(count as u64)
        })
        .await
    }
}

//! SQLite-backed vector index.
//!
//! Vectors are stored as little-endian `f32` blobs and scanned per
//! collection; rulebook collections are small enough that a linear scan is
//! cheaper than maintaining an ANN structure.

use crate::vector_index::{
    batch_dimensions, cosine_distance, rank_by_distance, CollectionInfo, DistanceMetric,
    IndexHit, IndexItem, VectorIndex,
};
use chrono::{DateTime, Utc};
use meeple_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    updated_at TEXT NOT NULL,
    item_count INTEGER NOT NULL,
    dimensions INTEGER
);

CREATE TABLE IF NOT EXISTS items (
    collection TEXT NOT NULL,
    position INTEGER NOT NULL,
    id TEXT NOT NULL,
    text TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (collection, position),
    FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
);
"#;

/// Persistent vector index in a single SQLite file.
#[derive(Clone)]
pub struct SqliteIndex {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIndex {
    /// Open (or create) the index database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Index(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Self::init(conn)
    }

    /// An index that lives only as long as this value.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .and_then(|_| conn.execute_batch(SCHEMA))
            .map_err(|e| AppError::Index(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run blocking database work off the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::Index("SQLite connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| AppError::Index(format!("Index task failed: {}", e)))?
    }
}

fn replace_collection(conn: &mut Connection, name: &str, items: &[IndexItem]) -> AppResult<()> {
    let dimensions = batch_dimensions(items, None)?;
    let tx = conn
        .transaction()
        .map_err(|e| AppError::Index(format!("Failed to begin transaction: {}", e)))?;

    tx.execute("DELETE FROM items WHERE collection = ?1", params![name])
        .map_err(|e| AppError::Index(format!("Failed to clear collection: {}", e)))?;

    write_collection_row(&tx, name, items.len(), dimensions)?;
    insert_items(&tx, name, 0, items)?;

    tx.commit()
        .map_err(|e| AppError::Index(format!("Failed to commit collection: {}", e)))
}

fn append_items(conn: &mut Connection, name: &str, items: &[IndexItem]) -> AppResult<()> {
    let tx = conn
        .transaction()
        .map_err(|e| AppError::Index(format!("Failed to begin transaction: {}", e)))?;

    let existing = read_info(&tx, name)?;
    let count = existing.as_ref().map(|info| info.count).unwrap_or(0);
    let dimensions = batch_dimensions(items, existing.and_then(|info| info.dimensions))?;

    write_collection_row(&tx, name, count + items.len(), dimensions)?;
    insert_items(&tx, name, count, items)?;

    tx.commit()
        .map_err(|e| AppError::Index(format!("Failed to commit collection: {}", e)))
}

fn write_collection_row(
    conn: &Connection,
    name: &str,
    count: usize,
    dimensions: Option<usize>,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO collections (name, updated_at, item_count, dimensions) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET
             updated_at = excluded.updated_at,
             item_count = excluded.item_count,
             dimensions = excluded.dimensions",
        params![
            name,
            Utc::now().to_rfc3339(),
            count as i64,
            dimensions.map(|d| d as i64)
        ],
    )
    .map_err(|e| AppError::Index(format!("Failed to write collection: {}", e)))?;
    Ok(())
}

/// Insert `items` at positions `first_position..`.
fn insert_items(
    conn: &Connection,
    name: &str,
    first_position: usize,
    items: &[IndexItem],
) -> AppResult<()> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO items (collection, position, id, text, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| AppError::Index(format!("Failed to prepare insert: {}", e)))?;

    for (offset, item) in items.iter().enumerate() {
        let metadata = serde_json::to_string(&item.metadata)?;
        stmt.execute(params![
            name,
            (first_position + offset) as i64,
            item.id,
            item.text,
            metadata,
            embedding_to_bytes(&item.vector),
        ])
        .map_err(|e| AppError::Index(format!("Failed to insert item {}: {}", item.id, e)))?;
    }
    Ok(())
}

fn read_info(conn: &Connection, name: &str) -> AppResult<Option<CollectionInfo>> {
    let row = conn
        .query_row(
            "SELECT updated_at, item_count, dimensions FROM collections WHERE name = ?1",
            params![name],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )
        .optional()
        .map_err(|e| AppError::Index(format!("Failed to read collection: {}", e)))?;

    row.map(|(updated_at, count, dimensions)| {
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| AppError::Index(format!("Corrupt timestamp for {}: {}", name, e)))?
            .with_timezone(&Utc);
        Ok(CollectionInfo {
            name: name.to_string(),
            count: count as usize,
            dimensions: dimensions.map(|d| d as usize),
            updated_at,
        })
    })
    .transpose()
}

fn scan_collection(
    conn: &Connection,
    name: &str,
    query: &[f32],
    k: usize,
) -> AppResult<Vec<IndexHit>> {
    if read_info(conn, name)?.is_none() {
        return Err(AppError::CollectionNotFound(name.to_string()));
    }

    let mut stmt = conn
        .prepare(
            "SELECT position, id, text, metadata, embedding FROM items
             WHERE collection = ?1 ORDER BY position",
        )
        .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map(params![name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Vec<u8>>(4)?,
            ))
        })
        .map_err(|e| AppError::Index(format!("Failed to query items: {}", e)))?;

    let mut scored = Vec::new();
    for row in rows {
        let (position, id, text, metadata, blob) =
            row.map_err(|e| AppError::Index(format!("Failed to read item: {}", e)))?;
        let vector = bytes_to_embedding(&blob)?;
        let distance = cosine_distance(query, &vector)?;
        let hit = IndexHit {
            id,
            text,
            metadata: serde_json::from_str(&metadata)?,
            distance,
        };
        scored.push((position as usize, distance, hit));
    }

    Ok(rank_by_distance(scored, k)
        .into_iter()
        .map(|(_, hit)| hit)
        .collect())
}

#[async_trait::async_trait]
impl VectorIndex for SqliteIndex {
    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Cosine
    }

    async fn upsert_collection(&self, name: &str, items: Vec<IndexItem>) -> AppResult<()> {
        let name = name.to_string();
        let count = items.len();
        self.with_conn(move |conn| replace_collection(conn, &name, &items))
            .await?;
        tracing::debug!(items = count, "Replaced collection");
        Ok(())
    }

    async fn append_to_collection(&self, name: &str, items: Vec<IndexItem>) -> AppResult<()> {
        let name = name.to_string();
        let count = items.len();
        self.with_conn(move |conn| append_items(conn, &name, &items))
            .await?;
        tracing::debug!(items = count, "Appended to collection");
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], k: usize) -> AppResult<Vec<IndexHit>> {
        let name = name.to_string();
        let vector = vector.to_vec();
        self.with_conn(move |conn| scan_collection(conn, &name, &vector, k))
            .await
    }

    async fn collection_exists(&self, name: &str) -> AppResult<bool> {
        Ok(self.collection_info(name).await?.is_some())
    }

    async fn list_collections(&self) -> AppResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT name FROM collections ORDER BY name")
                .map_err(|e| AppError::Index(format!("Failed to list collections: {}", e)))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                .map_err(|e| AppError::Index(format!("Failed to list collections: {}", e)))?;
            Ok(names)
        })
        .await
    }

    async fn collection_info(&self, name: &str) -> AppResult<Option<CollectionInfo>> {
        let name = name.to_string();
        self.with_conn(move |conn| read_info(conn, &name)).await
    }
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index("Invalid embedding bytes length".to_string()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

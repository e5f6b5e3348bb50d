//! Persisted vector collections backed by SQLite.
//!
//! A collection is addressed by (persist directory, collection name) and
//! lives in `{persist_dir}/index.sqlite`. Chunk embeddings are stored as
//! little-endian f32 BLOBs; similarity queries load the collection's
//! vectors and score cosine similarity in Rust, returning the top `k`
//! chunks in descending relevance order.
//!
//! Upserts replace by chunk id, so re-ingesting a document is idempotent.
//! Concurrent upserts to the same id are last-writer-wins; no locking is
//! provided here.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::{Error, Result};
use crate::models::{Chunk, ChunkMeta};

const DB_FILE: &str = "index.sqlite";

/// The similarity-index collaborator.
///
/// Implementations must preserve insertion identity (replace-by-id) and
/// return query results ordered by descending relevance. Injected as a
/// handle so tests can substitute deterministic doubles.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert-or-replace chunks with their embedding vectors.
    /// `chunks` and `vectors` correspond by position.
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return up to `k` chunks ordered by descending similarity to
    /// `vector`. Fewer than `k` stored chunks yields all of them.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Chunk>>;
}

/// One named collection in a SQLite index database.
#[derive(Debug)]
pub struct SqliteIndex {
    pool: SqlitePool,
    collection_id: i64,
}

impl SqliteIndex {
    /// Open or create the collection, creating the database and schema as
    /// needed. Safe to call repeatedly.
    pub async fn create(persist_dir: &Path, collection: &str) -> Result<Self> {
        std::fs::create_dir_all(persist_dir).map_err(|e| Error::Backend(e.into()))?;
        let pool = connect(&persist_dir.join(DB_FILE), true).await?;
        migrate(&pool).await?;

        sqlx::query("INSERT OR IGNORE INTO collections (name) VALUES (?)")
            .bind(collection)
            .execute(&pool)
            .await?;
        let collection_id: i64 = sqlx::query_scalar("SELECT id FROM collections WHERE name = ?")
            .bind(collection)
            .fetch_one(&pool)
            .await?;

        Ok(Self {
            pool,
            collection_id,
        })
    }

    /// Open an existing collection. Fails with [`Error::NotFound`] when
    /// the database file or the collection does not exist.
    pub async fn open(persist_dir: &Path, collection: &str) -> Result<Self> {
        let not_found = || Error::NotFound {
            collection: collection.to_string(),
            persist_dir: persist_dir.to_path_buf(),
        };

        let db_path = persist_dir.join(DB_FILE);
        if !db_path.exists() {
            return Err(not_found());
        }

        let pool = connect(&db_path, false).await?;
        migrate(&pool).await?;

        let collection_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_optional(&pool)
                .await?;

        match collection_id {
            Some(collection_id) => Ok(Self {
                pool,
                collection_id,
            }),
            None => Err(not_found()),
        }
    }

    /// Number of chunks stored in this collection.
    pub async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection_id = ?")
            .bind(self.collection_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteIndex {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(Error::Backend(anyhow!(
                "upsert got {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO chunks
                    (collection_id, id, paper_id, title, section, section_index, chunk_index, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(self.collection_id)
            .bind(&chunk.id)
            .bind(&chunk.meta.paper_id)
            .bind(&chunk.meta.title)
            .bind(&chunk.meta.section)
            .bind(chunk.meta.section_index as i64)
            .bind(chunk.meta.chunk_index as i64)
            .bind(&chunk.text)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, paper_id, title, section, section_index, chunk_index, text, embedding
            FROM chunks WHERE collection_id = ?
            "#,
        )
        .bind(self.collection_id)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f32, Chunk)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                let score = cosine_similarity(vector, &stored);
                let chunk = Chunk {
                    id: row.get("id"),
                    text: row.get("text"),
                    meta: ChunkMeta {
                        paper_id: row.get("paper_id"),
                        title: row.get("title"),
                        section: row.get("section"),
                        section_index: row.get::<i64, _>("section_index") as usize,
                        chunk_index: row.get::<i64, _>("chunk_index") as usize,
                    },
                };
                (score, chunk)
            })
            .collect();

        // Descending score; ties break on id so results are deterministic.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }
}

async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(Error::from)?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            collection_id INTEGER NOT NULL REFERENCES collections(id),
            id TEXT NOT NULL,
            paper_id TEXT NOT NULL,
            title TEXT NOT NULL,
            section TEXT,
            section_index INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched
/// vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

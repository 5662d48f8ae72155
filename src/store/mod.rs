//! Persistent record store backed by SQLite.
//!
//! Each collection is persisted as a single JSON array blob keyed by name.
//! At runtime the storage worker's in-memory mirror is authoritative; this
//! store only sees debounced flushes and startup/reload reads.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::RevisionInfo;

/// A raw record as stored: a JSON object with no schema enforced at write time.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Bumped when the persisted layout changes.
pub const SCHEMA_VERSION: i32 = 1;

/// The four named collections of the datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Staff,
    Themes,
    Evaluations,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Staff,
        Collection::Themes,
        Collection::Evaluations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Staff => "staff",
            Collection::Themes => "themes",
            Collection::Evaluations => "evaluations",
        }
    }

    /// Parse a collection name from the wire. Unknown names yield `None`;
    /// callers decide whether that means "empty" (reads) or an error (writes).
    pub fn parse(name: &str) -> Option<Collection> {
        match name {
            "users" => Some(Collection::Users),
            "staff" => Some(Collection::Staff),
            "themes" => Some(Collection::Themes),
            "evaluations" => Some(Collection::Evaluations),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full in-memory image of all four collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mirror {
    #[serde(default)]
    pub users: Vec<Record>,
    #[serde(default)]
    pub staff: Vec<Record>,
    #[serde(default)]
    pub themes: Vec<Record>,
    #[serde(default)]
    pub evaluations: Vec<Record>,
}

impl Mirror {
    pub fn collection(&self, collection: Collection) -> &Vec<Record> {
        match collection {
            Collection::Users => &self.users,
            Collection::Staff => &self.staff,
            Collection::Themes => &self.themes,
            Collection::Evaluations => &self.evaluations,
        }
    }

    pub fn collection_mut(&mut self, collection: Collection) -> &mut Vec<Record> {
        match collection {
            Collection::Users => &mut self.users,
            Collection::Staff => &mut self.staff,
            Collection::Themes => &mut self.themes,
            Collection::Evaluations => &mut self.evaluations,
        }
    }
}

/// Initialize the database connection pool and run migrations.
pub async fn init_store(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Handle for reading and flushing collection blobs.
#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load one collection. An absent row is an empty collection.
    pub async fn load_collection(&self, collection: Collection) -> Result<Vec<Record>, AppError> {
        let row = sqlx::query("SELECT data FROM collections WHERE name = ?")
            .bind(collection.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("data");
                Ok(records_from_json(collection, &raw))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Load all four collections.
    pub async fn load_all(&self) -> Result<Mirror, AppError> {
        let mut mirror = Mirror::default();
        for collection in Collection::ALL {
            *mirror.collection_mut(collection) = self.load_collection(collection).await?;
        }
        Ok(mirror)
    }

    /// Persist one collection and raise the stored revision to at least
    /// `revision`. The max() keeps late flush completions from regressing it.
    pub async fn save_collection(
        &self,
        collection: Collection,
        records: &[Record],
        revision: i64,
    ) -> Result<(), AppError> {
        let data = serde_json::to_string(records)?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO collections (name, data, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(name) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at"#,
        )
        .bind(collection.as_str())
        .bind(&data)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE meta SET revision_id = max(revision_id, ?), generated_at = ? WHERE id = 1")
            .bind(revision)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Get the persisted revision ID.
    pub async fn load_revision(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }
}

/// Decode a persisted blob leniently: unparseable blobs and non-object
/// entries degrade to warnings, never to load failures.
fn records_from_json(collection: Collection, raw: &str) -> Vec<Record> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("Collection {} blob is not a JSON array, treating as empty: {}", collection, e);
            return Vec::new();
        }
    };

    let total = values.len();
    let records: Vec<Record> = values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();

    if records.len() < total {
        tracing::warn!(
            "Dropped {} non-object entries while loading collection {}",
            total - records.len(),
            collection
        );
    }

    records
}

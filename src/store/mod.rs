//! SQLite persistence for completed exchanges.
//!
//! Every operation borrows a connection from the pool for its own duration
//! only; the connection goes back to the pool when the operation finishes,
//! whether it succeeded or not. SQLite itself serialises concurrent writers.

pub mod schema;

use crate::Error;
use schema::{COUNT_RECORDS_SQL, INSERT_RECORD_SQL, MIGRATION_STATEMENTS_SQL, SELECT_RECENT_SQL};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

/// One persisted exchange. Rows are written once and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AnalysisRecord {
    pub id: i64,
    pub text_content: String,
    pub ai_reply: String,
    pub sentiment: String,
    pub word_count: i64,
}

/// A record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub text_content: String,
    pub ai_reply: String,
    pub sentiment: String,
    pub word_count: i64,
}

impl NewRecord {
    fn into_record(self, id: i64) -> AnalysisRecord {
        AnalysisRecord {
            id,
            text_content: self.text_content,
            ai_reply: self.ai_reply,
            sentiment: self.sentiment,
            word_count: self.word_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Open the database file, creating it and the table when absent.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// A private in-memory database. A single connection is kept alive for
    /// the pool's lifetime, since each SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, Error> {
        for statement in MIGRATION_STATEMENTS_SQL {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Insert a record and return it with its assigned id.
    pub async fn insert(&self, record: NewRecord) -> Result<AnalysisRecord, Error> {
        let result = sqlx::query(INSERT_RECORD_SQL)
            .bind(&record.text_content)
            .bind(&record.ai_reply)
            .bind(&record.sentiment)
            .bind(record.word_count)
            .execute(&self.pool)
            .await?;

        Ok(record.into_record(result.last_insert_rowid()))
    }

    /// The newest `limit` records, highest id first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AnalysisRecord>, Error> {
        let records = sqlx::query_as::<_, AnalysisRecord>(SELECT_RECENT_SQL)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar(COUNT_RECORDS_SQL)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

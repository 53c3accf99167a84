//! Review queue repository.
//!
//! Claim, complete, and skip are single conditional UPDATEs: the WHERE
//! clause carries the expected state, so the store itself resolves races
//! between reviewers. Losing a race is reported as a typed conflict, not a
//! silent overwrite.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::debug;

use super::{parse_datetime, parse_datetime_opt, RepositoryError};
use crate::models::{ReviewQueueItem, ReviewStatus};

/// Errors from review queue operations.
#[derive(Debug, Error)]
pub enum ReviewQueueError {
    #[error("item already claimed by {claimed_by}")]
    AlreadyClaimed { claimed_by: String },

    #[error("caller does not hold the claim (held by {holder:?})")]
    NotClaimOwner { holder: Option<String> },

    #[error("invalid state transition: item is {status}")]
    InvalidState { status: String },

    #[error("queue item not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] RepositoryError),
}

impl From<rusqlite::Error> for ReviewQueueError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(RepositoryError::Sqlite(e))
    }
}

pub type ReviewResult<T> = std::result::Result<T, ReviewQueueError>;

/// SQLite-backed review queue repository.
pub struct ReviewQueueRepository {
    db_path: PathBuf,
}

fn row_to_item(row: &Row) -> rusqlite::Result<ReviewQueueItem> {
    Ok(ReviewQueueItem {
        id: row.get("id")?,
        tenant_id: row.get("tenant_id")?,
        document_id: row.get("document_id")?,
        extraction_id: row.get("extraction_id")?,
        priority: row.get("priority")?,
        status: ReviewStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(ReviewStatus::Pending),
        claimed_by: row.get("claimed_by")?,
        claimed_at: parse_datetime_opt(row.get("claimed_at")?),
        completed_at: parse_datetime_opt(row.get("completed_at")?),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    })
}

impl ReviewQueueRepository {
    /// Create a new review queue repository.
    pub fn new(db_path: &Path) -> ReviewResult<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> ReviewResult<Connection> {
        super::connect(&self.db_path).map_err(Into::into)
    }

    fn init_schema(&self) -> ReviewResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS review_queue (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                extraction_id TEXT NOT NULL UNIQUE,
                priority INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                claimed_by TEXT,
                claimed_at TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_review_tenant_status
                ON review_queue(tenant_id, status, priority DESC, created_at ASC);
            CREATE INDEX IF NOT EXISTS idx_review_claimed_at
                ON review_queue(claimed_at) WHERE status = 'claimed';
        "#,
        )?;
        Ok(())
    }

    /// Create or refresh the queue item for an extraction.
    ///
    /// Inserts a pending item, or updates priority on an existing active
    /// one. Completed and skipped items are never resurrected.
    pub fn enqueue(
        &self,
        tenant_id: &str,
        document_id: &str,
        extraction_id: &str,
        priority: i64,
    ) -> ReviewResult<ReviewQueueItem> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO review_queue
                (id, tenant_id, document_id, extraction_id, priority, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)
            ON CONFLICT(extraction_id) DO UPDATE SET priority = excluded.priority
                WHERE review_queue.status IN ('pending', 'claimed')
            "#,
            params![
                uuid::Uuid::new_v4().to_string(),
                tenant_id,
                document_id,
                extraction_id,
                priority,
                Utc::now().to_rfc3339(),
            ],
        )?;
        self.find_by_extraction(tenant_id, extraction_id)?
            .ok_or_else(|| ReviewQueueError::NotFound(format!("extraction {extraction_id}")))
    }

    /// Pending items ordered by priority desc, then creation time asc.
    pub fn list_pending(&self, tenant_id: &str) -> ReviewResult<Vec<ReviewQueueItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM review_queue
             WHERE tenant_id = ?1 AND status = 'pending'
             ORDER BY priority DESC, created_at ASC",
        )?;
        let items = stmt
            .query_map(params![tenant_id], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Claim a pending item for a reviewer.
    ///
    /// The transition is a single conditional UPDATE on `status = 'pending'`;
    /// of two concurrent claims exactly one sees a row change.
    pub fn claim(
        &self,
        tenant_id: &str,
        item_id: &str,
        user: &str,
    ) -> ReviewResult<ReviewQueueItem> {
        let conn = self.connect()?;
        let updated = conn.execute(
            r#"
            UPDATE review_queue
            SET status = 'claimed', claimed_by = ?1, claimed_at = ?2
            WHERE tenant_id = ?3 AND id = ?4 AND status = 'pending'
            "#,
            params![user, Utc::now().to_rfc3339(), tenant_id, item_id],
        )?;

        if updated == 1 {
            return self.get(tenant_id, item_id);
        }
        match self.get(tenant_id, item_id) {
            Ok(item) => match item.status {
                ReviewStatus::Claimed => Err(ReviewQueueError::AlreadyClaimed {
                    claimed_by: item.claimed_by.unwrap_or_default(),
                }),
                status => Err(ReviewQueueError::InvalidState {
                    status: status.as_str().to_string(),
                }),
            },
            Err(e) => Err(e),
        }
    }

    /// Complete a claimed item. Only the claim holder may complete.
    pub fn complete(
        &self,
        tenant_id: &str,
        item_id: &str,
        user: &str,
    ) -> ReviewResult<ReviewQueueItem> {
        let conn = self.connect()?;
        let updated = conn.execute(
            r#"
            UPDATE review_queue
            SET status = 'completed', completed_at = ?1
            WHERE tenant_id = ?2 AND id = ?3 AND status = 'claimed' AND claimed_by = ?4
            "#,
            params![Utc::now().to_rfc3339(), tenant_id, item_id, user],
        )?;

        if updated == 1 {
            return self.get(tenant_id, item_id);
        }
        self.conflict_for(tenant_id, item_id, user)
    }

    /// Skip an item: pending items may be skipped directly, claimed items
    /// only by the claim holder.
    pub fn skip(
        &self,
        tenant_id: &str,
        item_id: &str,
        user: &str,
    ) -> ReviewResult<ReviewQueueItem> {
        let conn = self.connect()?;
        let updated = conn.execute(
            r#"
            UPDATE review_queue
            SET status = 'skipped', completed_at = ?1
            WHERE tenant_id = ?2 AND id = ?3
              AND (status = 'pending' OR (status = 'claimed' AND claimed_by = ?4))
            "#,
            params![Utc::now().to_rfc3339(), tenant_id, item_id, user],
        )?;

        if updated == 1 {
            return self.get(tenant_id, item_id);
        }
        self.conflict_for(tenant_id, item_id, user)
    }

    /// Explain why a conditional complete/skip changed no rows.
    fn conflict_for(
        &self,
        tenant_id: &str,
        item_id: &str,
        user: &str,
    ) -> ReviewResult<ReviewQueueItem> {
        let item = self.get(tenant_id, item_id)?;
        match item.status {
            ReviewStatus::Claimed if item.claimed_by.as_deref() != Some(user) => {
                Err(ReviewQueueError::NotClaimOwner {
                    holder: item.claimed_by,
                })
            }
            status => Err(ReviewQueueError::InvalidState {
                status: status.as_str().to_string(),
            }),
        }
    }

    /// Return claims older than `older_than` to pending.
    ///
    /// Idempotent conditional UPDATE, safe to run concurrently from any
    /// number of callers. Returns the number of released claims.
    pub fn release_stale(&self, tenant_id: &str, older_than: Duration) -> ReviewResult<usize> {
        let cutoff = (Utc::now() - older_than).to_rfc3339();
        let conn = self.connect()?;
        let released = conn.execute(
            r#"
            UPDATE review_queue
            SET status = 'pending', claimed_by = NULL, claimed_at = NULL
            WHERE tenant_id = ?1 AND status = 'claimed' AND claimed_at < ?2
            "#,
            params![tenant_id, cutoff],
        )?;
        if released > 0 {
            debug!(tenant_id, released, "released stale review claims");
        }
        Ok(released)
    }

    /// Fetch an item by id within a tenant.
    pub fn get(&self, tenant_id: &str, item_id: &str) -> ReviewResult<ReviewQueueItem> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT * FROM review_queue WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, item_id],
            row_to_item,
        )
        .optional()?
        .ok_or_else(|| ReviewQueueError::NotFound(item_id.to_string()))
    }

    /// The queue item for an extraction, if one exists.
    pub fn find_by_extraction(
        &self,
        tenant_id: &str,
        extraction_id: &str,
    ) -> ReviewResult<Option<ReviewQueueItem>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT * FROM review_queue WHERE tenant_id = ?1 AND extraction_id = ?2",
            params![tenant_id, extraction_id],
            row_to_item,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Count items per status for a tenant.
    pub fn status_counts(&self, tenant_id: &str) -> ReviewResult<Vec<(ReviewStatus, u64)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM review_queue WHERE tenant_id = ?1 GROUP BY status",
        )?;
        let counts = stmt
            .query_map(params![tenant_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts
            .into_iter()
            .filter_map(|(s, n)| ReviewStatus::from_str(&s).map(|s| (s, n)))
            .collect())
    }
}

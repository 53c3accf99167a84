//! Document repository.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{parse_datetime, RepositoryError, Result};
use crate::models::{Document, DocumentStatus, SourceType};

/// SQLite-backed document repository.
pub struct DocumentRepository {
    db_path: PathBuf,
}

fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get("id")?,
        tenant_id: row.get("tenant_id")?,
        content_hash: row.get("content_hash")?,
        file_name: row.get("file_name")?,
        mime_type: row.get("mime_type")?,
        size_bytes: row.get::<_, i64>("size_bytes")? as u64,
        source_type: SourceType::from_str(&row.get::<_, String>("source_type")?)
            .unwrap_or(SourceType::Upload),
        status: DocumentStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(DocumentStatus::Failed),
        error: row.get("error")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
    })
}

impl DocumentRepository {
    /// Create a new document repository.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                file_name TEXT,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                source_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(tenant_id, content_hash)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_tenant
                ON documents(tenant_id);
            CREATE INDEX IF NOT EXISTS idx_documents_tenant_status
                ON documents(tenant_id, status);
        "#,
        )?;
        Ok(())
    }

    /// Insert a document, deduplicating on (tenant, content hash).
    ///
    /// Returns the stored record: the new row, or the existing one when
    /// identical content was ingested before.
    pub fn insert(&self, document: &Document) -> Result<Document> {
        let conn = self.connect()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO documents
                (id, tenant_id, content_hash, file_name, mime_type, size_bytes,
                 source_type, status, error, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(tenant_id, content_hash) DO NOTHING
            "#,
            params![
                document.id,
                document.tenant_id,
                document.content_hash,
                document.file_name,
                document.mime_type,
                document.size_bytes as i64,
                document.source_type.as_str(),
                document.status.as_str(),
                document.error,
                document.created_at.to_rfc3339(),
                document.updated_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            debug!(
                tenant_id = %document.tenant_id,
                content_hash = %document.content_hash,
                "duplicate content, returning existing document"
            );
        }

        conn.query_row(
            "SELECT * FROM documents WHERE tenant_id = ?1 AND content_hash = ?2",
            params![document.tenant_id, document.content_hash],
            row_to_document,
        )
        .map_err(Into::into)
    }

    /// Fetch a document by id within a tenant.
    pub fn get(&self, tenant_id: &str, document_id: &str) -> Result<Document> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT * FROM documents WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, document_id],
            row_to_document,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(format!("document {document_id}")))
    }

    /// Update status and error detail.
    pub fn set_status(
        &self,
        tenant_id: &str,
        document_id: &str,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE documents SET status = ?1, error = ?2, updated_at = ?3
             WHERE tenant_id = ?4 AND id = ?5",
            params![
                status.as_str(),
                error,
                Utc::now().to_rfc3339(),
                tenant_id,
                document_id
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!("document {document_id}")));
        }
        Ok(())
    }

    /// Count documents per status for a tenant.
    pub fn status_counts(&self, tenant_id: &str) -> Result<Vec<(DocumentStatus, u64)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM documents WHERE tenant_id = ?1 GROUP BY status",
        )?;
        let counts = stmt
            .query_map(params![tenant_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts
            .into_iter()
            .filter_map(|(s, n)| DocumentStatus::from_str(&s).map(|s| (s, n)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;

    fn temp_repo() -> (tempfile::TempDir, DocumentRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = DocumentRepository::new(&dir.path().join("test.db")).unwrap();
        (dir, repo)
    }

    fn sample_doc(tenant: &str, content: &[u8]) -> Document {
        Document::new(
            tenant,
            content,
            Some("lease.pdf".to_string()),
            "application/pdf".to_string(),
            SourceType::Upload,
        )
    }

    #[test]
    fn test_insert_and_get() {
        let (_dir, repo) = temp_repo();
        let doc = sample_doc("t1", b"content");
        let stored = repo.insert(&doc).unwrap();
        assert_eq!(stored.id, doc.id);

        let fetched = repo.get("t1", &doc.id).unwrap();
        assert_eq!(fetched.content_hash, doc.content_hash);
        assert_eq!(fetched.status, DocumentStatus::Pending);
    }

    #[test]
    fn test_duplicate_content_dedups() {
        let (_dir, repo) = temp_repo();
        let first = repo.insert(&sample_doc("t1", b"same bytes")).unwrap();
        let second = repo.insert(&sample_doc("t1", b"same bytes")).unwrap();
        assert_eq!(first.id, second.id);

        // A different tenant gets its own row for the same content
        let other = repo.insert(&sample_doc("t2", b"same bytes")).unwrap();
        assert_ne!(other.id, first.id);
    }

    #[test]
    fn test_tenant_isolation_on_get() {
        let (_dir, repo) = temp_repo();
        let doc = repo.insert(&sample_doc("t1", b"content")).unwrap();
        assert!(repo.get("t2", &doc.id).is_err());
    }

    #[test]
    fn test_set_status() {
        let (_dir, repo) = temp_repo();
        let doc = repo.insert(&sample_doc("t1", b"content")).unwrap();
        repo.set_status("t1", &doc.id, DocumentStatus::Failed, Some("boom"))
            .unwrap();
        let fetched = repo.get("t1", &doc.id).unwrap();
        assert_eq!(fetched.status, DocumentStatus::Failed);
        assert_eq!(fetched.error.as_deref(), Some("boom"));
    }
}

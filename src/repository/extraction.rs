//! Extraction repository: versioned parse results.
//!
//! Version assignment and the current-flag flip happen inside one
//! `BEGIN IMMEDIATE` transaction, which is the serialization point for
//! concurrent orchestrators working on the same document. A partial unique
//! index enforces the single-current invariant at the store level.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_datetime, parse_datetime_opt, RepositoryError, Result};
use crate::models::{
    BoundingBox, DocType, Extraction, ExtractionField, ExtractionStatus, ExtractionTable,
    FieldSource, FieldValue,
};

/// SQLite-backed extraction repository.
pub struct ExtractionRepository {
    db_path: PathBuf,
}

fn row_to_extraction(row: &Row) -> rusqlite::Result<Extraction> {
    Ok(Extraction {
        id: row.get("id")?,
        tenant_id: row.get("tenant_id")?,
        document_id: row.get("document_id")?,
        version: row.get("version")?,
        status: ExtractionStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(ExtractionStatus::Failed),
        overall_confidence: row.get("overall_confidence")?,
        doc_type: DocType::from_str(&row.get::<_, String>("doc_type")?).unwrap_or(DocType::Unknown),
        parser_used: row.get("parser_used")?,
        is_current: row.get::<_, i64>("is_current")? != 0,
        error: row.get("error")?,
        started_at: parse_datetime(&row.get::<_, String>("started_at")?),
        finished_at: parse_datetime_opt(row.get("finished_at")?),
    })
}

fn row_to_field(row: &Row) -> Result<ExtractionField> {
    let value: FieldValue = serde_json::from_str(&row.get::<_, String>("value")?)?;
    let override_value = row
        .get::<_, Option<String>>("override_value")?
        .map(|v| serde_json::from_str(&v))
        .transpose()?;
    let bbox: Option<BoundingBox> = row
        .get::<_, Option<String>>("bbox")?
        .map(|v| serde_json::from_str(&v))
        .transpose()?;
    Ok(ExtractionField {
        id: row.get("id")?,
        extraction_id: row.get("extraction_id")?,
        name: row.get("name")?,
        value,
        raw_text: row.get("raw_text")?,
        confidence: row.get("confidence")?,
        source: FieldSource::from_str(&row.get::<_, String>("source")?)
            .unwrap_or(FieldSource::Parser),
        page: row.get::<_, Option<i64>>("page")?.map(|p| p as u32),
        bbox,
        is_override: row.get::<_, i64>("is_override")? != 0,
        override_value,
        overridden_by: row.get("overridden_by")?,
        overridden_at: parse_datetime_opt(row.get("overridden_at")?),
    })
}

impl ExtractionRepository {
    /// Create a new extraction repository.
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
            CREATE TABLE IF NOT EXISTS extractions (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'processing',
                overall_confidence REAL,
                doc_type TEXT NOT NULL DEFAULT 'unknown',
                parser_used TEXT,
                is_current INTEGER NOT NULL DEFAULT 1,
                error TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                UNIQUE(document_id, version)
            );

            -- Store-level enforcement of the single-current invariant
            CREATE UNIQUE INDEX IF NOT EXISTS idx_extractions_current
                ON extractions(document_id) WHERE is_current = 1;
            CREATE INDEX IF NOT EXISTS idx_extractions_tenant_document
                ON extractions(tenant_id, document_id);

            CREATE TABLE IF NOT EXISTS extraction_fields (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                extraction_id TEXT NOT NULL,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                raw_text TEXT,
                confidence REAL NOT NULL,
                source TEXT NOT NULL,
                page INTEGER,
                bbox TEXT,
                is_override INTEGER NOT NULL DEFAULT 0,
                override_value TEXT,
                overridden_by TEXT,
                overridden_at TEXT,
                FOREIGN KEY (extraction_id) REFERENCES extractions(id)
            );
            CREATE INDEX IF NOT EXISTS idx_fields_extraction
                ON extraction_fields(extraction_id);

            CREATE TABLE IF NOT EXISTS extraction_tables (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                extraction_id TEXT NOT NULL,
                title TEXT,
                headers TEXT NOT NULL,
                rows TEXT NOT NULL,
                page INTEGER,
                FOREIGN KEY (extraction_id) REFERENCES extractions(id)
            );
            CREATE INDEX IF NOT EXISTS idx_tables_extraction
                ON extraction_tables(extraction_id);
        "#,
        )?;
        Ok(())
    }

    /// Open a new extraction version for a document.
    ///
    /// Atomically assigns `version = max(existing) + 1` and moves the
    /// current flag from the prior version to the new row, which starts in
    /// `processing`.
    pub fn begin_version(&self, tenant_id: &str, document_id: &str) -> Result<Extraction> {
        let conn = self.connect()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<Extraction> = (|| {
            let version: i64 = conn.query_row(
                "SELECT COALESCE(MAX(version), 0) + 1 FROM extractions WHERE document_id = ?1",
                params![document_id],
                |row| row.get(0),
            )?;

            conn.execute(
                "UPDATE extractions SET is_current = 0 WHERE document_id = ?1 AND is_current = 1",
                params![document_id],
            )?;

            let extraction = Extraction {
                id: uuid::Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                document_id: document_id.to_string(),
                version,
                status: ExtractionStatus::Processing,
                overall_confidence: None,
                doc_type: DocType::Unknown,
                parser_used: None,
                is_current: true,
                error: None,
                started_at: Utc::now(),
                finished_at: None,
            };

            conn.execute(
                r#"
                INSERT INTO extractions
                    (id, tenant_id, document_id, version, status, overall_confidence,
                     doc_type, parser_used, is_current, error, started_at, finished_at)
                VALUES (?1, ?2, ?3, ?4, 'processing', NULL, 'unknown', NULL, 1, NULL, ?5, NULL)
                "#,
                params![
                    extraction.id,
                    extraction.tenant_id,
                    extraction.document_id,
                    extraction.version,
                    extraction.started_at.to_rfc3339(),
                ],
            )?;

            Ok(extraction)
        })();

        if result.is_ok() {
            conn.execute("COMMIT", [])?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }

        result
    }

    /// Finalize a processing extraction as completed.
    ///
    /// Conditional on `status = 'processing'`: terminal rows are never
    /// re-entered.
    pub fn finalize_completed(
        &self,
        tenant_id: &str,
        extraction_id: &str,
        overall_confidence: f64,
        doc_type: DocType,
        parser_used: &str,
    ) -> Result<Extraction> {
        let conn = self.connect()?;
        let updated = conn.execute(
            r#"
            UPDATE extractions
            SET status = 'completed', overall_confidence = ?1, doc_type = ?2,
                parser_used = ?3, finished_at = ?4
            WHERE tenant_id = ?5 AND id = ?6 AND status = 'processing'
            "#,
            params![
                overall_confidence,
                doc_type.as_str(),
                parser_used,
                Utc::now().to_rfc3339(),
                tenant_id,
                extraction_id,
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::InvalidState(format!(
                "extraction {extraction_id} is not in processing"
            )));
        }
        self.get(tenant_id, extraction_id)
    }

    /// Finalize a processing extraction as failed.
    pub fn finalize_failed(
        &self,
        tenant_id: &str,
        extraction_id: &str,
        error: &str,
    ) -> Result<Extraction> {
        let conn = self.connect()?;
        let updated = conn.execute(
            r#"
            UPDATE extractions
            SET status = 'failed', error = ?1, finished_at = ?2
            WHERE tenant_id = ?3 AND id = ?4 AND status = 'processing'
            "#,
            params![
                error,
                Utc::now().to_rfc3339(),
                tenant_id,
                extraction_id,
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::InvalidState(format!(
                "extraction {extraction_id} is not in processing"
            )));
        }
        self.get(tenant_id, extraction_id)
    }

    /// Fetch an extraction by id within a tenant.
    pub fn get(&self, tenant_id: &str, extraction_id: &str) -> Result<Extraction> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT * FROM extractions WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, extraction_id],
            row_to_extraction,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound(format!("extraction {extraction_id}")))
    }

    /// The current extraction for a document, if any.
    pub fn get_current(&self, tenant_id: &str, document_id: &str) -> Result<Option<Extraction>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT * FROM extractions
             WHERE tenant_id = ?1 AND document_id = ?2 AND is_current = 1",
            params![tenant_id, document_id],
            row_to_extraction,
        )
        .optional()
        .map_err(Into::into)
    }

    /// All versions for a document, newest first.
    pub fn list_versions(&self, tenant_id: &str, document_id: &str) -> Result<Vec<Extraction>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM extractions
             WHERE tenant_id = ?1 AND document_id = ?2
             ORDER BY version DESC",
        )?;
        let extractions = stmt
            .query_map(params![tenant_id, document_id], row_to_extraction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(extractions)
    }

    /// Persist fields for an extraction in one transaction.
    pub fn insert_fields(&self, fields: &[ExtractionField]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        for field in fields {
            tx.execute(
                r#"
                INSERT INTO extraction_fields
                    (extraction_id, name, value, raw_text, confidence, source, page, bbox)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    field.extraction_id,
                    field.name,
                    serde_json::to_string(&field.value)?,
                    field.raw_text,
                    field.confidence,
                    field.source.as_str(),
                    field.page.map(|p| p as i64),
                    field
                        .bbox
                        .map(|b| serde_json::to_string(&b))
                        .transpose()?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Persist tables for an extraction in one transaction.
    pub fn insert_tables(&self, tables: &[ExtractionTable]) -> Result<()> {
        if tables.is_empty() {
            return Ok(());
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        for table in tables {
            tx.execute(
                r#"
                INSERT INTO extraction_tables (extraction_id, title, headers, rows, page)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    table.extraction_id,
                    table.title,
                    serde_json::to_string(&table.headers)?,
                    serde_json::to_string(&table.rows)?,
                    table.page.map(|p| p as i64),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Fields for an extraction.
    pub fn fields(&self, extraction_id: &str) -> Result<Vec<ExtractionField>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM extraction_fields WHERE extraction_id = ?1 ORDER BY id",
        )?;
        let mut rows = stmt.query(params![extraction_id])?;
        let mut fields = Vec::new();
        while let Some(row) = rows.next()? {
            fields.push(row_to_field(row)?);
        }
        Ok(fields)
    }

    /// Tables for an extraction.
    pub fn tables(&self, extraction_id: &str) -> Result<Vec<ExtractionTable>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM extraction_tables WHERE extraction_id = ?1 ORDER BY id",
        )?;
        let mut rows = stmt.query(params![extraction_id])?;
        let mut tables = Vec::new();
        while let Some(row) = rows.next()? {
            tables.push(ExtractionTable {
                id: row.get("id")?,
                extraction_id: row.get("extraction_id")?,
                title: row.get("title")?,
                headers: serde_json::from_str(&row.get::<_, String>("headers")?)?,
                rows: serde_json::from_str(&row.get::<_, String>("rows")?)?,
                page: row.get::<_, Option<i64>>("page")?.map(|p| p as u32),
            });
        }
        Ok(tables)
    }

    /// Record a human override on a field, keeping the parser-derived
    /// value and confidence for audit.
    pub fn override_field(
        &self,
        tenant_id: &str,
        field_id: i64,
        value: &FieldValue,
        actor: &str,
    ) -> Result<()> {
        let conn = self.connect()?;
        let updated = conn.execute(
            r#"
            UPDATE extraction_fields
            SET is_override = 1, override_value = ?1, overridden_by = ?2, overridden_at = ?3
            WHERE id = ?4
              AND extraction_id IN (SELECT id FROM extractions WHERE tenant_id = ?5)
            "#,
            params![
                serde_json::to_string(value)?,
                actor,
                Utc::now().to_rfc3339(),
                field_id,
                tenant_id,
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!("field {field_id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_repo() -> (tempfile::TempDir, ExtractionRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = ExtractionRepository::new(&dir.path().join("test.db")).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_versions_are_monotonic_and_current_moves() {
        let (_dir, repo) = temp_repo();
        let v1 = repo.begin_version("t1", "doc1").unwrap();
        assert_eq!(v1.version, 1);
        assert!(v1.is_current);

        let v2 = repo.begin_version("t1", "doc1").unwrap();
        assert_eq!(v2.version, 2);

        let old = repo.get("t1", &v1.id).unwrap();
        assert!(!old.is_current);
        let current = repo.get_current("t1", "doc1").unwrap().unwrap();
        assert_eq!(current.id, v2.id);
    }

    #[test]
    fn test_finalize_completed_is_terminal() {
        let (_dir, repo) = temp_repo();
        let extraction = repo.begin_version("t1", "doc1").unwrap();
        let done = repo
            .finalize_completed("t1", &extraction.id, 0.9, DocType::Lease, "layout")
            .unwrap();
        assert_eq!(done.status, ExtractionStatus::Completed);
        assert_eq!(done.overall_confidence, Some(0.9));
        assert_eq!(done.parser_used.as_deref(), Some("layout"));

        // Re-finalizing a terminal row is rejected
        assert!(matches!(
            repo.finalize_failed("t1", &extraction.id, "late"),
            Err(RepositoryError::InvalidState(_))
        ));
    }

    #[test]
    fn test_fields_round_trip_with_override() {
        let (_dir, repo) = temp_repo();
        let extraction = repo.begin_version("t1", "doc1").unwrap();

        let field = ExtractionField {
            id: 0,
            extraction_id: extraction.id.clone(),
            name: "base_rent".into(),
            value: FieldValue::Currency(2500.0),
            raw_text: Some("$2,500.00".into()),
            confidence: 0.92,
            source: FieldSource::Parser,
            page: Some(2),
            bbox: Some([0.1, 0.2, 0.5, 0.25]),
            is_override: false,
            override_value: None,
            overridden_by: None,
            overridden_at: None,
        };
        repo.insert_fields(std::slice::from_ref(&field)).unwrap();

        let stored = repo.fields(&extraction.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, FieldValue::Currency(2500.0));
        assert_eq!(stored[0].bbox, Some([0.1, 0.2, 0.5, 0.25]));

        repo.override_field("t1", stored[0].id, &FieldValue::Currency(2600.0), "reviewer")
            .unwrap();
        let after = repo.fields(&extraction.id).unwrap();
        assert!(after[0].is_override);
        // Original value retained for audit
        assert_eq!(after[0].value, FieldValue::Currency(2500.0));
        assert_eq!(after[0].effective_value(), &FieldValue::Currency(2600.0));
        assert_eq!(after[0].overridden_by.as_deref(), Some("reviewer"));
    }

    #[test]
    fn test_override_respects_tenant() {
        let (_dir, repo) = temp_repo();
        let extraction = repo.begin_version("t1", "doc1").unwrap();
        let field = ExtractionField {
            id: 0,
            extraction_id: extraction.id.clone(),
            name: "tenant_name".into(),
            value: FieldValue::Text("Acme".into()),
            raw_text: None,
            confidence: 0.8,
            source: FieldSource::Parser,
            page: None,
            bbox: None,
            is_override: false,
            override_value: None,
            overridden_by: None,
            overridden_at: None,
        };
        repo.insert_fields(std::slice::from_ref(&field)).unwrap();
        let stored = repo.fields(&extraction.id).unwrap();

        assert!(repo
            .override_field("other-tenant", stored[0].id, &FieldValue::Text("x".into()), "eve")
            .is_err());
    }

    #[test]
    fn test_tables_round_trip() {
        let (_dir, repo) = temp_repo();
        let extraction = repo.begin_version("t1", "doc1").unwrap();
        let table = ExtractionTable {
            id: 0,
            extraction_id: extraction.id.clone(),
            title: Some("Rent Schedule".into()),
            headers: vec!["Year".into(), "Rent".into()],
            rows: vec![vec!["1".into(), "2500".into()], vec!["2".into(), "2575".into()]],
            page: Some(3),
        };
        repo.insert_tables(std::slice::from_ref(&table)).unwrap();
        let stored = repo.tables(&extraction.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rows.len(), 2);
        assert_eq!(stored[0].title.as_deref(), Some("Rent Schedule"));
    }
}

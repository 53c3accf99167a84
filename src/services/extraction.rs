//! Extraction orchestration.
//!
//! Drives one document through the parser chain and the normalizer,
//! persists an immutable extraction version, and routes low-confidence
//! results into the review queue. Every raw snippet is redacted before it
//! reaches the store.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use super::priority::{critical_low_count, priority, QueueRules};
use crate::models::{Document, DocumentStatus, Extraction, ExtractionField, ExtractionTable, FieldValue};
use crate::normalize::{FieldNormalizer, NormalizedExtraction};
use crate::parsers::{ParseResult, ParserError, ParserRouter};
use crate::redact::ContentRedactor;
use crate::repository::{
    DocumentRepository, ExtractionRepository, RepositoryError, ReviewQueueError,
    ReviewQueueRepository,
};
use crate::tenant::TenantContext;

/// Errors terminal for one orchestration run. A retry is a new run.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("all parsers failed")]
    ParserChainExhausted {
        #[source]
        last: ParserError,
    },

    #[error("extraction cancelled")]
    Cancelled,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Queue(#[from] ReviewQueueError),
}

impl ExtractionError {
    /// Whether a later retry could succeed (e.g. the chain died on
    /// timeouts or rate limits rather than unusable content).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ParserChainExhausted { last } => last.is_transient(),
            Self::Cancelled => true,
            _ => false,
        }
    }
}

/// Drives documents through parsing, normalization, persistence, and
/// queue evaluation.
pub struct ExtractionOrchestrator {
    router: ParserRouter,
    normalizer: FieldNormalizer,
    redactor: Arc<dyn ContentRedactor>,
    documents: DocumentRepository,
    extractions: ExtractionRepository,
    queue: ReviewQueueRepository,
    rules: QueueRules,
}

impl ExtractionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        router: ParserRouter,
        normalizer: FieldNormalizer,
        redactor: Arc<dyn ContentRedactor>,
        documents: DocumentRepository,
        extractions: ExtractionRepository,
        queue: ReviewQueueRepository,
        rules: QueueRules,
    ) -> Self {
        Self {
            router,
            normalizer,
            redactor,
            documents,
            extractions,
            queue,
            rules,
        }
    }

    /// Process a document: parse, normalize, persist a new extraction
    /// version, and enqueue for review when the rules flag it.
    pub async fn process(
        &self,
        ctx: &TenantContext,
        document_id: &str,
        content: &[u8],
    ) -> Result<Extraction, ExtractionError> {
        let (never_tx, never_rx) = watch::channel(false);
        // Keep the sender alive for the duration so the cancel arm stays idle
        let result = self.process_with_cancel(ctx, document_id, content, never_rx).await;
        drop(never_tx);
        result
    }

    /// Like `process`, but abandons the run when the watch flag turns true.
    /// A cancelled run finalizes its extraction as failed rather than
    /// leaving it in processing.
    pub async fn process_with_cancel(
        &self,
        ctx: &TenantContext,
        document_id: &str,
        content: &[u8],
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Extraction, ExtractionError> {
        let tenant_id = ctx.tenant_id();
        let document = match self.documents.get(tenant_id, document_id) {
            Ok(doc) => doc,
            Err(RepositoryError::NotFound(_)) => {
                return Err(ExtractionError::DocumentNotFound(document_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        self.documents
            .set_status(tenant_id, document_id, DocumentStatus::Processing, None)?;
        let extraction = self.extractions.begin_version(tenant_id, document_id)?;

        info!(
            tenant_id,
            document_id,
            extraction_id = %extraction.id,
            version = extraction.version,
            mime_type = %document.mime_type,
            "extraction started"
        );

        let cancelled = async {
            match cancel.wait_for(|flag| *flag).await {
                Ok(_) => (),
                // Sender gone means nobody can cancel any more
                Err(_) => std::future::pending().await,
            }
        };

        let parse_outcome = tokio::select! {
            result = self.router.parse(content, &document.mime_type) => result,
            _ = cancelled => {
                warn!(tenant_id, document_id, extraction_id = %extraction.id, "extraction cancelled");
                self.extractions.finalize_failed(
                    tenant_id,
                    &extraction.id,
                    "cancelled before parsing completed",
                )?;
                self.documents.set_status(
                    tenant_id,
                    document_id,
                    DocumentStatus::Failed,
                    Some("extraction cancelled"),
                )?;
                return Err(ExtractionError::Cancelled);
            }
        };

        let (parse_result, parser_used) = match parse_outcome {
            Ok(ok) => ok,
            Err(last) => {
                warn!(
                    tenant_id,
                    document_id,
                    extraction_id = %extraction.id,
                    parser = last.parser(),
                    error = %last,
                    "parser chain exhausted"
                );
                self.extractions
                    .finalize_failed(tenant_id, &extraction.id, &last.to_string())?;
                self.documents.set_status(
                    tenant_id,
                    document_id,
                    DocumentStatus::Failed,
                    Some(&last.to_string()),
                )?;
                return Err(ExtractionError::ParserChainExhausted { last });
            }
        };

        let normalized = self.normalizer.normalize(&parse_result);
        self.persist_fields(&extraction, &normalized)?;
        self.persist_tables(&extraction, &parse_result)?;

        let completed = self.extractions.finalize_completed(
            tenant_id,
            &extraction.id,
            normalized.overall_confidence,
            normalized.doc_type,
            &parser_used,
        )?;
        self.documents
            .set_status(tenant_id, document_id, DocumentStatus::Ready, None)?;

        info!(
            tenant_id,
            document_id,
            extraction_id = %completed.id,
            version = completed.version,
            parser = %parser_used,
            confidence = normalized.overall_confidence,
            fields = normalized.fields.len(),
            "extraction completed"
        );

        self.evaluate_queueing(ctx, &document, &completed, &normalized)?;

        Ok(completed)
    }

    /// Redact and store normalized fields.
    fn persist_fields(
        &self,
        extraction: &Extraction,
        normalized: &NormalizedExtraction,
    ) -> Result<(), ExtractionError> {
        let fields: Vec<ExtractionField> = normalized
            .fields
            .iter()
            .map(|f| {
                let value = match &f.value {
                    FieldValue::Text(text) => {
                        FieldValue::Text(self.redactor.redact_text(text))
                    }
                    other => other.clone(),
                };
                ExtractionField {
                    id: 0,
                    extraction_id: extraction.id.clone(),
                    name: f.name.clone(),
                    value,
                    raw_text: Some(self.redactor.redact_text(&f.raw_text)),
                    confidence: f.confidence,
                    source: f.source,
                    page: f.page,
                    bbox: f.bbox,
                    is_override: false,
                    override_value: None,
                    overridden_by: None,
                    overridden_at: None,
                }
            })
            .collect();
        self.extractions.insert_fields(&fields)?;
        Ok(())
    }

    /// Redact and store parser-reported tables.
    fn persist_tables(
        &self,
        extraction: &Extraction,
        parse_result: &ParseResult,
    ) -> Result<(), ExtractionError> {
        let tables: Vec<ExtractionTable> = parse_result
            .tables
            .iter()
            .map(|t| ExtractionTable {
                id: 0,
                extraction_id: extraction.id.clone(),
                title: t.title.as_deref().map(|s| self.redactor.redact_text(s)),
                headers: t
                    .headers
                    .iter()
                    .map(|h| self.redactor.redact_text(h))
                    .collect(),
                rows: t
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|c| self.redactor.redact_text(c)).collect())
                    .collect(),
                page: t.page,
            })
            .collect();
        self.extractions.insert_tables(&tables)?;
        Ok(())
    }

    /// Apply the queueing rules to a completed extraction and enqueue it
    /// with a freshly computed priority when flagged.
    fn evaluate_queueing(
        &self,
        ctx: &TenantContext,
        document: &Document,
        extraction: &Extraction,
        normalized: &NormalizedExtraction,
    ) -> Result<(), ExtractionError> {
        let field_confidences: Vec<f64> =
            normalized.fields.iter().map(|f| f.confidence).collect();

        if !self.rules.should_queue(
            normalized.overall_confidence,
            extraction.parser_used.as_deref().unwrap_or_default(),
            &field_confidences,
        ) {
            return Ok(());
        }

        let low_criticals = critical_low_count(
            normalized.fields.iter().map(|f| (f.critical, f.confidence)),
            self.rules.critical_threshold(),
        );
        let age_hours = (Utc::now() - extraction.started_at).num_hours();
        let score = priority(normalized.overall_confidence, low_criticals, age_hours);

        let item = self.queue.enqueue(
            ctx.tenant_id(),
            &document.id,
            &extraction.id,
            score,
        )?;
        info!(
            tenant_id = ctx.tenant_id(),
            document_id = %document.id,
            extraction_id = %extraction.id,
            item_id = %item.id,
            priority = score,
            "extraction queued for review"
        );
        Ok(())
    }
}

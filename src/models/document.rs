//! Document models for captured lease files.
//!
//! Documents are content-addressed: the SHA-256 hash of the file bytes is
//! the dedup key within a tenant, so re-ingesting identical content maps
//! back to the existing record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "ready" => Some(Self::Ready),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// How a document entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Direct upload through the API or CLI.
    Upload,
    /// Pulled in by an external-source sync connector.
    Sync,
    /// Produced by a scanner integration.
    Scan,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Sync => "sync",
            Self::Scan => "scan",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(Self::Upload),
            "sync" => Some(Self::Sync),
            "scan" => Some(Self::Scan),
            _ => None,
        }
    }
}

/// An immutable record of a captured file.
///
/// Only `status` and `error` change after creation; everything else is
/// fixed at ingestion. A document is never deleted while extractions
/// reference it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// SHA-256 hash of the content, hex encoded. Unique per tenant.
    pub content_hash: String,
    /// Original file name, if known.
    pub file_name: Option<String>,
    /// MIME type (caller-supplied or sniffed from content).
    pub mime_type: String,
    /// Content size in bytes.
    pub size_bytes: u64,
    /// How the document entered the system.
    pub source_type: SourceType,
    /// Current processing status.
    pub status: DocumentStatus,
    /// Failure detail when status is `failed`.
    pub error: Option<String>,
    /// When the document was first seen.
    pub created_at: DateTime<Utc>,
    /// When status/error last changed.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Compute the SHA-256 content hash used as the dedup key.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Create a new pending document record for ingested content.
    pub fn new(
        tenant_id: &str,
        content: &[u8],
        file_name: Option<String>,
        mime_type: String,
        source_type: SourceType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            content_hash: Self::compute_hash(content),
            file_name,
            mime_type,
            size_bytes: content.len() as u64,
            source_type,
            status: DocumentStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash() {
        let hash = Document::compute_hash(b"lease agreement");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, Document::compute_hash(b"lease agreement"));
        assert_ne!(hash, Document::compute_hash(b"amendment"));
    }

    #[test]
    fn test_new_document_starts_pending() {
        let doc = Document::new(
            "tenant-a",
            b"content",
            Some("lease.pdf".to_string()),
            "application/pdf".to_string(),
            SourceType::Upload,
        );
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.size_bytes, 7);
        assert!(doc.error.is_none());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Processing,
            DocumentStatus::Ready,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::from_str("bogus"), None);
    }
}

//! Domain models.

mod document;
mod extraction;
mod review;

pub use document::{Document, DocumentStatus, SourceType};
pub use extraction::{
    BoundingBox, DocType, Extraction, ExtractionField, ExtractionStatus, ExtractionTable,
    FieldSource, FieldValue,
};
pub use review::{ReviewQueueItem, ReviewStatus};

//! Core services: orchestration, review queue, priority scoring.

mod extraction;
pub mod priority;
mod review;

pub use extraction::{ExtractionError, ExtractionOrchestrator};
pub use priority::QueueRules;
pub use review::ReviewQueueService;

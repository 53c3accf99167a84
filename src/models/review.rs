//! Review queue models.
//!
//! A `ReviewQueueItem` is a work unit for a human reviewer. It references
//! its extraction by id only; deleting a queue item never touches the
//! extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a review queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Claimed,
    Completed,
    Skipped,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "claimed" => Some(Self::Claimed),
            "completed" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// A work unit for human review of one extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewQueueItem {
    pub id: String,
    pub tenant_id: String,
    pub document_id: String,
    /// One queue item per extraction.
    pub extraction_id: String,
    /// Higher is more urgent.
    pub priority: i64,
    pub status: ReviewStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ReviewStatus::Pending.is_terminal());
        assert!(!ReviewStatus::Claimed.is_terminal());
        assert!(ReviewStatus::Completed.is_terminal());
        assert!(ReviewStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ReviewStatus::Pending,
            ReviewStatus::Claimed,
            ReviewStatus::Completed,
            ReviewStatus::Skipped,
        ] {
            assert_eq!(ReviewStatus::from_str(status.as_str()), Some(status));
        }
    }
}

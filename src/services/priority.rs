//! Review urgency scoring and queueing rules.
//!
//! `priority` is a pure function and is recomputed on every enqueue and
//! re-evaluation. It is cheap, and caching it would let scores drift from
//! the values they derive from.

use crate::config::{ReviewSettings, Settings};

/// Age contribution is capped so very old items cannot outrank genuinely
/// low-confidence ones forever.
const MAX_AGE_HOURS: i64 = 20;

/// Review urgency for an extraction. Higher is more urgent.
pub fn priority(overall_confidence: f64, critical_low_count: usize, age_hours: i64) -> i64 {
    let confidence_term = ((1.0 - overall_confidence) * 50.0).round() as i64;
    let critical_term = 10 * critical_low_count as i64;
    let age_term = age_hours.clamp(0, MAX_AGE_HOURS);
    confidence_term + critical_term + age_term
}

/// Count critical fields whose confidence falls below the threshold.
///
/// Input is `(critical, confidence)` per extracted field.
pub fn critical_low_count<I>(fields: I, critical_threshold: f64) -> usize
where
    I: IntoIterator<Item = (bool, f64)>,
{
    fields
        .into_iter()
        .filter(|(critical, confidence)| *critical && *confidence < critical_threshold)
        .count()
}

/// The queueing decision rules, evaluated when an extraction completes.
#[derive(Debug, Clone)]
pub struct QueueRules {
    review: ReviewSettings,
    fallback_parser: String,
}

impl QueueRules {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            review: settings.review.clone(),
            fallback_parser: settings.pipeline.fallback_parser.clone(),
        }
    }

    /// Whether a completed extraction needs human review. True if ANY:
    /// overall confidence is below the threshold, the designated fallback
    /// parser produced the result, or any field is below the floor.
    pub fn should_queue(
        &self,
        overall_confidence: f64,
        parser_used: &str,
        field_confidences: &[f64],
    ) -> bool {
        if overall_confidence < self.review.confidence_threshold {
            return true;
        }
        if parser_used == self.fallback_parser {
            return true;
        }
        if field_confidences
            .iter()
            .any(|c| *c < self.review.field_floor)
        {
            return true;
        }
        // Extension point: queue extractions blocked on entity resolution.
        // The upstream rule is not fully specified yet, so it stays off.
        if self.entity_resolution_pending() {
            return true;
        }
        false
    }

    /// Reserved queueing rule, permanently false until its semantics are
    /// settled upstream.
    fn entity_resolution_pending(&self) -> bool {
        false
    }

    pub fn critical_threshold(&self) -> f64 {
        self.review.critical_threshold
    }

    pub fn claim_timeout_minutes(&self) -> i64 {
        self.review.claim_timeout_minutes
    }

    pub fn critical_field_override(&self) -> &[String] {
        &self.review.critical_fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_formula() {
        // round(0.40 * 50) = 20, plus one low critical field, plus 3 hours
        assert_eq!(priority(0.60, 1, 3), 20 + 10 + 3);
        assert_eq!(priority(1.0, 0, 0), 0);
    }

    #[test]
    fn test_priority_age_capped() {
        assert_eq!(priority(0.60, 0, 500), 20 + MAX_AGE_HOURS);
        assert_eq!(priority(0.60, 0, -5), 20);
    }

    #[test]
    fn test_priority_monotone_in_confidence() {
        let mut last = i64::MAX;
        for step in 0..=20 {
            let confidence = step as f64 / 20.0;
            let p = priority(confidence, 2, 5);
            assert!(p <= last, "priority must not increase with confidence");
            last = p;
        }
    }

    #[test]
    fn test_critical_low_count() {
        let fields = [(true, 0.75), (true, 0.85), (false, 0.10), (true, 0.79)];
        assert_eq!(critical_low_count(fields, 0.80), 2);
    }

    #[test]
    fn test_should_queue_thresholds() {
        let rules = QueueRules::from_settings(&Settings::default());

        assert!(rules.should_queue(0.50, "layout", &[]));
        assert!(!rules.should_queue(0.95, "layout", &[0.9, 0.88]));

        // Fallback parser alone flags review
        assert!(rules.should_queue(0.95, "plaintext", &[0.9]));

        // A single weak field alone flags review
        assert!(rules.should_queue(0.95, "layout", &[0.9, 0.65]));

        // Boundary: exactly at the threshold does not queue
        assert!(!rules.should_queue(0.85, "layout", &[0.70]));
    }
}

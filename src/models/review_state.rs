//! Per student-question scheduling state.
use super::scheduler::{DEFAULT_EASE_FACTOR, DEFAULT_INTERVAL_DAYS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scheduler input: the parameters carried over from the previous attempt.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleParams {
    pub interval_days: f64,
    pub ease_factor: f64,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            interval_days: DEFAULT_INTERVAL_DAYS,
            ease_factor: DEFAULT_EASE_FACTOR,
        }
    }
}

/// Scheduler output for a single attempt.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledReview {
    pub interval_days: f64,
    pub ease_factor: f64,
    pub next_review_at: DateTime<Utc>,
}

impl ScheduledReview {
    pub fn params(&self) -> ScheduleParams {
        ScheduleParams {
            interval_days: self.interval_days,
            ease_factor: self.ease_factor,
        }
    }
}

/// What the progress store keeps for a (student, question) pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub interval_days: f64,
    pub ease_factor: f64,
    pub last_reviewed_at: DateTime<Utc>,
    pub next_review_at: DateTime<Utc>,
}

impl ReviewState {
    /// Builds the state to persist after an attempt made at `reviewed_at`.
    pub fn from_review(review: &ScheduledReview, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            interval_days: review.interval_days,
            ease_factor: review.ease_factor,
            last_reviewed_at: reviewed_at,
            next_review_at: review.next_review_at,
        }
    }

    pub fn params(&self) -> ScheduleParams {
        ScheduleParams {
            interval_days: self.interval_days,
            ease_factor: self.ease_factor,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }
}

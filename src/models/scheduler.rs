//! Review scheduling for spaced repetition.
//!
//! Given the parameters from the previous attempt and whether the latest
//! answer was correct, computes the next interval, ease factor and due date:
//! - Correct: interval is multiplied by the current ease factor
//! - Incorrect: interval resets to 1 day
//! - Ease factor never drops below 1.3
//!
//! How the ease factor moves is an [`EasePolicy`]. `Observed` reproduces the
//! production curve, where a correct answer pins any ease above 1.0 to
//! exactly 2.5 and an incorrect one raises it by half. `Sm2` is the
//! conventional SuperMemo 2 update.

use super::{ScheduleParams, ScheduledReview};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_INTERVAL_DAYS: f64 = 1.0;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Ease factor floor, shared by every policy.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Ceiling applied by the observed policy on correct answers only.
pub const MAX_EASE_FACTOR: f64 = 2.5;
pub const SUCCESS_EASE_MULTIPLIER: f64 = 2.5;
pub const FAILURE_EASE_MULTIPLIER: f64 = 1.5;

/// One minute.
pub const MIN_INTERVAL_DAYS: f64 = 1.0 / 1440.0;
/// Keeps due dates representable after long runs of correct answers.
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

/// SM-2 quality grades used for binary correct/incorrect outcomes.
pub const SM2_CORRECT_QUALITY: u8 = 5;
pub const SM2_INCORRECT_QUALITY: u8 = 2;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// How the ease factor is updated after an attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EasePolicy {
    /// `min(ef * 2.5, 2.5)` on success, `max(1.3, ef * 1.5)` on failure.
    #[default]
    Observed,
    /// `ef + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))`, floored at 1.3.
    Sm2,
}

impl EasePolicy {
    fn next_ease(self, ease_factor: f64, was_correct: bool) -> f64 {
        match (self, was_correct) {
            (EasePolicy::Observed, true) => {
                (ease_factor * SUCCESS_EASE_MULTIPLIER).min(MAX_EASE_FACTOR)
            }
            (EasePolicy::Observed, false) => {
                (ease_factor * FAILURE_EASE_MULTIPLIER).max(MIN_EASE_FACTOR)
            }
            (EasePolicy::Sm2, true) => ease_factor + sm2_ease_delta(SM2_CORRECT_QUALITY),
            (EasePolicy::Sm2, false) => ease_factor + sm2_ease_delta(SM2_INCORRECT_QUALITY),
        }
    }
}

impl fmt::Display for EasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EasePolicy::Observed => f.write_str("observed"),
            EasePolicy::Sm2 => f.write_str("sm2"),
        }
    }
}

impl FromStr for EasePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observed" | "literal" => Ok(EasePolicy::Observed),
            "sm2" | "sm-2" => Ok(EasePolicy::Sm2),
            other => Err(format!(
                "unknown ease policy '{}' (expected 'observed' or 'sm2')",
                other
            )),
        }
    }
}

/// SM-2 ease adjustment for a quality grade 0-5.
pub fn sm2_ease_delta(quality: u8) -> f64 {
    let q = quality.min(5) as f64;
    0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02)
}

/// Computes the next review using the default (observed) ease policy.
/// `current = None` means the question was never attempted.
pub fn compute_next_review(
    current: Option<&ScheduleParams>,
    was_correct: bool,
    now: DateTime<Utc>,
) -> ScheduledReview {
    compute_next_review_with(EasePolicy::default(), current, was_correct, now)
}

/// Computes the next review with an explicit ease policy.
pub fn compute_next_review_with(
    policy: EasePolicy,
    current: Option<&ScheduleParams>,
    was_correct: bool,
    now: DateTime<Utc>,
) -> ScheduledReview {
    let params = normalize(current.copied().unwrap_or_default(), was_correct);

    let interval_days = if was_correct {
        params.interval_days * params.ease_factor
    } else {
        DEFAULT_INTERVAL_DAYS
    };
    let interval_days = interval_days.clamp(MIN_INTERVAL_DAYS, MAX_INTERVAL_DAYS);

    let ease_factor = policy.next_ease(params.ease_factor, was_correct);
    let ease_factor = if ease_factor.is_finite() {
        ease_factor.max(MIN_EASE_FACTOR)
    } else {
        DEFAULT_EASE_FACTOR
    };

    ScheduledReview {
        interval_days,
        ease_factor,
        next_review_at: add_days(now, interval_days),
    }
}

/// Replaces values the scheduler cannot work with.
///
/// A non-positive ease only matters on a correct answer, where it would
/// collapse the interval; incorrect answers keep the raw finite value.
fn normalize(params: ScheduleParams, was_correct: bool) -> ScheduleParams {
    let mut normalized = params;

    if params.interval_days.is_nan() {
        normalized.interval_days = DEFAULT_INTERVAL_DAYS;
    } else if params.interval_days <= 0.0 {
        normalized.interval_days = MIN_INTERVAL_DAYS;
    } else if params.interval_days.is_infinite() {
        normalized.interval_days = MAX_INTERVAL_DAYS;
    }

    if !params.ease_factor.is_finite() || (was_correct && params.ease_factor <= 0.0) {
        normalized.ease_factor = DEFAULT_EASE_FACTOR;
    }

    if normalized != params {
        warn!(
            interval_days = params.interval_days,
            ease_factor = params.ease_factor,
            "Degenerate review parameters normalized"
        );
    }

    normalized
}

fn add_days(now: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    let millis = (days * MILLIS_PER_DAY).round() as i64;
    Duration::try_milliseconds(millis)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

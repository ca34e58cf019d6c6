//! Progress store interface: per student-question review state.

use super::error::Result;
use crate::models::ReviewState;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Persistence for review state keyed by `(student_id, question_id)`.
///
/// Saves are plain upserts; concurrent writers for the same pair resolve as
/// last write wins.
pub trait ProgressStore {
    /// Returns `None` when the student has never attempted the question.
    fn load_state(&self, student_id: &str, question_id: i64) -> Result<Option<ReviewState>>;

    fn save_state(&mut self, student_id: &str, question_id: i64, state: &ReviewState)
    -> Result<()>;

    /// States due on or before `now`, oldest due date first.
    fn due_states(&self, student_id: &str, now: DateTime<Utc>) -> Result<Vec<(i64, ReviewState)>>;
}

/// Store kept entirely in memory.
#[derive(Default)]
pub struct MemoryProgressStore {
    states: BTreeMap<(String, i64), ReviewState>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load_state(&self, student_id: &str, question_id: i64) -> Result<Option<ReviewState>> {
        Ok(self
            .states
            .get(&(student_id.to_string(), question_id))
            .copied())
    }

    fn save_state(
        &mut self,
        student_id: &str,
        question_id: i64,
        state: &ReviewState,
    ) -> Result<()> {
        self.states
            .insert((student_id.to_string(), question_id), *state);
        Ok(())
    }

    fn due_states(&self, student_id: &str, now: DateTime<Utc>) -> Result<Vec<(i64, ReviewState)>> {
        let mut due: Vec<(i64, ReviewState)> = self
            .states
            .iter()
            .filter(|((student, _), state)| student == student_id && state.is_due(now))
            .map(|((_, question_id), state)| (*question_id, *state))
            .collect();
        due.sort_by_key(|(id, state)| (state.next_review_at, *id));
        Ok(due)
    }
}

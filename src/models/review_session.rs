//! Review session management for spaced repetition practice.
//! Runs a student through due questions in rounds, scheduling every answer.

use super::scheduler::compute_next_review_with;
use super::{Answer, EasePolicy, Question, ReviewState, ScheduledReview};
use crate::database::{ProgressStore, StoreError};
use chrono::{DateTime, Utc};
use tracing::info;

/// A due question together with the student's stored state, if any.
#[derive(Clone, Debug)]
pub struct ReviewItem {
    pub question: Question,
    pub state: Option<ReviewState>,
    pub passed: bool,
}

/// Manages a review session with multiple rounds.
/// Questions answered incorrectly are repeated in subsequent rounds.
pub struct ReviewSession {
    pub student_id: String,
    pub items: Vec<ReviewItem>,
    pub current_round: Vec<usize>,
    pub current_index: usize,
    pub round_number: usize,
    pub policy: EasePolicy,
}

impl ReviewSession {
    /// Creates a session from questions that are due for review.
    pub fn new_from_due(
        student_id: impl Into<String>,
        due: Vec<(Question, Option<ReviewState>)>,
        policy: EasePolicy,
    ) -> Self {
        let items: Vec<_> = due
            .into_iter()
            .map(|(question, state)| ReviewItem {
                question,
                state,
                passed: false,
            })
            .collect();

        let indices: Vec<usize> = (0..items.len()).collect();

        Self {
            student_id: student_id.into(),
            items,
            current_round: indices,
            current_index: 0,
            round_number: 1,
            policy,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_item().map(|item| &item.question)
    }

    fn current_item(&self) -> Option<&ReviewItem> {
        self.current_round
            .get(self.current_index)
            .and_then(|&idx| self.items.get(idx))
    }

    /// Grades the current question, schedules its next review and persists it.
    ///
    /// Returns `None` when the session has no current question, and
    /// `StoreError::UnsavedQuestion` when the current question has no id.
    pub fn answer_current<S: ProgressStore>(
        &mut self,
        store: &mut S,
        answer: &Answer,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledReview>, StoreError> {
        let Some(&idx) = self.current_round.get(self.current_index) else {
            return Ok(None);
        };
        let Some(item) = self.items.get_mut(idx) else {
            return Ok(None);
        };
        let Some(question_id) = item.question.id else {
            return Err(StoreError::UnsavedQuestion(item.question.prompt.clone()));
        };

        let was_correct = item.question.grade(answer);
        let params = item.state.as_ref().map(ReviewState::params);
        let review = compute_next_review_with(self.policy, params.as_ref(), was_correct, now);
        let state = ReviewState::from_review(&review, now);

        store.save_state(&self.student_id, question_id, &state)?;

        item.state = Some(state);
        item.passed = was_correct;
        Ok(Some(review))
    }

    pub fn next_question(&mut self) {
        if self.current_index + 1 < self.current_round.len() {
            self.current_index += 1;
        } else {
            self.start_next_round();
        }
    }

    /// Starts a new round with questions that weren't passed.
    /// If none remain, the session is complete.
    fn start_next_round(&mut self) {
        let failed: Vec<usize> = self
            .current_round
            .iter()
            .copied()
            .filter(|&idx| self.items.get(idx).is_some_and(|item| !item.passed))
            .collect();

        if failed.is_empty() {
            return;
        }

        self.current_round = failed;
        self.current_index = 0;
        self.round_number += 1;
        info!(
            student = %self.student_id,
            round = self.round_number,
            remaining = self.current_round.len(),
            "Starting review round"
        );
    }

    pub fn passed_count(&self) -> usize {
        self.current_round
            .iter()
            .filter(|&&idx| self.items.get(idx).is_some_and(|item| item.passed))
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.current_round.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count() - self.passed_count()
    }

    /// True once every question of the current round has been passed.
    pub fn is_completed(&self) -> bool {
        self.current_round.is_empty() || self.passed_count() == self.total_count()
    }

    pub fn phase_message(&self) -> String {
        if self.round_number == 1 {
            format!("Round {}: {} questions", self.round_number, self.total_count())
        } else {
            format!(
                "Round {} (Review): {} questions to retry",
                self.round_number,
                self.total_count()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryProgressStore;
    use crate::models::QuestionFormat;
    use chrono::{Duration, TimeZone};

    fn question(id: i64, answer: &str) -> Question {
        Question {
            id: Some(id),
            prompt: format!("Question {}", id),
            format: QuestionFormat::FillInBlank {
                accepted: vec![answer.to_string()],
            },
        }
    }

    fn session() -> ReviewSession {
        ReviewSession::new_from_due(
            "anna",
            vec![(question(1, "cat"), None), (question(2, "dog"), None)],
            EasePolicy::Observed,
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_session_is_completed() {
        let mut session = ReviewSession::new_from_due("anna", Vec::new(), EasePolicy::Observed);
        let mut store = MemoryProgressStore::new();

        assert!(session.is_completed());
        assert!(session.current_question().is_none());
        assert!(
            session
                .answer_current(&mut store, &Answer::SelfAssessed(true), now())
                .unwrap()
                .is_none()
        );
        session.next_question();
        assert!(session.is_completed());
    }

    #[test]
    fn test_correct_answer_is_scheduled_and_saved() {
        let mut session = session();
        let mut store = MemoryProgressStore::new();

        let review = session
            .answer_current(&mut store, &Answer::Text("Cat".to_string()), now())
            .unwrap()
            .unwrap();

        assert_eq!(review.interval_days, 2.5);
        assert_eq!(review.next_review_at, now() + Duration::hours(60));

        let stored = store.load_state("anna", 1).unwrap().unwrap();
        assert_eq!(stored.last_reviewed_at, now());
        assert_eq!(stored.next_review_at, review.next_review_at);
        assert_eq!(session.passed_count(), 1);
    }

    #[test]
    fn test_failed_questions_repeat_next_round() {
        let mut session = session();
        let mut store = MemoryProgressStore::new();

        session
            .answer_current(&mut store, &Answer::Text("cat".to_string()), now())
            .unwrap();
        session.next_question();
        session
            .answer_current(&mut store, &Answer::Text("cow".to_string()), now())
            .unwrap();
        assert_eq!(store.load_state("anna", 2).unwrap().unwrap().interval_days, 1.0);

        session.next_question();
        assert_eq!(session.round_number, 2);
        assert_eq!(session.total_count(), 1);
        assert_eq!(session.remaining_count(), 1);
        assert_eq!(session.current_question().and_then(|q| q.id), Some(2));
        assert!(session.phase_message().contains("Round 2 (Review)"));

        let later = now() + Duration::minutes(5);
        let review = session
            .answer_current(&mut store, &Answer::Text("dog".to_string()), later)
            .unwrap()
            .unwrap();
        // the failed attempt raised the ease factor to 3.75
        assert_eq!(review.interval_days, 3.75);
        assert!(session.is_completed());
    }

    #[test]
    fn test_existing_state_feeds_scheduler() {
        let prior = ReviewState {
            interval_days: 4.0,
            ease_factor: 2.0,
            last_reviewed_at: now() - Duration::days(4),
            next_review_at: now(),
        };
        let mut session = ReviewSession::new_from_due(
            "anna",
            vec![(question(7, "tree"), Some(prior))],
            EasePolicy::Sm2,
        );
        let mut store = MemoryProgressStore::new();

        let review = session
            .answer_current(&mut store, &Answer::Text("tree".to_string()), now())
            .unwrap()
            .unwrap();
        assert_eq!(review.interval_days, 8.0);
        assert!((review.ease_factor - 2.1).abs() < 1e-9);
    }

    #[test]
    fn test_unsaved_question_is_an_error() {
        let unsaved = Question::new(
            "Spell 'house'",
            QuestionFormat::FillInBlank {
                accepted: vec!["house".to_string()],
            },
        );
        let mut session =
            ReviewSession::new_from_due("anna", vec![(unsaved, None)], EasePolicy::Observed);
        let mut store = MemoryProgressStore::new();

        let result = session.answer_current(&mut store, &Answer::Text("house".to_string()), now());
        assert!(matches!(result, Err(StoreError::UnsavedQuestion(p)) if p == "Spell 'house'"));
        assert!(store.is_empty());
        assert!(!session.items[0].passed);
    }

    #[test]
    fn test_phase_message_first_round() {
        assert_eq!(session().phase_message(), "Round 1: 2 questions");
    }
}

pub mod config;
pub mod database;
pub mod export;
pub mod models;

pub use config::Config;
pub use database::{MemoryProgressStore, ProgressStore, SqliteProgressStore, StoreError};
pub use models::scheduler::{compute_next_review, compute_next_review_with};
pub use models::{
    Answer, EasePolicy, Lesson, Question, QuestionFormat, ReviewSession, ReviewState,
    ScheduleParams, ScheduledReview,
};

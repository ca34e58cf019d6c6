use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Question not found: {0}")]
    QuestionNotFound(i64),

    #[error("Lesson not found: {0}")]
    LessonNotFound(String),

    #[error("Invalid timestamp in store: {0}")]
    InvalidTimestamp(i64),

    #[error("Invalid current date in store: {0:?}")]
    InvalidCurrentDate(String),

    #[error("Question has not been saved yet: {0}")]
    UnsavedQuestion(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

//! JSON import/export module for lessons.
//! Provides functionality to save and load Lesson structures to/from JSON files.

use crate::models::Lesson;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Exports a lesson to a JSON file at the specified path.
pub fn export_json_to_path(lesson: &Lesson, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let json_string = serde_json::to_string_pretty(lesson)?;
    fs::write(path.as_ref(), json_string)?;
    info!(lesson = %lesson.name, path = %path.as_ref().display(), "Lesson exported");
    Ok(())
}

/// Imports a lesson from a JSON file.
/// Returns an error if the file doesn't exist or contains invalid JSON.
pub fn import_json(path: impl AsRef<Path>) -> Result<Lesson, ExportError> {
    let contents = fs::read_to_string(path.as_ref())?;
    let lesson: Lesson = serde_json::from_str(&contents)?;

    info!(
        lesson = %lesson.name,
        questions = lesson.questions.len(),
        path = %path.as_ref().display(),
        "Lesson imported"
    );
    Ok(lesson)
}

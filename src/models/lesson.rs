//! Lesson is a named set of questions
use super::Question;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub name: String,
    pub questions: Vec<Question>,
}

impl Default for Lesson {
    fn default() -> Self {
        Self {
            name: "My Lesson".to_string(),
            questions: Vec::new(),
        }
    }
}

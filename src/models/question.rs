//! Exercise questions. Each format carries its own payload and grading rule.
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionFormat {
    MultipleChoice {
        options: Vec<String>,
        correct_index: usize,
    },
    FillInBlank {
        accepted: Vec<String>,
    },
    ListenAndRepeat {
        audio_url: String,
        transcript: String,
    },
    Speaking {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt_audio_url: Option<String>,
    },
}

impl QuestionFormat {
    pub fn name(&self) -> &'static str {
        match self {
            QuestionFormat::MultipleChoice { .. } => "multiple_choice",
            QuestionFormat::FillInBlank { .. } => "fill_in_blank",
            QuestionFormat::ListenAndRepeat { .. } => "listen_and_repeat",
            QuestionFormat::Speaking { .. } => "speaking",
        }
    }
}

/// A learner's response to a question.
#[derive(Clone, Debug, PartialEq)]
pub enum Answer {
    Choice(usize),
    Text(String),
    /// Verdict given by the learner or a teacher, accepted for any format.
    SelfAssessed(bool),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Store-assigned id; absent until the question is saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub prompt: String,
    pub format: QuestionFormat,
}

impl Question {
    pub fn new(prompt: impl Into<String>, format: QuestionFormat) -> Self {
        Self {
            id: None,
            prompt: prompt.into(),
            format,
        }
    }

    /// Returns true when `answer` is correct for this question.
    pub fn grade(&self, answer: &Answer) -> bool {
        match (&self.format, answer) {
            (_, Answer::SelfAssessed(verdict)) => *verdict,
            (QuestionFormat::MultipleChoice { correct_index, .. }, Answer::Choice(i)) => {
                i == correct_index
            }
            (
                QuestionFormat::MultipleChoice {
                    options,
                    correct_index,
                },
                Answer::Text(text),
            ) => options
                .get(*correct_index)
                .is_some_and(|option| normalize_text(option) == normalize_text(text)),
            (QuestionFormat::FillInBlank { accepted }, Answer::Text(text)) => {
                let given = normalize_text(text);
                accepted.iter().any(|a| normalize_text(a) == given)
            }
            (QuestionFormat::ListenAndRepeat { transcript, .. }, Answer::Text(text)) => {
                normalize_text(transcript) == normalize_text(text)
            }
            _ => false,
        }
    }
}

/// Lowercases, drops punctuation and collapses whitespace.
fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_punctuation())
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

/// Trivia categories served by the question API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Psychology,
    FunFacts,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Psychology, Category::FunFacts];

    /// The lowercase path segment used by the question API.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Psychology => "psychology",
            Category::FunFacts => "funfacts",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown category: {raw}")]
pub struct ParseCategoryError {
    raw: String,
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    /// Case-insensitive, whitespace-trimmed parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "psychology" => Ok(Category::Psychology),
            "funfacts" => Ok(Category::FunFacts),
            _ => Err(ParseCategoryError { raw: s.to_string() }),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,

    #[error("question has {count} options, expected between 2 and 6")]
    OptionCountOutOfRange { count: usize },

    #[error("duplicate option key: {key}")]
    DuplicateOptionKey { key: String },

    #[error("option text for key {key} is empty")]
    EmptyOptionText { key: String },

    #[error("correct answer {key} is not among the option keys")]
    UnknownCorrectAnswer { key: String },
}

/// A single answer choice, keyed the way the API keys it (`a`, `b`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub key: String,
    pub text: String,
}

/// Unvalidated question shape, as deserialized from the question API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionDraft {
    pub id: QuestionId,
    #[serde(alias = "questionText", alias = "question")]
    pub text: String,
    pub options: BTreeMap<String, String>,
    #[serde(alias = "correctAnswer")]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl QuestionDraft {
    /// Validate the draft into a domain `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is empty, the option count is out
    /// of range, any option text is empty, or the correct answer key is not
    /// among the options. Duplicate keys cannot survive the map shape, but
    /// `Question::new` re-checks them for callers building options by hand.
    pub fn validate(self, category: Category) -> Result<Question, QuestionError> {
        let options = self
            .options
            .into_iter()
            .map(|(key, text)| AnswerOption { key, text })
            .collect();
        Question::new(
            self.id,
            category,
            self.text,
            options,
            self.correct_answer,
            self.explanation,
        )
    }
}

/// A validated multiple-choice trivia question.
///
/// Invariants: 2 to 6 options, unique keys, `correct_answer` is one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    category: Category,
    text: String,
    options: Vec<AnswerOption>,
    correct_answer: String,
    explanation: String,
}

impl Question {
    /// Build a question, enforcing all invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if any invariant fails.
    pub fn new(
        id: QuestionId,
        category: Category,
        text: impl Into<String>,
        options: Vec<AnswerOption>,
        correct_answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let count = options.len();
        if !(2..=6).contains(&count) {
            return Err(QuestionError::OptionCountOutOfRange { count });
        }

        let mut seen = std::collections::HashSet::new();
        for option in &options {
            if !seen.insert(option.key.as_str()) {
                return Err(QuestionError::DuplicateOptionKey {
                    key: option.key.clone(),
                });
            }
            if option.text.trim().is_empty() {
                return Err(QuestionError::EmptyOptionText {
                    key: option.key.clone(),
                });
            }
        }

        let correct_answer = correct_answer.into();
        if !options.iter().any(|o| o.key == correct_answer) {
            return Err(QuestionError::UnknownCorrectAnswer {
                key: correct_answer,
            });
        }

        Ok(Self {
            id,
            category,
            text,
            options,
            correct_answer,
            explanation: explanation.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Whether the given option key is the correct one.
    #[must_use]
    pub fn is_correct(&self, key: &str) -> bool {
        self.correct_answer == key
    }

    /// Text of the option with the given key, if present.
    #[must_use]
    pub fn option_text(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.text.as_str())
    }
}

/// Pure transformation: a copy of the question with its options reordered.
///
/// The original value is never mutated; the correct answer keeps its key, so
/// correctness checks are unaffected by presentation order.
#[must_use]
pub fn shuffle_options<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> Question {
    let mut shuffled = question.clone();
    shuffled.options.shuffle(rng);
    shuffled
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

//! Error types for the question pipeline.

use thiserror::Error;

use crate::domain::QuestionKind;
use crate::validator::ValidationResult;

/// Raised once the bounded repair sequence cannot recover a parseable tree.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Parse error: {reason} (near: {excerpt:?})")]
pub struct ParseError {
  pub reason: String,
  /// Leading slice of the original text, for diagnosis.
  pub excerpt: String,
}

impl ParseError {
  pub const EXCERPT_CHARS: usize = 160;

  pub fn new(reason: impl Into<String>, original: &str) -> Self {
    Self {
      reason: reason.into(),
      excerpt: original.chars().take(Self::EXCERPT_CHARS).collect(),
    }
  }
}

/// Raised only when a kind has no safe default to fall back on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
  #[error("{kind} question has no options to index into")]
  NoOptions { kind: QuestionKind },

  #[error("{kind} question has no answer")]
  MissingAnswer { kind: QuestionKind },

  #[error("answer {answer:?} does not match any option")]
  AnswerNotInOptions { answer: String },

  #[error("answer index {index} out of bounds for {len} options")]
  IndexOutOfBounds { index: i64, len: usize },

  #[error("{kind} question is missing required field '{field}'")]
  MissingField { kind: QuestionKind, field: &'static str },

  #[error("record is not a JSON object")]
  NotAnObject,
}

/// Top-level pipeline error.
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error(transparent)]
  Parse(#[from] ParseError),

  #[error(transparent)]
  Conversion(#[from] ConversionError),

  /// Strict mode only: the question converted but failed validation.
  #[error("question failed validation: {}", .0.errors.join("; "))]
  Invalid(ValidationResult),
}

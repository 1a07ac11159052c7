//! Conversion from raw records to canonical questions, one function per kind.
//!
//! Conversion is pure apart from two injected pieces: the monotonic
//! `IdGenerator` and the RNG used to order display options. Kinds whose
//! defining structure is missing fail with `ConversionError`; everything else
//! degrades to a documented default and leaves a note in `metadata.notes`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use tracing::{debug, instrument};

use crate::domain::{CanonicalQuestion, Difficulty, QuestionBody, QuestionContext, QuestionKind, QuestionMetadata};
use crate::error::ConversionError;
use crate::inference::Inference;
use crate::raw::RawQuestionRecord;
use crate::util::{strip_visual_glyphs, tidy_spacing};

pub mod blanks;
pub mod choice;
pub mod quantity;
pub mod structured;
pub mod text;

use blanks::{BlankExtractor, MarkerBlankExtractor};

/// Process-wide question id source (`q-1`, `q-2`, ...).
#[derive(Debug)]
pub struct IdGenerator {
  prefix: String,
  next: AtomicU64,
}

impl IdGenerator {
  pub fn new(prefix: impl Into<String>) -> Self {
    Self { prefix: prefix.into(), next: AtomicU64::new(1) }
  }

  pub fn next_id(&self) -> String {
    let n = self.next.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", self.prefix, n)
  }
}

impl Default for IdGenerator {
  fn default() -> Self {
    Self::new("q")
  }
}

pub struct TypeNormalizer {
  numeric_tolerance: f64,
  blanks: Box<dyn BlankExtractor>,
}

impl TypeNormalizer {
  pub fn new(numeric_tolerance: f64) -> Self {
    Self { numeric_tolerance, blanks: Box::new(MarkerBlankExtractor) }
  }

  /// Swap the fill-blank collaborator.
  pub fn with_blank_extractor(mut self, blanks: Box<dyn BlankExtractor>) -> Self {
    self.blanks = blanks;
    self
  }

  #[instrument(level = "debug", skip_all, fields(kind = %inference.kind))]
  pub fn normalize<R: Rng + ?Sized>(
    &self,
    record: &RawQuestionRecord,
    inference: &Inference,
    ctx: &QuestionContext,
    ids: &IdGenerator,
    rng: &mut R,
  ) -> Result<CanonicalQuestion, ConversionError> {
    let mut notes = Vec::new();
    let body = match inference.kind {
      QuestionKind::MultipleChoice => QuestionBody::MultipleChoice(choice::to_multiple_choice(record, &mut notes)?),
      QuestionKind::TrueFalse => QuestionBody::TrueFalse(choice::to_true_false(record, &mut notes)),
      QuestionKind::Counting => QuestionBody::Counting(quantity::to_counting(record, &mut notes, rng)),
      QuestionKind::Numeric => QuestionBody::Numeric(quantity::to_numeric(record, &mut notes, self.numeric_tolerance)),
      QuestionKind::FillBlank => QuestionBody::FillBlank(text::to_fill_blank(record, self.blanks.as_ref(), &mut notes, rng)),
      QuestionKind::ShortAnswer => QuestionBody::ShortAnswer(text::to_short_answer(record, &mut notes)),
      QuestionKind::LongAnswer => QuestionBody::LongAnswer(text::to_long_answer(record)),
      QuestionKind::OpenEnded => QuestionBody::OpenEnded(text::to_open_ended(record)),
      QuestionKind::Matching => QuestionBody::Matching(structured::to_matching(record)?),
      QuestionKind::Ordering => QuestionBody::Ordering(structured::to_ordering(record, rng)?),
      QuestionKind::Classification => QuestionBody::Classification(structured::to_classification(record)?),
      QuestionKind::VisualIdentification => {
        QuestionBody::VisualIdentification(structured::to_visual_identification(record)?)
      }
      QuestionKind::PatternRecognition => QuestionBody::PatternRecognition(structured::to_pattern_recognition(record)),
      QuestionKind::CodeCompletion => QuestionBody::CodeCompletion(structured::to_code_completion(record)?),
      QuestionKind::DiagramLabeling => QuestionBody::DiagramLabeling(structured::to_diagram_labeling(record)?),
    };

    let mut question = CanonicalQuestion {
      id: ids.next_id(),
      prompt_text: tidy_spacing(&record.prompt),
      topic: record.topic.clone().unwrap_or_else(|| ctx.skill_name.clone()),
      subject: ctx.subject.clone(),
      difficulty: record.difficulty.as_deref().map(Difficulty::from_label).unwrap_or_default(),
      points: record.points.unwrap_or(1).max(1),
      explanation: record.explanation.clone(),
      hint: record.hint.clone(),
      metadata: QuestionMetadata {
        grade: ctx.grade.clone(),
        skill_name: ctx.skill_name.clone(),
        inferred_by: inference.source,
        matched_pattern: inference.matched_pattern.clone(),
        original_kind_tag: record.kind_tag.clone(),
        notes,
        corrections: BTreeSet::new(),
      },
      body,
    };
    if let Some(visual) = question.visual().map(str::to_string) {
      question.prompt_text = strip_visual_glyphs(&question.prompt_text, &visual);
    }

    debug!(target: "question", id = %question.id, kind = %question.kind(), notes = question.metadata.notes.len(), "Question normalized");
    Ok(question)
  }
}

impl Default for TypeNormalizer {
  fn default() -> Self {
    Self::new(0.01)
  }
}

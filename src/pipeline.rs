//! End-to-end flow: raw text → records → inferred kind → canonical question →
//! validated question, with every validation observed by the reporter.
//!
//! Everything here is synchronous. The id counter and the reporter are the
//! only shared state; both are safe to use from concurrent request handlers.

use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::{PipelineConfig, PipelineSettings};
use crate::domain::{CanonicalQuestion, InferenceSource, QuestionContext};
use crate::error::{ConversionError, ParseError, PipelineError};
use crate::fallback::fallback_question;
use crate::inference::{Inference, TypeInferenceEngine};
use crate::normalize::{IdGenerator, TypeNormalizer};
use crate::parser::parse_records;
use crate::policy::KindPolicy;
use crate::raw::RawQuestionRecord;
use crate::reporter::{ValidationLogEntry, ValidationReporter, ValidationStatistics};
use crate::validator::{ConsistencyValidator, ValidationResult};

/// One converted question with its inference trail and validation outcome.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedQuestion {
  pub question: CanonicalQuestion,
  pub inference: Inference,
  pub validation: ValidationResult,
}

pub struct Pipeline {
  settings: PipelineSettings,
  engine: TypeInferenceEngine,
  normalizer: TypeNormalizer,
  validator: ConsistencyValidator,
  reporter: ValidationReporter,
  ids: IdGenerator,
}

impl Pipeline {
  pub fn new(config: PipelineConfig) -> Self {
    let settings = config.pipeline;
    let policy = KindPolicy::new(settings.counting_max_grade);
    Self {
      engine: TypeInferenceEngine::new(&config.patterns, policy.clone()),
      normalizer: TypeNormalizer::new(settings.numeric_tolerance),
      validator: ConsistencyValidator::new(policy),
      reporter: ValidationReporter::new(settings.log_capacity),
      ids: IdGenerator::default(),
      settings,
    }
  }

  pub fn settings(&self) -> &PipelineSettings {
    &self.settings
  }

  pub fn pattern_count(&self) -> usize {
    self.engine.patterns().len()
  }

  /// Parse generated text and convert every record in it. Records that fail
  /// conversion are skipped; the batch fails only when nothing converts.
  #[instrument(level = "info", skip(self, text), fields(text_len = text.len(), subject = %ctx.subject, grade = %ctx.grade))]
  pub fn process_text(&self, text: &str, ctx: &QuestionContext) -> Result<Vec<ProcessedQuestion>, PipelineError> {
    let values = parse_records(text)?;
    if values.is_empty() {
      return Err(ParseError::new("response contained no question records", text).into());
    }
    let total = values.len();
    let mut out = Vec::with_capacity(total);
    let mut first_err = None;
    for value in values {
      match self.process_value(value, ctx) {
        Ok(p) => out.push(p),
        Err(e) => {
          warn!(target: "question_pipeline", error = %e, "Record skipped");
          first_err.get_or_insert(e);
        }
      }
    }
    info!(target: "question_pipeline", total, converted = out.len(), "Batch processed");
    match (out.is_empty(), first_err) {
      (true, Some(e)) => Err(e),
      _ => Ok(out),
    }
  }

  pub fn process_value(&self, value: Value, ctx: &QuestionContext) -> Result<ProcessedQuestion, PipelineError> {
    let record = RawQuestionRecord::try_from(value)?;
    self.process_record(&record, ctx)
  }

  pub fn process_record(&self, record: &RawQuestionRecord, ctx: &QuestionContext) -> Result<ProcessedQuestion, PipelineError> {
    self.process_with_rng(record, ctx, &mut rand::thread_rng())
  }

  /// `process_record` with an explicit RNG for display ordering.
  pub fn process_with_rng<R: Rng + ?Sized>(
    &self,
    record: &RawQuestionRecord,
    ctx: &QuestionContext,
    rng: &mut R,
  ) -> Result<ProcessedQuestion, PipelineError> {
    let processed = self.convert(record, ctx, rng)?;
    if self.settings.strict && !processed.validation.valid {
      return Err(PipelineError::Invalid(processed.validation));
    }
    Ok(processed)
  }

  /// Diagnostic entry point: never strict, conversion failures come back as result errors.
  pub fn validate_record(&self, record: &RawQuestionRecord, ctx: &QuestionContext) -> ValidationResult {
    match self.convert(record, ctx, &mut rand::thread_rng()) {
      Ok(p) => p.validation,
      Err(e) => ValidationResult { valid: false, errors: vec![e.to_string()], ..Default::default() },
    }
  }

  #[instrument(level = "debug", skip_all, fields(tag = ?record.kind_tag))]
  fn convert<R: Rng + ?Sized>(
    &self,
    record: &RawQuestionRecord,
    ctx: &QuestionContext,
    rng: &mut R,
  ) -> Result<ProcessedQuestion, ConversionError> {
    let inference = self.engine.infer(record, ctx);
    let mut question = match self.normalizer.normalize(record, &inference, ctx, &self.ids, rng) {
      Ok(q) => q,
      Err(e) => {
        self.reporter.record(record, None, &conversion_failure(&e, &inference));
        return Err(e);
      }
    };

    let mut validation = self.validator.validate(&mut question, record, ctx, rng);
    let mut warnings = inference.warnings.clone();
    warnings.extend(question.metadata.notes.iter().cloned());
    warnings.append(&mut validation.warnings);
    validation.warnings = warnings;
    self.reporter.record(record, Some(&question), &validation);

    if !validation.valid {
      warn!(target: "question", id = %question.id, kind = %question.kind(), errors = ?validation.errors, "Question failed validation");
    }
    Ok(ProcessedQuestion { question, inference, validation })
  }

  pub fn infer(&self, record: &RawQuestionRecord, ctx: &QuestionContext) -> Inference {
    self.engine.infer(record, ctx)
  }

  /// Deterministic replacement content for unusable generation output.
  pub fn fallback(&self, ctx: &QuestionContext) -> ProcessedQuestion {
    let question = fallback_question(ctx, &self.ids, self.settings.counting_max_grade);
    let inference = Inference {
      kind: question.kind(),
      source: InferenceSource::Fallback,
      matched_pattern: None,
      tagged_kind: None,
      warnings: Vec::new(),
    };
    ProcessedQuestion { question, inference, validation: ValidationResult { valid: true, ..Default::default() } }
  }

  pub fn statistics(&self) -> ValidationStatistics {
    self.reporter.statistics(self.settings.top_issues)
  }

  pub fn recent(&self, limit: usize) -> Vec<ValidationLogEntry> {
    self.reporter.recent(limit)
  }
}

impl Default for Pipeline {
  fn default() -> Self {
    Self::new(PipelineConfig::default())
  }
}

fn conversion_failure(e: &ConversionError, inference: &Inference) -> ValidationResult {
  ValidationResult {
    valid: false,
    errors: vec![e.to_string()],
    warnings: inference.warnings.clone(),
    ..Default::default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::parse_pipeline_config;
  use crate::domain::{QuestionBody, QuestionKind};
  use crate::util::count_glyphs;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use serde_json::json;

  fn record(v: serde_json::Value) -> RawQuestionRecord {
    RawQuestionRecord::try_from(v).expect("record")
  }

  fn math_k() -> QuestionContext {
    QuestionContext::new("Math", "K", "counting")
  }

  #[test]
  fn explicit_true_false_beats_visual_and_numbers() {
    let p = Pipeline::default();
    let out = p
      .process_with_rng(
        &record(json!({"prompt": "True or False: The chef has 3 pots.", "visual": "🍲🍲🍲"})),
        &math_k(),
        &mut StdRng::seed_from_u64(1),
      )
      .expect("processed");
    assert_eq!(out.question.kind(), QuestionKind::TrueFalse);
    match &out.question.body {
      QuestionBody::TrueFalse(b) => assert_eq!(b.statement, "The chef has 3 pots."),
      other => panic!("unexpected body {other:?}"),
    }
  }

  #[test]
  fn counting_without_answer_uses_glyph_count() {
    let p = Pipeline::default();
    let out = p
      .process_with_rng(
        &record(json!({"prompt": "How many stars?", "visual": "⭐⭐⭐"})),
        &math_k(),
        &mut StdRng::seed_from_u64(2),
      )
      .expect("processed");
    assert!(out.validation.valid, "{:?}", out.validation);
    match &out.question.body {
      QuestionBody::Counting(b) => {
        assert_eq!(b.answer, 3);
        assert_eq!(count_glyphs(&b.visual), 3);
        let mut opts = b.options.clone();
        opts.sort();
        assert_eq!(opts, vec![0, 1, 2, 3]);
      }
      other => panic!("unexpected body {other:?}"),
    }
  }

  #[test]
  fn zero_counting_answer_aligns_with_visual() {
    let p = Pipeline::default();
    let out = p
      .process_with_rng(
        &record(json!({"prompt": "How many stars?", "visual": "⭐⭐⭐", "answer": 0})),
        &math_k(),
        &mut StdRng::seed_from_u64(5),
      )
      .expect("processed");
    assert!(out.validation.valid, "{:?}", out.validation);
    match &out.question.body {
      QuestionBody::Counting(b) => assert_eq!(count_glyphs(&b.visual), b.answer as usize),
      other => panic!("unexpected body {other:?}"),
    }
  }

  #[test]
  fn malformed_text_still_converts() {
    let p = Pipeline::default();
    let out = p
      .process_text(r#"{"prompt": "Pick one", "options": ['A','B',], "answer": "A",}"#, &math_k())
      .expect("batch");
    assert_eq!(out.len(), 1);
    match &out[0].question.body {
      QuestionBody::MultipleChoice(b) => {
        assert_eq!(b.options.len(), 4);
        assert_eq!(b.options[b.correct_index].text, "A");
        assert!(b.options.iter().any(|o| o.text == "B"));
      }
      other => panic!("unexpected body {other:?}"),
    }
  }

  #[test]
  fn unparseable_text_is_a_parse_error() {
    let p = Pipeline::default();
    assert!(matches!(p.process_text("no json here", &math_k()), Err(PipelineError::Parse(_))));
  }

  #[test]
  fn empty_batches_are_errors() {
    let p = Pipeline::default();
    for text in ["[]", r#"{"questions": []}"#, "[1, \"two\", null]"] {
      match p.process_text(text, &math_k()) {
        Err(PipelineError::Parse(e)) => assert_eq!(e.reason, "response contained no question records"),
        other => panic!("unexpected outcome for {text}: {other:?}"),
      }
    }
  }

  #[test]
  fn batch_skips_records_that_do_not_convert() {
    let p = Pipeline::default();
    let text = r#"[{"prompt": "Pick", "type": "multiple_choice"}, {"prompt": "What is 2 + 2?", "answer": 4}]"#;
    let out = p.process_text(text, &math_k()).expect("batch");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].question.kind(), QuestionKind::Numeric);
  }

  #[test]
  fn strict_mode_rejects_invalid_questions() {
    let cfg = parse_pipeline_config("[pipeline]\nstrict = true").expect("config");
    let p = Pipeline::new(cfg);
    let r = record(json!({"prompt": "How many letters?", "visual": "🔤🔤", "type": "counting", "answer": 2}));
    let ela = QuestionContext::new("ELA", "K", "letters");
    let err = p.process_with_rng(&r, &ela, &mut StdRng::seed_from_u64(3)).expect_err("strict");
    assert!(matches!(err, PipelineError::Invalid(_)));
    // Lenient diagnostic still reports the same problem.
    assert!(!p.validate_record(&r, &ela).valid);
  }

  #[test]
  fn conversion_errors_surface_as_validation_errors() {
    let p = Pipeline::default();
    let res = p.validate_record(&record(json!({"prompt": "Pick one", "type": "mcq"})), &math_k());
    assert!(!res.valid);
    assert!(res.errors[0].contains("no options"));
  }

  #[test]
  fn statistics_track_every_validation() {
    let p = Pipeline::default();
    let mut rng = StdRng::seed_from_u64(4);
    p.process_with_rng(&record(json!({"prompt": "True or false: 2 > 1", "type": "counting", "answer": true})), &math_k(), &mut rng)
      .expect("first");
    p.validate_record(&record(json!({"prompt": "Pick", "type": "mcq"})), &math_k());
    let stats = p.statistics();
    assert_eq!(stats.total_validations, 2);
    assert_eq!(stats.kind_mismatches, 1);
    assert_eq!(stats.kind_corrections.get("counting->true_false"), Some(&1));
    assert_eq!(p.recent(1).len(), 1);
  }

  #[test]
  fn configured_patterns_take_part_in_inference() {
    let cfg = parse_pipeline_config(
      "[[patterns]]\nname = \"rank\"\npattern = \"(?i)^rank these\"\nkind = \"ordering\"\npriority = 1",
    )
    .expect("config");
    let p = Pipeline::new(cfg);
    let i = p.infer(&record(json!({"prompt": "Rank these planets by size", "items": ["a", "b"]})), &math_k());
    assert_eq!(i.kind, QuestionKind::Ordering);
    assert_eq!(i.matched_pattern.as_deref(), Some("rank"));
  }
}

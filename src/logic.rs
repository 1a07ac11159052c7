//! Request-level behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Normalizing generated text (with deterministic fallback content)
//!   - Converting or inferring a single raw record
//!   - Diagnostic validation

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::domain::QuestionContext;
use crate::error::PipelineError;
use crate::inference::Inference;
use crate::pipeline::ProcessedQuestion;
use crate::protocol::{ErrorOut, NormalizeOut, ValidateIn};
use crate::raw::RawQuestionRecord;
use crate::state::AppState;
use crate::util::trunc_for_log;
use crate::validator::ValidationResult;

/// Any failure to produce questions is answered with fallback content.
#[instrument(level = "info", skip(state, text), fields(text_len = text.len(), subject = %ctx.subject, grade = %ctx.grade))]
pub fn normalize_text(state: &AppState, text: &str, ctx: &QuestionContext) -> NormalizeOut {
  match state.pipeline.process_text(text, ctx) {
    Ok(questions) => NormalizeOut { source: "pipeline", questions, error: None },
    Err(e) => {
      warn!(target: "question_pipeline", error = %e, excerpt = %trunc_for_log(text, 120), "Serving fallback content");
      NormalizeOut { source: "fallback", questions: vec![state.pipeline.fallback(ctx)], error: Some(e.to_string()) }
    }
  }
}

#[instrument(level = "info", skip(state, record), fields(subject = %ctx.subject, grade = %ctx.grade))]
pub fn convert_record(state: &AppState, record: Value, ctx: &QuestionContext) -> Result<ProcessedQuestion, ErrorOut> {
  match state.pipeline.process_value(record, ctx) {
    Ok(p) => {
      info!(target: "question", id = %p.question.id, kind = %p.question.kind(), valid = p.validation.valid, "Record converted");
      Ok(p)
    }
    Err(PipelineError::Invalid(v)) => Err(ErrorOut { error: "question failed validation".into(), validation: Some(v) }),
    Err(e) => Err(ErrorOut { error: e.to_string(), validation: None }),
  }
}

pub fn infer_record(state: &AppState, record: Value, ctx: &QuestionContext) -> Result<Inference, ErrorOut> {
  let record = RawQuestionRecord::try_from(record).map_err(|e| ErrorOut { error: e.to_string(), validation: None })?;
  Ok(state.pipeline.infer(&record, ctx))
}

#[instrument(level = "info", skip(state, body), fields(grade = %body.grade))]
pub fn validate(state: &AppState, body: ValidateIn) -> ValidationResult {
  let ctx = body.context();
  match RawQuestionRecord::try_from(body.record) {
    Ok(record) => state.pipeline.validate_record(&record, &ctx),
    Err(e) => ValidationResult { valid: false, errors: vec![e.to_string()], ..Default::default() },
  }
}

//! Cross-field consistency checks with in-place auto-correction.
//!
//! Errors block `valid`; warnings describe a correction that has already been
//! applied; suggestions are advisory. Each correction leaves a code in
//! `metadata.corrections` so that a second pass over the same question is a
//! no-op.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{
  CanonicalQuestion, ChoiceOption, CountingBody, MultipleChoiceBody, OpenEndedBody, QuestionBody, QuestionContext,
  QuestionKind, TrueFalseBody,
};
use crate::normalize::choice::{coerce_bool, infer_from_stated_count, option_id, strip_true_false_prefix};
use crate::normalize::quantity::synthesize_counting_options;
use crate::policy::KindPolicy;
use crate::raw::{format_number, RawQuestionRecord};
use crate::util::{count_glyphs, first_glyph, shares_glyphs, strip_visual_glyphs};

pub const MC_OPTION_COUNT: usize = 4;
const MC_FILLERS: &[&str] = &["None of these", "All of these", "Not enough information", "Cannot be determined"];

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
  pub valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
  pub suggestions: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub corrected_kind: Option<QuestionKind>,
}

impl ValidationResult {
  /// Every error, warning and suggestion, in that order.
  pub fn issues(&self) -> Vec<String> {
    self.errors.iter().chain(&self.warnings).chain(&self.suggestions).cloned().collect()
  }

  fn finish(mut self) -> Self {
    self.valid = self.errors.is_empty();
    self
  }
}

/// Applies a correction at most once per question.
fn first_time(q: &mut CanonicalQuestion, code: &str) -> bool {
  q.metadata.corrections.insert(code.to_string())
}

#[derive(Clone, Debug, Default)]
pub struct ConsistencyValidator {
  policy: KindPolicy,
}

impl ConsistencyValidator {
  pub fn new(policy: KindPolicy) -> Self {
    Self { policy }
  }

  #[instrument(level = "debug", skip_all, fields(id = %question.id, kind = %question.kind()))]
  pub fn validate<R: Rng + ?Sized>(
    &self,
    question: &mut CanonicalQuestion,
    record: &RawQuestionRecord,
    ctx: &QuestionContext,
    rng: &mut R,
  ) -> ValidationResult {
    let mut res = ValidationResult::default();

    if let Some(v) = self.policy.check(question.kind(), ctx) {
      res.errors.push(v.reason);
      res.suggestions.push(format!("Use {} instead", v.suggestion));
    }
    check_kind_tag(question, record, &mut res);
    if question.prompt_text.trim().is_empty() {
      res.errors.push("Question has no prompt text".to_string());
    }

    let mut body = std::mem::replace(&mut question.body, placeholder_body());
    match &mut body {
      QuestionBody::MultipleChoice(b) => fix_multiple_choice(b, question, &mut res, rng),
      QuestionBody::Counting(b) => fix_counting(b, question, &mut res, rng),
      QuestionBody::TrueFalse(b) => fix_true_false(b, question, record, &mut res),
      other => check_required(other, &mut res),
    }
    question.body = body;

    enforce_prompt_visual(question, &mut res);

    let res = res.finish();
    debug!(
      target: "question",
      valid = res.valid,
      errors = res.errors.len(),
      warnings = res.warnings.len(),
      "Question validated"
    );
    res
  }
}

fn placeholder_body() -> QuestionBody {
  QuestionBody::OpenEnded(OpenEndedBody { guidance: None, sample_answer: None })
}

fn check_kind_tag(q: &mut CanonicalQuestion, record: &RawQuestionRecord, res: &mut ValidationResult) {
  let Some(tagged) = record.kind_tag.as_deref().and_then(QuestionKind::from_tag) else { return };
  if tagged != q.kind() && first_time(q, "kind_corrected") {
    res.corrected_kind = Some(q.kind());
    res.warnings.push(format!("Kind corrected from {tagged} to {}", q.kind()));
  }
}

fn check_required(body: &QuestionBody, res: &mut ValidationResult) {
  let mut need = |ok: bool, msg: &str| {
    if !ok {
      res.errors.push(msg.to_string());
    }
  };
  match body {
    QuestionBody::Numeric(b) => need(b.answer.is_finite(), "Numeric answer must be a finite number"),
    QuestionBody::FillBlank(b) => {
      need(!b.blanks.is_empty(), "Fill-in-the-blank question has no blanks");
      need(b.blanks.iter().all(|bl| !bl.accepted.is_empty()), "Every blank needs at least one accepted answer");
    }
    QuestionBody::ShortAnswer(b) => need(!b.accepted.is_empty(), "Short answer question has no accepted answer"),
    QuestionBody::Matching(b) => need(!b.pairs.is_empty(), "Matching question has no pairs"),
    QuestionBody::Ordering(b) => need(b.items.len() >= 2, "Ordering question needs at least 2 items"),
    QuestionBody::Classification(b) => need(
      b.categories.iter().any(|c| !c.items.is_empty()),
      "Classification question needs a category with items",
    ),
    QuestionBody::VisualIdentification(b) => {
      need(!b.visual.trim().is_empty(), "Visual identification question has no visual");
      need(!b.answer.trim().is_empty(), "Visual identification question has no answer");
    }
    QuestionBody::PatternRecognition(b) => {
      need(!b.sequence.is_empty(), "Pattern question has no sequence");
      need(!b.answer.trim().is_empty(), "Pattern question has no answer");
    }
    QuestionBody::CodeCompletion(b) => {
      need(!b.code.trim().is_empty(), "Code completion question has no code");
      need(!b.accepted.is_empty(), "Code completion question has no accepted answer");
    }
    QuestionBody::DiagramLabeling(b) => need(!b.labels.is_empty(), "Diagram question has no labels"),
    QuestionBody::LongAnswer(_) | QuestionBody::OpenEnded(_) => {}
    QuestionBody::MultipleChoice(_) | QuestionBody::Counting(_) | QuestionBody::TrueFalse(_) => {}
  }
}

fn as_numbers(options: &[ChoiceOption]) -> Option<Vec<f64>> {
  options.iter().map(|o| o.text.trim().parse::<f64>().ok()).collect()
}

fn fix_multiple_choice<R: Rng + ?Sized>(
  b: &mut MultipleChoiceBody,
  q: &mut CanonicalQuestion,
  res: &mut ValidationResult,
  rng: &mut R,
) {
  if b.options.is_empty() {
    res.errors.push("Multiple choice question has no options".to_string());
    return;
  }
  if b.correct_index >= b.options.len() {
    res.errors.push(format!("Correct index {} is out of range for {} options", b.correct_index, b.options.len()));
    return;
  }
  if b.options.len() < 2 {
    res.errors.push("Multiple choice question needs at least 2 options".to_string());
    return;
  }

  let flags_ok = b.options.iter().enumerate().all(|(i, o)| o.is_correct == (i == b.correct_index));
  if !flags_ok {
    for (i, o) in b.options.iter_mut().enumerate() {
      o.is_correct = i == b.correct_index;
    }
    first_time(q, "mc_correct_flag");
    res.warnings.push("Correct-option flags re-derived from the answer index".to_string());
  }

  let before = b.options.len();
  if before == MC_OPTION_COUNT {
    return;
  }
  if before < MC_OPTION_COUNT {
    pad_options(b);
  } else {
    trim_options(b);
  }
  b.options.shuffle(rng);
  b.correct_index = b.options.iter().position(|o| o.is_correct).unwrap_or(0);
  for (i, o) in b.options.iter_mut().enumerate() {
    o.id = option_id(i);
  }
  first_time(q, "mc_option_count");
  res.warnings.push(format!("Options adjusted from {before} to {MC_OPTION_COUNT}"));
}

fn pad_options(b: &mut MultipleChoiceBody) {
  let taken = |opts: &[ChoiceOption], s: &str| opts.iter().any(|o| o.text.eq_ignore_ascii_case(s));
  let mut candidates: Vec<String> = Vec::new();
  if let Some(nums) = as_numbers(&b.options) {
    let correct = nums[b.correct_index];
    let step = if nums.iter().all(|n| n.fract() == 0.0) { 1.0 } else { 0.5 };
    for k in 1..=MC_OPTION_COUNT as i32 {
      for sign in [1.0, -1.0] {
        let v = correct + sign * step * k as f64;
        if v >= 0.0 || correct < 0.0 {
          candidates.push(format_number(v));
        }
      }
    }
  }
  candidates.extend(MC_FILLERS.iter().map(|s| s.to_string()));
  candidates.extend((1..=MC_OPTION_COUNT).map(|i| format!("Option {i}")));

  for c in candidates {
    if b.options.len() >= MC_OPTION_COUNT {
      break;
    }
    if !taken(&b.options, &c) {
      b.options.push(ChoiceOption { id: String::new(), text: c, is_correct: false });
    }
  }
}

/// Drop the option farthest from the correct one until four remain.
fn trim_options(b: &mut MultipleChoiceBody) {
  while b.options.len() > MC_OPTION_COUNT {
    let correct = b.correct_index;
    let distance: Vec<f64> = match as_numbers(&b.options) {
      Some(nums) => nums.iter().map(|n| (n - nums[correct]).abs()).collect(),
      None => (0..b.options.len()).map(|i| (i as f64 - correct as f64).abs()).collect(),
    };
    let Some(drop) = (0..b.options.len())
      .filter(|i| *i != correct)
      .max_by(|a, c| distance[*a].total_cmp(&distance[*c]))
    else {
      return;
    };
    b.options.remove(drop);
    if drop < correct {
      b.correct_index -= 1;
    }
  }
}

fn fix_counting<R: Rng + ?Sized>(b: &mut CountingBody, q: &mut CanonicalQuestion, res: &mut ValidationResult, rng: &mut R) {
  let shown = count_glyphs(&b.visual);
  if shown == 0 {
    res.errors.push("Counting question requires a visual with at least one glyph".to_string());
  }
  if b.answer == 0 {
    res.errors.push("Counting answer must be at least 1".to_string());
  }
  if shown > 0 && b.answer > 0 && shown != b.answer as usize {
    if let Some(glyph) = first_glyph(&b.visual) {
      b.visual = glyph.repeat(b.answer as usize);
      first_time(q, "counting_visual");
      res.warnings.push(format!("Visual showed {shown} glyphs for answer {}; regenerated", b.answer));
    }
  }

  let mut distinct = b.options.clone();
  distinct.sort_unstable();
  distinct.dedup();
  if distinct.len() != 4 || b.options.len() != 4 || !b.options.contains(&b.answer) {
    b.options = synthesize_counting_options(b.answer, rng);
    first_time(q, "counting_options");
    res.warnings.push("Counting options re-synthesized".to_string());
  }
}

fn fix_true_false(b: &mut TrueFalseBody, q: &mut CanonicalQuestion, record: &RawQuestionRecord, res: &mut ValidationResult) {
  let defaulted = match record.answer.as_ref() {
    Some(v) => coerce_bool(v).is_none().then(|| format!("True/false answer {:?} is not boolean; defaulted to false", v.as_text())),
    None => {
      let inferred = b.visual.as_deref().and_then(|v| infer_from_stated_count(&record.prompt, v));
      inferred.is_none().then(|| "True/false answer missing; defaulted to false".to_string())
    }
  };
  if let Some(msg) = defaulted {
    if first_time(q, "tf_defaulted") {
      res.warnings.push(msg);
    }
  }

  let stripped = strip_true_false_prefix(&b.statement);
  if stripped != b.statement {
    b.statement = stripped;
    first_time(q, "tf_prefix");
    res.warnings.push("True/false prefix removed from statement".to_string());
  }
  if let Some(v) = b.visual.as_deref() {
    if shares_glyphs(&b.statement, v) {
      b.statement = strip_visual_glyphs(&b.statement, v);
      first_time(q, "tf_statement_glyphs");
      res.warnings.push("Visual glyphs removed from statement".to_string());
    }
  }
  if b.statement.trim().is_empty() {
    res.errors.push("True/false question has no statement".to_string());
  }
}

fn enforce_prompt_visual(q: &mut CanonicalQuestion, res: &mut ValidationResult) {
  let Some(visual) = q.visual().map(str::to_string) else { return };
  if shares_glyphs(&q.prompt_text, &visual) {
    q.prompt_text = strip_visual_glyphs(&q.prompt_text, &visual);
    first_time(q, "prompt_glyphs");
    res.warnings.push("Visual glyphs removed from prompt".to_string());
  }
}

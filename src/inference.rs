//! Canonical kind inference over raw records.
//!
//! Order (first match wins):
//!   1. literal "True or False:" / "T/F:" guard
//!   2. explicit kind tag, when allowed for the (subject, grade)
//!   3. the `DetectionPattern` table, ascending priority
//!   4. structural fallback (answer type, options, visual, numeric answer)
//!
//! A disallowed tag only breaks ties between equal-priority pattern matches.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::config::PatternCfg;
use crate::domain::{InferenceSource, QuestionContext, QuestionKind};
use crate::policy::KindPolicy;
use crate::raw::{RawAnswerValue, RawQuestionRecord};

static TRUE_FALSE_GUARD: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)^\s*(true\s+or\s+false|t\s*/\s*f)\b\s*:?").expect("guard regex"));

pub type Predicate = fn(&RawQuestionRecord) -> bool;

/// One inference rule: text pattern + target kind + priority + optional predicate.
#[derive(Clone)]
pub struct DetectionPattern {
  pub name: String,
  pub regex: Regex,
  pub kind: QuestionKind,
  pub priority: u32,
  pub predicate: Option<Predicate>,
}

impl DetectionPattern {
  fn builtin(name: &str, pattern: &str, kind: QuestionKind, priority: u32, predicate: Option<Predicate>) -> Self {
    Self {
      name: name.to_string(),
      regex: Regex::new(pattern).expect("built-in detection pattern"),
      kind,
      priority,
      predicate,
    }
  }

  pub fn matches(&self, record: &RawQuestionRecord) -> bool {
    self.regex.is_match(&record.prompt) && self.predicate.map(|p| p(record)).unwrap_or(true)
  }
}

impl fmt::Debug for DetectionPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DetectionPattern")
      .field("name", &self.name)
      .field("regex", &self.regex.as_str())
      .field("kind", &self.kind)
      .field("priority", &self.priority)
      .field("predicate", &self.predicate.is_some())
      .finish()
  }
}

fn has_options(r: &RawQuestionRecord) -> bool {
  !r.options.is_empty()
}
fn no_options(r: &RawQuestionRecord) -> bool {
  r.options.is_empty()
}
fn visual_without_options(r: &RawQuestionRecord) -> bool {
  r.has_visual() && r.options.is_empty()
}
fn visual_without_bool_answer(r: &RawQuestionRecord) -> bool {
  r.has_visual() && !matches!(r.answer, Some(RawAnswerValue::Bool(_)))
}
fn open_without_answer(r: &RawQuestionRecord) -> bool {
  r.options.is_empty() && r.answer.is_none()
}
fn has_pairs(r: &RawQuestionRecord) -> bool {
  r.extra_value(&["pairs", "matches", "left", "leftColumn", "left_column"]).is_some()
}
fn has_items(r: &RawQuestionRecord) -> bool {
  r.extra_value(&["items", "sequence", "correctOrder", "correct_order"]).is_some() || !r.options.is_empty()
}
fn has_categories(r: &RawQuestionRecord) -> bool {
  r.extra_value(&["categories", "groups"]).is_some()
}
fn has_labels(r: &RawQuestionRecord) -> bool {
  r.extra_value(&["labels", "regions"]).is_some()
}
fn has_code(r: &RawQuestionRecord) -> bool {
  r.extra_value(&["code", "codeSnippet", "code_snippet", "starterCode", "starter_code"]).is_some()
}

/// Built-in detection table, loaded once for the process lifetime.
pub static BUILTIN_PATTERNS: Lazy<Vec<DetectionPattern>> = Lazy::new(|| {
  use QuestionKind::*;
  vec![
    DetectionPattern::builtin("blank-marker", r"_{3,}|\[blank\]|\{\{\s*blank", FillBlank, 10, None),
    DetectionPattern::builtin("blank-phrase", r"(?i)\b(fill in the blank|complete the sentence)\b", FillBlank, 15, None),
    DetectionPattern::builtin("matching", r"(?i)\bmatch(ing)?\b", Matching, 20, Some(has_pairs)),
    DetectionPattern::builtin(
      "ordering",
      r"(?i)\b(put|arrange|order)\b.*\b(order|sequence)\b|\bin order\b",
      Ordering,
      25,
      Some(has_items),
    ),
    DetectionPattern::builtin(
      "classification",
      r"(?i)\b(sort|classify|categori[sz]e|group)\b",
      Classification,
      30,
      Some(has_categories),
    ),
    DetectionPattern::builtin(
      "pattern",
      r"(?i)\b(what comes next|comes next|next in the (pattern|sequence)|complete the pattern)\b",
      PatternRecognition,
      35,
      None,
    ),
    DetectionPattern::builtin("diagram", r"(?i)\blabel (the|each)\b", DiagramLabeling, 40, Some(has_labels)),
    DetectionPattern::builtin(
      "code",
      r"(?i)\b(complete the (code|function|program)|missing code|fill in the code)\b",
      CodeCompletion,
      45,
      Some(has_code),
    ),
    DetectionPattern::builtin(
      "visual-identification",
      r"(?i)\b(what|which) (shape|animal|object|fruit|color) is (this|shown)\b|\bidentify the\b",
      VisualIdentification,
      50,
      Some(visual_without_options),
    ),
    DetectionPattern::builtin("counting", r"(?i)\b(how many|count)\b", Counting, 55, Some(visual_without_bool_answer)),
    DetectionPattern::builtin(
      "long-answer",
      r"(?i)\bwrite (a|an|one|two|three) (paragraph|essay|story|letter)\b|\bin (a|one) paragraph\b",
      LongAnswer,
      60,
      None,
    ),
    DetectionPattern::builtin(
      "open-ended",
      r"(?i)\b(explain|describe|why do you think|what do you think|in your own words)\b",
      OpenEnded,
      65,
      Some(open_without_answer),
    ),
    DetectionPattern::builtin(
      "short-answer",
      r"(?i)\bin (a|one|two|a few) (words?|sentences?)\b|\bname (a|one|the)\b",
      ShortAnswer,
      70,
      Some(no_options),
    ),
    DetectionPattern::builtin(
      "multiple-choice",
      r"(?i)\b(which of (the|these)|choose|select|pick)\b",
      MultipleChoice,
      75,
      Some(has_options),
    ),
    DetectionPattern::builtin("true-false-suffix", r"(?i)\btrue or false\??\s*$", TrueFalse, 80, None),
  ]
});

/// Outcome of inference: the kind, the rule that decided it, and any warnings.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Inference {
  pub kind: QuestionKind,
  pub source: InferenceSource,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub matched_pattern: Option<String>,
  /// Kind named by the record's tag, when it was recognized.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tagged_kind: Option<QuestionKind>,
  pub warnings: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct TypeInferenceEngine {
  patterns: Vec<DetectionPattern>,
  policy: KindPolicy,
}

impl TypeInferenceEngine {
  /// Built-in table plus configured patterns, ordered by priority (stable for ties).
  pub fn new(extra: &[PatternCfg], policy: KindPolicy) -> Self {
    let mut patterns: Vec<DetectionPattern> = BUILTIN_PATTERNS.clone();
    for cfg in extra {
      match Regex::new(&cfg.pattern) {
        Ok(regex) => patterns.push(DetectionPattern {
          name: cfg.name.clone(),
          regex,
          kind: cfg.kind,
          priority: cfg.priority,
          predicate: None,
        }),
        Err(e) => {
          error!(target: "question_pipeline", name = %cfg.name, error = %e, "Skipping configured pattern with invalid regex");
        }
      }
    }
    patterns.sort_by_key(|p| p.priority);
    Self { patterns, policy }
  }

  pub fn patterns(&self) -> &[DetectionPattern] {
    &self.patterns
  }

  #[instrument(level = "debug", skip(self, record), fields(prompt_len = record.prompt.len(), tag = ?record.kind_tag))]
  pub fn infer(&self, record: &RawQuestionRecord, ctx: &QuestionContext) -> Inference {
    let mut warnings = Vec::new();
    let tagged_kind = record.kind_tag.as_deref().and_then(QuestionKind::from_tag);
    if let (Some(tag), None) = (record.kind_tag.as_deref(), tagged_kind) {
      warnings.push(format!("Unrecognized kind tag '{tag}' ignored"));
    }

    let decided = |kind, source, matched_pattern: Option<String>, warnings: Vec<String>| {
      debug!(target: "question", %kind, ?source, pattern = ?matched_pattern, "Kind inferred");
      Inference { kind, source, matched_pattern, tagged_kind, warnings }
    };

    if TRUE_FALSE_GUARD.is_match(&record.prompt) {
      if let Some(tag) = tagged_kind.filter(|k| *k != QuestionKind::TrueFalse) {
        warnings.push(format!("Kind tag '{tag}' overridden: prompt is an explicit true/false statement"));
      }
      return decided(QuestionKind::TrueFalse, InferenceSource::LiteralGuard, None, warnings);
    }

    let mut hint = None;
    if let Some(tag) = tagged_kind {
      match self.policy.check(tag, ctx) {
        None => return decided(tag, InferenceSource::ExplicitTag, None, warnings),
        Some(v) => {
          warnings.push(format!("Kind tag '{tag}' conflicts with {} grade {}: {}; re-deriving", ctx.subject, ctx.grade, v.reason));
          hint = Some(tag);
        }
      }
    }

    if let Some(p) = self.match_pattern(record, hint) {
      return decided(p.kind, InferenceSource::Pattern, Some(p.name.clone()), warnings);
    }

    decided(structural_kind(record), InferenceSource::Structural, None, warnings)
  }

  /// First matching pattern; among equal-priority matches the hinted kind wins.
  pub fn match_pattern(&self, record: &RawQuestionRecord, hint: Option<QuestionKind>) -> Option<&DetectionPattern> {
    let first = self.patterns.iter().find(|p| p.matches(record))?;
    if let Some(h) = hint {
      if let Some(tied) = self
        .patterns
        .iter()
        .filter(|p| p.priority == first.priority && p.kind == h)
        .find(|p| p.matches(record))
      {
        return Some(tied);
      }
    }
    Some(first)
  }
}

/// Fixed-order structural evidence when no pattern matched.
pub fn structural_kind(record: &RawQuestionRecord) -> QuestionKind {
  if matches!(record.answer, Some(RawAnswerValue::Bool(_))) {
    return QuestionKind::TrueFalse;
  }
  if !record.options.is_empty() {
    return QuestionKind::MultipleChoice;
  }
  let lower = record.prompt.to_lowercase();
  if record.has_visual() && (lower.contains("count") || lower.contains("how many")) {
    return QuestionKind::Counting;
  }
  if record.answer.as_ref().and_then(RawAnswerValue::as_number).is_some() {
    return QuestionKind::Numeric;
  }
  QuestionKind::FillBlank
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record(v: serde_json::Value) -> RawQuestionRecord {
    RawQuestionRecord::try_from(v).expect("record")
  }

  fn engine() -> TypeInferenceEngine {
    TypeInferenceEngine::new(&[], KindPolicy::default())
  }

  fn math_k() -> QuestionContext {
    QuestionContext::new("Math", "K", "counting to 10")
  }

  #[test]
  fn literal_guard_beats_visual_and_numbers() {
    let r = record(json!({"prompt": "True or False: The chef has 3 pots.", "visual": "🍲🍲🍲"}));
    let inf = engine().infer(&r, &math_k());
    assert_eq!(inf.kind, QuestionKind::TrueFalse);
    assert_eq!(inf.source, InferenceSource::LiteralGuard);
  }

  #[test]
  fn literal_guard_holds_for_every_subject_and_grade() {
    let prompts = ["true or false: 2 + 2 = 4", "TRUE OR FALSE The sun is a star", "T/F: cats bark", "t / f 5 > 3"];
    let contexts = [
      QuestionContext::new("Math", "K", ""),
      QuestionContext::new("ELA", "4", ""),
      QuestionContext::new("Science", "11", ""),
      QuestionContext::new("", "", ""),
    ];
    for p in prompts {
      for ctx in &contexts {
        let r = record(json!({"prompt": p, "visual": "⭐⭐", "options": ["1", "2"], "answer": 2}));
        assert_eq!(engine().infer(&r, ctx).kind, QuestionKind::TrueFalse, "prompt {p:?} ctx {ctx:?}");
      }
    }
  }

  #[test]
  fn guard_overrides_a_conflicting_tag_with_warning() {
    let r = record(json!({"prompt": "True or False: there are 3 apples", "kind": "counting"}));
    let inf = engine().infer(&r, &math_k());
    assert_eq!(inf.kind, QuestionKind::TrueFalse);
    assert_eq!(inf.tagged_kind, Some(QuestionKind::Counting));
    assert_eq!(inf.warnings.len(), 1);
  }

  #[test]
  fn counting_from_visual_and_how_many() {
    let r = record(json!({"prompt": "How many stars?", "visual": "⭐⭐⭐"}));
    let inf = engine().infer(&r, &math_k());
    assert_eq!(inf.kind, QuestionKind::Counting);
    assert_eq!(inf.matched_pattern.as_deref(), Some("counting"));
  }

  #[test]
  fn allowed_tag_is_honored() {
    let r = record(json!({"prompt": "What is 3 + 4?", "type": "short_answer", "answer": "7"}));
    let inf = engine().infer(&r, &QuestionContext::new("Math", "2", ""));
    assert_eq!(inf.kind, QuestionKind::ShortAnswer);
    assert_eq!(inf.source, InferenceSource::ExplicitTag);
  }

  #[test]
  fn disallowed_tag_is_rederived_with_warning() {
    let r = record(json!({"prompt": "Which word rhymes with cat?", "type": "counting", "options": ["hat", "dog"], "answer": "hat"}));
    let inf = engine().infer(&r, &QuestionContext::new("ELA", "1", "rhymes"));
    assert_eq!(inf.kind, QuestionKind::MultipleChoice);
    assert_eq!(inf.warnings.len(), 1);
    assert!(inf.warnings[0].contains("re-deriving"));
  }

  #[test]
  fn hint_breaks_equal_priority_ties() {
    let cfg = vec![PatternCfg {
      name: "rank".into(),
      pattern: "(?i)rank".into(),
      kind: QuestionKind::Ordering,
      priority: 5,
    }, PatternCfg {
      name: "rank-tf".into(),
      pattern: "(?i)rank".into(),
      kind: QuestionKind::TrueFalse,
      priority: 5,
    }];
    let eng = TypeInferenceEngine::new(&cfg, KindPolicy::default());
    let r = record(json!({"prompt": "Rank these"}));
    assert_eq!(eng.match_pattern(&r, None).map(|p| p.kind), Some(QuestionKind::Ordering));
    assert_eq!(eng.match_pattern(&r, Some(QuestionKind::TrueFalse)).map(|p| p.kind), Some(QuestionKind::TrueFalse));
  }

  #[test]
  fn structural_fallback_order() {
    assert_eq!(structural_kind(&record(json!({"prompt": "Cats are mammals.", "answer": true}))), QuestionKind::TrueFalse);
    assert_eq!(structural_kind(&record(json!({"prompt": "Best pet?", "options": ["cat"]}))), QuestionKind::MultipleChoice);
    assert_eq!(structural_kind(&record(json!({"prompt": "Count them", "visual": "🐟🐟"}))), QuestionKind::Counting);
    assert_eq!(structural_kind(&record(json!({"prompt": "12 / 4 =", "answer": "3"}))), QuestionKind::Numeric);
    assert_eq!(structural_kind(&record(json!({"prompt": "The capital of France is", "answer": "Paris"}))), QuestionKind::FillBlank);
  }

  #[test]
  fn table_is_sorted_and_patterns_compile() {
    let eng = engine();
    let priorities: Vec<u32> = eng.patterns().iter().map(|p| p.priority).collect();
    let mut sorted = priorities.clone();
    sorted.sort();
    assert_eq!(priorities, sorted);
    assert_eq!(eng.patterns().len(), BUILTIN_PATTERNS.len());
  }

  #[test]
  fn invalid_configured_regex_is_skipped() {
    let cfg = vec![PatternCfg { name: "bad".into(), pattern: "(".into(), kind: QuestionKind::Ordering, priority: 1 }];
    let eng = TypeInferenceEngine::new(&cfg, KindPolicy::default());
    assert_eq!(eng.patterns().len(), BUILTIN_PATTERNS.len());
  }

  #[test]
  fn unknown_tag_warns_and_falls_through() {
    let r = record(json!({"prompt": "Explain photosynthesis.", "type": "riddle"}));
    let inf = engine().infer(&r, &QuestionContext::new("Science", "6", ""));
    assert_eq!(inf.kind, QuestionKind::OpenEnded);
    assert!(inf.warnings[0].contains("riddle"));
  }
}

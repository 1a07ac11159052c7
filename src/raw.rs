//! Raw question records as produced by the generative source.
//!
//! Records arrive with inconsistent field names, an optional type tag and
//! answers encoded as booleans, numbers or strings. `RawQuestionRecord` reads
//! them leniently (first present alias wins) and keeps unknown keys in `extra`
//! for the structural kinds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConversionError;

const PROMPT_KEYS: &[&str] = &["prompt", "question", "questionText", "question_text", "text"];
const KIND_KEYS: &[&str] = &["kind", "type", "questionType", "question_type"];
const VISUAL_KEYS: &[&str] = &["visual", "emoji", "visuals", "visualElement", "visual_element"];
const OPTION_KEYS: &[&str] = &["options", "choices", "answers_list"];
const ANSWER_KEYS: &[&str] = &["answer", "correctAnswer", "correct_answer"];
const ALTERNATE_KEYS: &[&str] = &["acceptableAnswers", "acceptable_answers", "acceptedAnswers", "accepted_answers"];

/// An answer as the source encoded it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawAnswerValue {
  Bool(bool),
  Num(f64),
  Str(String),
}

impl RawAnswerValue {
  /// Display form, used for text matching.
  pub fn as_text(&self) -> String {
    match self {
      RawAnswerValue::Bool(b) => b.to_string(),
      RawAnswerValue::Num(n) => format_number(*n),
      RawAnswerValue::Str(s) => s.trim().to_string(),
    }
  }

  /// Numeric view: numbers directly, strings only when they are a plain number.
  pub fn as_number(&self) -> Option<f64> {
    match self {
      RawAnswerValue::Num(n) => Some(*n),
      RawAnswerValue::Str(s) => s.trim().replace(',', "").parse::<f64>().ok().filter(|n| n.is_finite()),
      RawAnswerValue::Bool(_) => None,
    }
  }
}

/// Render integral floats without a trailing ".0".
pub fn format_number(n: f64) -> String {
  if n.fract() == 0.0 && n.abs() < 1e15 {
    format!("{}", n as i64)
  } else {
    format!("{}", n)
  }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawOption {
  pub text: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_correct: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Value")]
#[serde(rename_all = "camelCase")]
pub struct RawQuestionRecord {
  pub prompt: String,
  pub kind_tag: Option<String>,
  pub visual: Option<String>,
  pub options: Vec<RawOption>,
  pub answer: Option<RawAnswerValue>,
  pub alternates: Vec<String>,
  pub hint: Option<String>,
  pub explanation: Option<String>,
  pub difficulty: Option<String>,
  pub points: Option<u32>,
  pub topic: Option<String>,
  /// Every key not consumed above.
  pub extra: Map<String, Value>,
}

// Options arrive as strings, numbers, or `{text, isCorrect}` objects.
impl<'de> Deserialize<'de> for RawOption {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let v = Value::deserialize(d)?;
    option_from_value(&v).ok_or_else(|| serde::de::Error::custom("unsupported option shape"))
  }
}

impl TryFrom<Value> for RawQuestionRecord {
  type Error = ConversionError;

  fn try_from(value: Value) -> Result<Self, Self::Error> {
    match value {
      Value::Object(map) => Ok(Self::from_map(map)),
      _ => Err(ConversionError::NotAnObject),
    }
  }
}

impl RawQuestionRecord {
  pub fn from_map(mut map: Map<String, Value>) -> Self {
    let prompt = take_first(&mut map, PROMPT_KEYS).and_then(|v| scalar_text(&v)).unwrap_or_default();
    let kind_tag = take_first(&mut map, KIND_KEYS).and_then(|v| scalar_text(&v));
    let visual = take_first(&mut map, VISUAL_KEYS).and_then(|v| match v {
      Value::Array(items) => Some(items.iter().filter_map(scalar_text).collect::<Vec<_>>().join("")),
      other => scalar_text(&other),
    });
    let options = take_first(&mut map, OPTION_KEYS)
      .map(|v| match v {
        Value::Array(items) => items.iter().filter_map(option_from_value).collect(),
        _ => Vec::new(),
      })
      .unwrap_or_default();

    let mut alternates: Vec<String> = take_first(&mut map, ALTERNATE_KEYS).map(|v| string_list(&v)).unwrap_or_default();
    let answer = match take_first(&mut map, ANSWER_KEYS) {
      Some(Value::Bool(b)) => Some(RawAnswerValue::Bool(b)),
      Some(Value::Number(n)) => n.as_f64().map(RawAnswerValue::Num),
      Some(Value::String(s)) => Some(RawAnswerValue::Str(s.trim().to_string())),
      Some(Value::Array(items)) => {
        let mut list: Vec<String> = items.iter().filter_map(scalar_text).collect();
        let first = if list.is_empty() { None } else { Some(list.remove(0)) };
        list.extend(alternates.drain(..));
        alternates = list;
        first.map(RawAnswerValue::Str)
      }
      _ => None,
    };

    let hint = take_first(&mut map, &["hint"]).and_then(|v| scalar_text(&v));
    let explanation = take_first(&mut map, &["explanation", "rationale"]).and_then(|v| scalar_text(&v));
    let difficulty = take_first(&mut map, &["difficulty", "level"]).and_then(|v| scalar_text(&v));
    let points = take_first(&mut map, &["points", "score"]).and_then(|v| match v {
      Value::Number(n) => n.as_u64().map(|p| p.min(u32::MAX as u64) as u32),
      Value::String(s) => s.trim().parse::<u32>().ok(),
      _ => None,
    });
    let topic = take_first(&mut map, &["topic"]).and_then(|v| scalar_text(&v));

    Self { prompt, kind_tag, visual, options, answer, alternates, hint, explanation, difficulty, points, topic, extra: map }
  }

  pub fn option_texts(&self) -> Vec<String> {
    self.options.iter().map(|o| o.text.clone()).collect()
  }

  pub fn has_visual(&self) -> bool {
    self.visual.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
  }

  /// First extra value present under any of `keys`.
  pub fn extra_value(&self, keys: &[&str]) -> Option<&Value> {
    keys.iter().find_map(|k| self.extra.get(*k)).filter(|v| !v.is_null())
  }

  pub fn extra_text(&self, keys: &[&str]) -> Option<String> {
    self.extra_value(keys).and_then(scalar_text)
  }

  pub fn extra_list(&self, keys: &[&str]) -> Option<Vec<String>> {
    self.extra_value(keys).map(string_list).filter(|l| !l.is_empty())
  }
}

fn take_first(map: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
  let mut found = None;
  for key in keys {
    if let Some(v) = map.remove(*key) {
      let blank = v.as_str().map(|s| s.trim().is_empty()).unwrap_or(false);
      if found.is_none() && !v.is_null() && !blank {
        found = Some(v);
      }
    }
  }
  found
}

/// Text of a scalar value; blank strings count as absent.
pub fn scalar_text(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => {
      let t = s.trim();
      if t.is_empty() { None } else { Some(t.to_string()) }
    }
    Value::Number(n) => n.as_f64().map(format_number),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// Strings from an array (or a single scalar, split on `|`).
pub fn string_list(v: &Value) -> Vec<String> {
  match v {
    Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
    other => scalar_text(other)
      .map(|s| s.split('|').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
      .unwrap_or_default(),
  }
}

fn option_from_value(v: &Value) -> Option<RawOption> {
  match v {
    Value::Object(obj) => {
      let text = ["text", "label", "value", "option"].iter().find_map(|k| obj.get(*k).and_then(scalar_text))?;
      let is_correct = ["isCorrect", "is_correct", "correct"].iter().find_map(|k| obj.get(*k).and_then(Value::as_bool));
      Some(RawOption { text, is_correct })
    }
    other => scalar_text(other).map(|text| RawOption { text, is_correct: None }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn reads_either_naming_convention() {
    let a: RawQuestionRecord = serde_json::from_value(json!({
      "question": "What is 2+2?", "type": "numeric", "correctAnswer": 4
    }))
    .expect("record");
    assert_eq!(a.prompt, "What is 2+2?");
    assert_eq!(a.kind_tag.as_deref(), Some("numeric"));
    assert_eq!(a.answer, Some(RawAnswerValue::Num(4.0)));

    let b: RawQuestionRecord = serde_json::from_value(json!({
      "prompt": "Is ice cold?", "correct_answer": true, "emoji": "🧊"
    }))
    .expect("record");
    assert_eq!(b.answer, Some(RawAnswerValue::Bool(true)));
    assert_eq!(b.visual.as_deref(), Some("🧊"));
  }

  #[test]
  fn duplicate_aliases_do_not_fail_and_first_wins() {
    let r = RawQuestionRecord::try_from(json!({
      "prompt": "primary", "question": "secondary", "answer": "", "correctAnswer": "B"
    }))
    .expect("record");
    assert_eq!(r.prompt, "primary");
    // A blank alias is skipped in favour of the next one.
    assert_eq!(r.answer, Some(RawAnswerValue::Str("B".into())));
    assert!(!r.extra.contains_key("question"));
  }

  #[test]
  fn options_accept_numbers_and_objects() {
    let r = RawQuestionRecord::try_from(json!({
      "prompt": "Pick", "options": [1, "two", {"text": "three", "isCorrect": true}, null]
    }))
    .expect("record");
    assert_eq!(r.option_texts(), vec!["1", "two", "three"]);
    assert_eq!(r.options[2].is_correct, Some(true));
  }

  #[test]
  fn array_answer_folds_into_alternates() {
    let r = RawQuestionRecord::try_from(json!({
      "prompt": "Name a primary color", "answer": ["red", "blue"], "acceptableAnswers": ["yellow"]
    }))
    .expect("record");
    assert_eq!(r.answer, Some(RawAnswerValue::Str("red".into())));
    assert_eq!(r.alternates, vec!["blue", "yellow"]);
  }

  #[test]
  fn non_object_is_rejected() {
    assert_eq!(RawQuestionRecord::try_from(json!([1, 2])), Err(ConversionError::NotAnObject));
  }

  #[test]
  fn unknown_keys_land_in_extra() {
    let r = RawQuestionRecord::try_from(json!({"prompt": "Match", "pairs": [["a", "b"]]})).expect("record");
    assert!(r.extra_value(&["pairs"]).is_some());
  }
}

//! Multiple-choice and true/false conversion.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::{ChoiceOption, MultipleChoiceBody, QuestionKind, TrueFalseBody};
use crate::error::ConversionError;
use crate::raw::{RawAnswerValue, RawQuestionRecord};
use crate::util::{count_glyphs, emoji_glyphs, strip_visual_glyphs, tidy_spacing};

static TRUE_FALSE_PREFIX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)^\s*(true\s+or\s+false|t\s*/\s*f)\b\s*[:.\-?]?\s*").expect("prefix regex"));
// Known-fragile: only the literal "there are N" phrasing is recognized.
static THERE_ARE_N: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bthere are (\d+)\b").expect("there-are regex"));

/// Shape names and the glyphs that depict them.
const SHAPE_GLYPHS: &[(&str, &[&str])] = &[
  ("circle", &["🔴", "🟠", "🟡", "🟢", "🔵", "🟣", "🟤", "⚫", "⚪", "●", "○"]),
  ("square", &["🟥", "🟧", "🟨", "🟩", "🟦", "🟪", "🟫", "⬛", "⬜", "■", "□", "◼", "◻"]),
  ("triangle", &["🔺", "🔻", "▲", "△", "▼"]),
  ("star", &["⭐", "🌟", "★", "☆"]),
  ("heart", &["❤", "🧡", "💛", "💚", "💙", "💜", "🖤", "🤍", "♥"]),
  ("diamond", &["🔷", "🔶", "🔹", "🔸", "💎", "◆", "◇"]),
  ("rectangle", &["▬", "▭"]),
  ("oval", &["🥚", "⬭"]),
];

/// Option ids: a, b, c, ...
pub fn option_id(index: usize) -> String {
  let letter = (b'a' + (index % 26) as u8) as char;
  if index < 26 { letter.to_string() } else { format!("{}{}", letter, index / 26) }
}

pub fn to_multiple_choice(record: &RawQuestionRecord, notes: &mut Vec<String>) -> Result<MultipleChoiceBody, ConversionError> {
  if record.options.is_empty() {
    return Err(ConversionError::NoOptions { kind: QuestionKind::MultipleChoice });
  }
  let names = record.option_texts();
  let visual = record.visual.clone().filter(|v| !v.trim().is_empty());

  let display = match visual.as_deref().and_then(|v| shape_glyph_options(&record.prompt, &names, v)) {
    Some(glyphs) => {
      notes.push("Shape option names replaced by their glyphs".to_string());
      glyphs
    }
    None => names.clone(),
  };

  let correct_index = resolve_choice_index(record, &names, &display)?;
  let options = display
    .into_iter()
    .enumerate()
    .map(|(i, text)| ChoiceOption { id: option_id(i), text, is_correct: i == correct_index })
    .collect();
  Ok(MultipleChoiceBody { options, correct_index, visual })
}

fn resolve_choice_index(record: &RawQuestionRecord, names: &[String], display: &[String]) -> Result<usize, ConversionError> {
  let len = names.len();
  match &record.answer {
    Some(RawAnswerValue::Num(n)) => {
      let index = *n as i64;
      if n.fract() != 0.0 || index < 0 || index as usize >= len {
        return Err(ConversionError::IndexOutOfBounds { index, len });
      }
      Ok(index as usize)
    }
    Some(RawAnswerValue::Str(s)) => match_option_text(s, names)
      .or_else(|| match_option_text(s, display))
      .or_else(|| letter_index(s, len))
      .ok_or_else(|| ConversionError::AnswerNotInOptions { answer: s.clone() }),
    Some(RawAnswerValue::Bool(b)) => {
      match_option_text(&b.to_string(), names).ok_or_else(|| ConversionError::AnswerNotInOptions { answer: b.to_string() })
    }
    None => record
      .options
      .iter()
      .position(|o| o.is_correct == Some(true))
      .ok_or(ConversionError::MissingAnswer { kind: QuestionKind::MultipleChoice }),
  }
}

/// Exact match first, then case-insensitive.
pub fn match_option_text(answer: &str, options: &[String]) -> Option<usize> {
  let a = answer.trim();
  options
    .iter()
    .position(|o| o.trim() == a)
    .or_else(|| options.iter().position(|o| o.trim().to_lowercase() == a.to_lowercase()))
}

/// "B", "b)", "(C)", "Option D" → index.
fn letter_index(answer: &str, len: usize) -> Option<usize> {
  let lower = answer.trim().to_lowercase();
  let t = lower.strip_prefix("option").unwrap_or(&lower).trim();
  let t = t.trim_start_matches('(').trim_end_matches([')', '.', ':']).trim();
  let mut chars = t.chars();
  match (chars.next(), chars.next()) {
    (Some(c), None) if c.is_ascii_lowercase() => {
      let idx = (c as u8 - b'a') as usize;
      (idx < len).then_some(idx)
    }
    _ => None,
  }
}

fn bare(glyph: &str) -> String {
  glyph.chars().filter(|c| *c != '\u{FE0F}').collect()
}

fn shape_for_name(name: &str) -> Option<&'static (&'static str, &'static [&'static str])> {
  let n = name.trim().to_lowercase();
  let n = n.strip_suffix('s').filter(|_| !n.ends_with("ss")).unwrap_or(&n).to_string();
  SHAPE_GLYPHS.iter().find(|(shape, _)| *shape == n)
}

/// When a shape question lists shape names and the visual shows matching glyphs,
/// display glyphs instead of names. Every option must be a shape name and at
/// least one must be depicted in the visual.
pub fn shape_glyph_options(prompt: &str, names: &[String], visual: &str) -> Option<Vec<String>> {
  if !prompt.to_lowercase().contains("shape") {
    return None;
  }
  let glyphs: Vec<String> = emoji_glyphs(visual).iter().map(|g| bare(g)).collect();
  if glyphs.is_empty() {
    return None;
  }
  let shapes: Vec<_> = names.iter().map(|n| shape_for_name(n)).collect::<Option<Vec<_>>>()?;

  let mut depicted = 0;
  let out = shapes
    .iter()
    .map(|(_, candidates)| match glyphs.iter().find(|g| candidates.contains(&g.as_str())) {
      Some(g) => {
        depicted += 1;
        g.clone()
      }
      None => candidates[0].to_string(),
    })
    .collect::<Vec<_>>();
  (depicted > 0).then_some(out)
}

/// Boolean view of a raw answer; `None` when it is not recognizably boolean.
pub fn coerce_bool(v: &RawAnswerValue) -> Option<bool> {
  match v {
    RawAnswerValue::Bool(b) => Some(*b),
    RawAnswerValue::Num(n) if *n == 1.0 => Some(true),
    RawAnswerValue::Num(n) if *n == 0.0 => Some(false),
    RawAnswerValue::Num(_) => None,
    RawAnswerValue::Str(s) => {
      let t = s.trim().trim_end_matches(['.', '!']).to_lowercase();
      match t.as_str() {
        "true" | "t" | "yes" | "y" | "1" | "correct" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "incorrect" => Some(false),
        _ => None,
      }
    }
  }
}

pub fn strip_true_false_prefix(prompt: &str) -> String {
  TRUE_FALSE_PREFIX.replace(prompt, "").trim().to_string()
}

/// "there are N" in the prompt compared against the visual glyph count.
pub fn infer_from_stated_count(prompt: &str, visual: &str) -> Option<bool> {
  let stated = THERE_ARE_N.captures(prompt)?.get(1)?.as_str().parse::<usize>().ok()?;
  let shown = count_glyphs(visual);
  if shown == 0 {
    return None;
  }
  Some(shown == stated)
}

/// Unrecognized answers default to `false`; the validator reports that residue.
pub fn to_true_false(record: &RawQuestionRecord, notes: &mut Vec<String>) -> TrueFalseBody {
  let visual = record.visual.clone().filter(|v| !v.trim().is_empty());
  let mut statement = strip_true_false_prefix(&record.prompt);
  if let Some(v) = visual.as_deref() {
    statement = strip_visual_glyphs(&statement, v);
  }
  let statement = tidy_spacing(&statement);

  let answer = match record.answer.as_ref() {
    Some(v) => coerce_bool(v).unwrap_or(false),
    None => match visual.as_deref().and_then(|v| infer_from_stated_count(&record.prompt, v)) {
      Some(b) => {
        debug!(target: "question", answer = b, "True/false answer inferred from glyph count");
        notes.push(format!("Answer inferred as {b} by comparing the visual glyph count with the stated number"));
        b
      }
      None => false,
    },
  };
  TrueFalseBody { statement, answer, visual }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record(v: serde_json::Value) -> RawQuestionRecord {
    RawQuestionRecord::try_from(v).expect("record")
  }

  fn mc(v: serde_json::Value) -> Result<MultipleChoiceBody, ConversionError> {
    to_multiple_choice(&record(v), &mut Vec::new())
  }

  #[test]
  fn numeric_answer_is_a_bounds_checked_index() {
    let b = mc(json!({"prompt": "Pick", "options": ["a", "b", "c"], "answer": 2})).expect("mc");
    assert_eq!(b.correct_index, 2);
    assert_eq!(b.options.iter().filter(|o| o.is_correct).count(), 1);
    let err = mc(json!({"prompt": "Pick", "options": ["a", "b"], "answer": 5})).expect_err("oob");
    assert_eq!(err, ConversionError::IndexOutOfBounds { index: 5, len: 2 });
  }

  #[test]
  fn text_answer_matches_exact_then_case_insensitive_then_letter() {
    let b = mc(json!({"prompt": "Pick", "options": ["Dog", "dog", "Cat"], "answer": "dog"})).expect("exact");
    assert_eq!(b.correct_index, 1);
    let b = mc(json!({"prompt": "Pick", "options": ["Dog", "Cat"], "answer": "CAT"})).expect("ci");
    assert_eq!(b.correct_index, 1);
    let b = mc(json!({"prompt": "Pick", "options": ["Dog", "Cat", "Cow"], "answer": "c)"})).expect("letter");
    assert_eq!(b.correct_index, 2);
    let err = mc(json!({"prompt": "Pick", "options": ["Dog", "Cat"], "answer": "Horse"})).expect_err("none");
    assert_eq!(err, ConversionError::AnswerNotInOptions { answer: "Horse".into() });
  }

  #[test]
  fn flagged_option_stands_in_for_missing_answer() {
    let b = mc(json!({"prompt": "Pick", "options": ["x", {"text": "y", "isCorrect": true}]})).expect("flag");
    assert_eq!(b.correct_index, 1);
    let err = mc(json!({"prompt": "Pick", "options": ["x", "y"]})).expect_err("missing");
    assert_eq!(err, ConversionError::MissingAnswer { kind: QuestionKind::MultipleChoice });
  }

  #[test]
  fn shape_names_become_visual_glyphs() {
    let mut notes = Vec::new();
    let r = record(json!({
      "prompt": "Which shape is this?", "visual": "🔺",
      "options": ["Circle", "Triangle", "Squares"], "answer": "Triangle"
    }));
    let b = to_multiple_choice(&r, &mut notes).expect("shape mc");
    let texts: Vec<&str> = b.options.iter().map(|o| o.text.as_str()).collect();
    assert_eq!(texts, vec!["🔴", "🔺", "🟥"]);
    assert_eq!(b.correct_index, 1);
    assert_eq!(notes.len(), 1);

    let by_glyph = record(json!({
      "prompt": "Which shape is this?", "visual": "🔺", "options": ["circle", "triangle"], "answer": "🔺"
    }));
    assert_eq!(to_multiple_choice(&by_glyph, &mut Vec::new()).expect("glyph answer").correct_index, 1);
  }

  #[test]
  fn shape_substitution_needs_all_shape_names() {
    assert!(shape_glyph_options("Which shape?", &["circle".into(), "banana".into()], "🔴").is_none());
    assert!(shape_glyph_options("Which fruit?", &["circle".into()], "🔴").is_none());
  }

  #[test]
  fn booleans_coerce_from_strings_and_numbers() {
    for s in ["true", "T", "Yes", "1", "correct."] {
      assert_eq!(coerce_bool(&RawAnswerValue::Str(s.into())), Some(true), "{s}");
    }
    for s in ["false", "f", "NO", "0"] {
      assert_eq!(coerce_bool(&RawAnswerValue::Str(s.into())), Some(false), "{s}");
    }
    assert_eq!(coerce_bool(&RawAnswerValue::Str("maybe".into())), None);
    assert_eq!(coerce_bool(&RawAnswerValue::Num(1.0)), Some(true));
    assert_eq!(coerce_bool(&RawAnswerValue::Num(7.0)), None);
  }

  #[test]
  fn true_false_statement_drops_prefix() {
    let b = to_true_false(&record(json!({"prompt": "True or False: The chef has 3 pots.", "visual": "🍲🍲🍲"})), &mut Vec::new());
    assert_eq!(b.statement, "The chef has 3 pots.");
    assert!(!b.answer);
    assert_eq!(strip_true_false_prefix("T/F: cats meow"), "cats meow");
  }

  #[test]
  fn there_are_n_compares_glyph_count() {
    let mut notes = Vec::new();
    let yes = to_true_false(&record(json!({"prompt": "True or false: there are 3 pots.", "visual": "🍲🍲🍲"})), &mut notes);
    assert!(yes.answer);
    assert_eq!(notes.len(), 1);
    let no = to_true_false(&record(json!({"prompt": "True or false: there are 4 pots.", "visual": "🍲🍲🍲"})), &mut Vec::new());
    assert!(!no.answer);
    // Other phrasings are deliberately not recognized.
    assert_eq!(infer_from_stated_count("I see 3 pots", "🍲🍲🍲"), None);
  }
}

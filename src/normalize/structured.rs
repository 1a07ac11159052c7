//! Kinds whose defining structure lives in extra record fields.
//!
//! Each reads a handful of aliases from `RawQuestionRecord::extra`. A kind
//! whose structure is entirely absent fails with `MissingField`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;

use crate::domain::{
  Category, ClassificationBody, CodeCompletionBody, DiagramLabel, DiagramLabelingBody, MatchPair, MatchingBody,
  OrderingBody, PatternRecognitionBody, QuestionKind, VisualIdentificationBody,
};
use crate::error::ConversionError;
use crate::raw::{scalar_text, string_list, RawAnswerValue, RawQuestionRecord};
use crate::util::emoji_glyphs;

use super::text::accepted_answers;

fn missing(kind: QuestionKind, field: &'static str) -> ConversionError {
  ConversionError::MissingField { kind, field }
}

fn first_text(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
  keys.iter().find_map(|k| obj.get(*k).and_then(scalar_text))
}

fn answer_text(record: &RawQuestionRecord) -> String {
  record.answer.as_ref().map(RawAnswerValue::as_text).unwrap_or_default()
}

fn pair_from_value(v: &Value) -> Option<MatchPair> {
  match v {
    Value::Array(items) if items.len() >= 2 => Some(MatchPair { left: scalar_text(&items[0])?, right: scalar_text(&items[1])? }),
    Value::Object(obj) => Some(MatchPair {
      left: first_text(obj, &["left", "term", "item", "prompt"])?,
      right: first_text(obj, &["right", "definition", "match", "answer"])?,
    }),
    _ => None,
  }
}

pub fn to_matching(record: &RawQuestionRecord) -> Result<MatchingBody, ConversionError> {
  let pairs: Vec<MatchPair> = match record.extra_value(&["pairs", "matches"]) {
    Some(Value::Array(items)) => items.iter().filter_map(pair_from_value).collect(),
    Some(Value::Object(map)) => map
      .iter()
      .filter_map(|(k, v)| scalar_text(v).map(|right| MatchPair { left: k.clone(), right }))
      .collect(),
    _ => {
      let left = record.extra_list(&["left", "leftColumn", "left_column"]).unwrap_or_default();
      let right = record.extra_list(&["right", "rightColumn", "right_column"]).unwrap_or_default();
      left.into_iter().zip(right).map(|(left, right)| MatchPair { left, right }).collect()
    }
  };
  if pairs.is_empty() {
    return Err(missing(QuestionKind::Matching, "pairs"));
  }
  Ok(MatchingBody { pairs })
}

/// Shuffle a copy of `items`; a shuffle that lands on the original order is rotated by one.
pub fn shuffled_display<R: Rng + ?Sized>(items: &[String], rng: &mut R) -> Vec<String> {
  let mut display = items.to_vec();
  display.shuffle(rng);
  if display.len() > 1 && display == items {
    display.rotate_left(1);
  }
  display
}

pub fn to_ordering<R: Rng + ?Sized>(record: &RawQuestionRecord, rng: &mut R) -> Result<OrderingBody, ConversionError> {
  let items = record
    .extra_list(&["correctOrder", "correct_order", "items", "sequence"])
    .or_else(|| {
      let options = record.option_texts();
      if options.is_empty() {
        return None;
      }
      let answer = answer_text(record);
      let stated: Vec<String> =
        answer.split([',', '>', '→']).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
      let same_items = stated.len() == options.len()
        && stated.iter().all(|s| options.iter().any(|o| o.eq_ignore_ascii_case(s)));
      Some(if same_items { stated } else { options })
    })
    .ok_or_else(|| missing(QuestionKind::Ordering, "items"))?;
  let display = shuffled_display(&items, rng);
  Ok(OrderingBody { items, display })
}

pub fn to_classification(record: &RawQuestionRecord) -> Result<ClassificationBody, ConversionError> {
  let categories: Vec<Category> = match record.extra_value(&["categories", "groups"]) {
    Some(Value::Object(map)) => {
      map.iter().map(|(name, items)| Category { name: name.clone(), items: string_list(items) }).collect()
    }
    Some(Value::Array(list)) => list
      .iter()
      .filter_map(|v| {
        let obj = v.as_object()?;
        let name = first_text(obj, &["name", "category", "label"])?;
        let items = obj.get("items").map(string_list).unwrap_or_default();
        Some(Category { name, items })
      })
      .collect(),
    _ => Vec::new(),
  };
  if categories.is_empty() {
    return Err(missing(QuestionKind::Classification, "categories"));
  }
  Ok(ClassificationBody { categories })
}

pub fn to_visual_identification(record: &RawQuestionRecord) -> Result<VisualIdentificationBody, ConversionError> {
  let visual = record
    .visual
    .clone()
    .filter(|v| !v.trim().is_empty())
    .or_else(|| record.extra_text(&["image", "imageUrl", "image_url"]))
    .ok_or_else(|| missing(QuestionKind::VisualIdentification, "visual"))?;
  let answer = answer_text(record);
  if answer.trim().is_empty() {
    return Err(missing(QuestionKind::VisualIdentification, "answer"));
  }
  Ok(VisualIdentificationBody { visual, answer, options: record.option_texts() })
}

pub fn to_pattern_recognition(record: &RawQuestionRecord) -> PatternRecognitionBody {
  let sequence = record
    .extra_list(&["sequence", "pattern"])
    .or_else(|| {
      let glyphs = record.visual.as_deref().map(emoji_glyphs).unwrap_or_default();
      (!glyphs.is_empty()).then_some(glyphs)
    })
    .unwrap_or_else(|| {
      let tail = record.prompt.rsplit_once(':').map(|(_, t)| t).unwrap_or_default();
      tail
        .split([',', ' '])
        .map(|s| s.trim().trim_end_matches(['?', '.']).to_string())
        .filter(|s| !s.is_empty() && !s.chars().all(|c| c == '_'))
        .collect()
    });
  PatternRecognitionBody { sequence, answer: answer_text(record), options: record.option_texts() }
}

pub fn to_code_completion(record: &RawQuestionRecord) -> Result<CodeCompletionBody, ConversionError> {
  let code = record
    .extra_text(&["code", "codeSnippet", "code_snippet", "snippet"])
    .ok_or_else(|| missing(QuestionKind::CodeCompletion, "code"))?;
  let language = record.extra_text(&["language", "lang"]).unwrap_or_else(|| "text".to_string());
  Ok(CodeCompletionBody { language, code, accepted: accepted_answers(record) })
}

fn label_from_value(index: usize, v: &Value) -> Option<DiagramLabel> {
  let id_default = || format!("label-{}", index + 1);
  match v {
    Value::Object(obj) => Some(DiagramLabel {
      id: first_text(obj, &["id"]).unwrap_or_else(id_default),
      text: first_text(obj, &["text", "label", "answer"])?,
      x: obj.get("x").and_then(Value::as_f64),
      y: obj.get("y").and_then(Value::as_f64),
    }),
    other => scalar_text(other).map(|text| DiagramLabel { id: id_default(), text, x: None, y: None }),
  }
}

pub fn to_diagram_labeling(record: &RawQuestionRecord) -> Result<DiagramLabelingBody, ConversionError> {
  let image = record
    .extra_text(&["image", "diagram", "imageUrl", "image_url"])
    .or_else(|| record.visual.clone().filter(|v| !v.trim().is_empty()))
    .ok_or_else(|| missing(QuestionKind::DiagramLabeling, "image"))?;
  let labels: Vec<DiagramLabel> = match record.extra_value(&["labels", "regions"]) {
    Some(Value::Array(items)) => items.iter().enumerate().filter_map(|(i, v)| label_from_value(i, v)).collect(),
    _ => Vec::new(),
  };
  if labels.is_empty() {
    return Err(missing(QuestionKind::DiagramLabeling, "labels"));
  }
  Ok(DiagramLabelingBody { image, labels })
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use serde_json::json;

  fn record(v: serde_json::Value) -> RawQuestionRecord {
    RawQuestionRecord::try_from(v).expect("record")
  }

  #[test]
  fn matching_accepts_arrays_objects_and_columns() {
    let a = to_matching(&record(json!({"prompt": "Match", "pairs": [["cat", "meow"], {"term": "dog", "definition": "woof"}]})))
      .expect("pairs");
    assert_eq!(a.pairs[1], MatchPair { left: "dog".into(), right: "woof".into() });
    let b = to_matching(&record(json!({"prompt": "Match", "left": ["1", "2"], "right": ["one", "two"]}))).expect("columns");
    assert_eq!(b.pairs.len(), 2);
    let err = to_matching(&record(json!({"prompt": "Match"}))).expect_err("missing");
    assert_eq!(err, ConversionError::MissingField { kind: QuestionKind::Matching, field: "pairs" });
  }

  #[test]
  fn ordering_display_differs_from_answer() {
    let mut rng = StdRng::seed_from_u64(4);
    let b = to_ordering(&record(json!({"prompt": "Order", "items": ["1", "2", "3"]})), &mut rng).expect("ordering");
    assert_eq!(b.items, vec!["1", "2", "3"]);
    assert_ne!(b.display, b.items);
    let mut sorted = b.display.clone();
    sorted.sort();
    assert_eq!(sorted, b.items);
  }

  #[test]
  fn ordering_reads_order_from_answer_over_options() {
    let b = to_ordering(
      &record(json!({"prompt": "Put in order", "options": ["egg", "chick", "hen"], "answer": "egg > chick > hen"})),
      &mut StdRng::seed_from_u64(5),
    )
    .expect("ordering");
    assert_eq!(b.items, vec!["egg", "chick", "hen"]);
  }

  #[test]
  fn classification_reads_maps_and_lists() {
    let a = to_classification(&record(json!({"prompt": "Sort", "categories": {"fruit": ["apple"], "veg": "kale|leek"}})))
      .expect("map");
    assert_eq!(a.categories.len(), 2);
    let b = to_classification(&record(json!({"prompt": "Sort", "groups": [{"name": "odd", "items": [1, 3]}]}))).expect("list");
    assert_eq!(b.categories[0].items, vec!["1", "3"]);
  }

  #[test]
  fn visual_identification_requires_a_visual() {
    let err = to_visual_identification(&record(json!({"prompt": "What is this?", "answer": "cat"}))).expect_err("visual");
    assert_eq!(err, ConversionError::MissingField { kind: QuestionKind::VisualIdentification, field: "visual" });
    let b = to_visual_identification(&record(json!({"prompt": "What is this?", "visual": "🐱", "answer": "cat"}))).expect("ok");
    assert_eq!(b.answer, "cat");
  }

  #[test]
  fn visual_identification_requires_an_answer() {
    let err = to_visual_identification(&record(json!({"prompt": "What animal is this?", "visual": "🐱"}))).expect_err("answer");
    assert_eq!(err, ConversionError::MissingField { kind: QuestionKind::VisualIdentification, field: "answer" });
  }

  #[test]
  fn pattern_sequence_from_visual_or_prompt_tail() {
    let a = to_pattern_recognition(&record(json!({"prompt": "What comes next?", "visual": "🔴🔵🔴", "answer": "🔵"})));
    assert_eq!(a.sequence.len(), 3);
    let b = to_pattern_recognition(&record(json!({"prompt": "What comes next: 2, 4, 6, __", "answer": 8})));
    assert_eq!(b.sequence, vec!["2", "4", "6"]);
    assert_eq!(b.answer, "8");
  }

  #[test]
  fn code_completion_needs_code() {
    let b = to_code_completion(&record(json!({"prompt": "Fill", "code": "let x = __;", "lang": "rust", "answer": "5"})))
      .expect("code");
    assert_eq!(b.language, "rust");
    assert_eq!(b.accepted, vec!["5"]);
    assert!(to_code_completion(&record(json!({"prompt": "Fill"}))).is_err());
  }

  #[test]
  fn diagram_labels_from_strings_and_objects() {
    let b = to_diagram_labeling(&record(json!({
      "prompt": "Label the cell", "image": "cell.png",
      "labels": ["nucleus", {"id": "m", "label": "membrane", "x": 0.5, "y": 0.25}]
    })))
    .expect("diagram");
    assert_eq!(b.labels[0].id, "label-1");
    assert_eq!(b.labels[1].x, Some(0.5));
    let err = to_diagram_labeling(&record(json!({"prompt": "Label", "image": "x.png"}))).expect_err("labels");
    assert_eq!(err, ConversionError::MissingField { kind: QuestionKind::DiagramLabeling, field: "labels" });
  }
}

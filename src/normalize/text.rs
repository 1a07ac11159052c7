//! Free-text kinds: fill-in-the-blank, short and long answers, open-ended.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::{Blank, FillBlankBody, LongAnswerBody, OpenEndedBody, ShortAnswerBody};
use crate::raw::{string_list, RawAnswerValue, RawQuestionRecord};

use super::blanks::BlankExtractor;

const MAX_DISTRACTORS: usize = 3;
const STOPWORDS: &[&str] = &[
  "the", "and", "for", "are", "was", "were", "with", "that", "this", "what", "which", "who", "how", "from", "into",
  "has", "have", "its", "you", "your", "our", "they", "them", "fill", "blank", "complete", "sentence",
];

/// Case-insensitive de-duplication, preserving first spelling and order.
pub fn dedup_answers<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for item in items {
    let t = item.trim();
    if !t.is_empty() && !out.iter().any(|x| x.to_lowercase() == t.to_lowercase()) {
      out.push(t.to_string());
    }
  }
  out
}

/// Answer plus alternates, split on `|` and `;`.
pub fn accepted_answers(record: &RawQuestionRecord) -> Vec<String> {
  let primary = record.answer.as_ref().map(RawAnswerValue::as_text).unwrap_or_default();
  let split = primary.split(['|', ';']).map(str::to_string).collect::<Vec<_>>();
  dedup_answers(split.into_iter().chain(record.alternates.iter().cloned()))
}

pub fn to_fill_blank<R: Rng + ?Sized>(
  record: &RawQuestionRecord,
  extractor: &dyn BlankExtractor,
  notes: &mut Vec<String>,
  rng: &mut R,
) -> FillBlankBody {
  let answer = record.answer.as_ref().map(RawAnswerValue::as_text).unwrap_or_default();
  let mut extracted = extractor.extract(&record.prompt, &answer, &record.alternates);

  if let Some(serde_json::Value::Array(lists)) = record.extra_value(&["blanks"]) {
    extracted.blanks = lists
      .iter()
      .enumerate()
      .map(|(index, v)| Blank { index, accepted: string_list(v) })
      .collect();
    notes.push("Blank answers taken from the explicit blanks list".to_string());
  }

  let correct = extracted.blanks.first().and_then(|b| b.accepted.first()).cloned();
  let options = match correct {
    Some(correct) => {
      let mut options = vec![correct.clone()];
      options.extend(distractors(record, &correct, &extracted.blanks));
      options.shuffle(rng);
      options
    }
    None => Vec::new(),
  };
  FillBlankBody { template: extracted.template, blanks: extracted.blanks, options }
}

fn distractors(record: &RawQuestionRecord, correct: &str, blanks: &[Blank]) -> Vec<String> {
  let accepted = |s: &str| blanks.iter().any(|b| b.accepted.iter().any(|a| a.eq_ignore_ascii_case(s)));
  let from_options: Vec<String> = record.option_texts().into_iter().filter(|o| !accepted(o)).collect();
  let pool = if !from_options.is_empty() {
    from_options
  } else if let Ok(n) = correct.trim().parse::<i64>() {
    vec![(n + 1).to_string(), (n - 1).to_string(), (n + 2).to_string()]
  } else {
    record
      .prompt
      .split(|c: char| !c.is_alphanumeric())
      .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.to_lowercase().as_str()) && !accepted(w))
      .map(str::to_string)
      .collect()
  };
  dedup_answers(pool).into_iter().take(MAX_DISTRACTORS).collect()
}

pub fn to_short_answer(record: &RawQuestionRecord, notes: &mut Vec<String>) -> ShortAnswerBody {
  let accepted = accepted_answers(record);
  if accepted.is_empty() {
    notes.push("No accepted answer provided".to_string());
  }
  let case_sensitive = record
    .extra_value(&["caseSensitive", "case_sensitive"])
    .and_then(serde_json::Value::as_bool)
    .unwrap_or(false);
  ShortAnswerBody { accepted, case_sensitive }
}

pub fn to_long_answer(record: &RawQuestionRecord) -> LongAnswerBody {
  let rubric = record.extra_value(&["rubric", "criteria"]).and_then(|v| {
    let parts = string_list(v);
    (!parts.is_empty()).then(|| parts.join("; "))
  });
  let min_words = record
    .extra_value(&["minWords", "min_words"])
    .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
    .map(|n| n.min(u32::MAX as u64) as u32);
  let sample_answer = record
    .extra_text(&["sampleAnswer", "sample_answer"])
    .or_else(|| record.answer.as_ref().map(RawAnswerValue::as_text).filter(|s| !s.is_empty()));
  LongAnswerBody { rubric, min_words, sample_answer }
}

pub fn to_open_ended(record: &RawQuestionRecord) -> OpenEndedBody {
  OpenEndedBody {
    guidance: record.extra_text(&["guidance", "instructions"]),
    sample_answer: record.answer.as_ref().map(RawAnswerValue::as_text).filter(|s| !s.is_empty()),
  }
}

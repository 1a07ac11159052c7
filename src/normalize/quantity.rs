//! Counting and numeric conversion.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use tracing::error;

use crate::domain::{CountingBody, NumericBody};
use crate::raw::{RawAnswerValue, RawQuestionRecord};
use crate::util::{count_glyphs, emoji_glyphs};

/// Answer used when neither the record nor the visual yields a count.
pub const COUNTING_FALLBACK_ANSWER: u32 = 3;
const MAX_COUNT: u32 = 10_000;

static FIRST_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+").expect("int regex"));
static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("number regex"));
static FRACTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(-?\d+)\s*/\s*(\d+)\s*$").expect("fraction regex"));
static UNIT_SUFFIX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^\s*\$?\s*-?[\d,]+(?:\.\d+)?\s*([A-Za-z%°][A-Za-z%°/²³ ]*)\s*$").expect("unit regex"));

const NUMBER_WORDS: &[&str] = &[
  "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven", "twelve",
  "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen", "twenty",
];

/// Non-negative count from a raw answer: numbers, digit strings or number words.
pub fn coerce_count(v: &RawAnswerValue) -> Option<u32> {
  match v {
    RawAnswerValue::Num(n) if n.is_finite() && *n >= 0.0 => Some((n.round() as u32).min(MAX_COUNT)),
    RawAnswerValue::Num(_) | RawAnswerValue::Bool(_) => None,
    RawAnswerValue::Str(s) => {
      if let Some(m) = FIRST_INT.find(s) {
        let n = m.as_str().parse::<i64>().ok()?;
        return (n >= 0).then(|| n.min(MAX_COUNT as i64) as u32);
      }
      let lower = s.to_lowercase();
      lower
        .split(|c: char| !c.is_alphabetic())
        .find_map(|w| NUMBER_WORDS.iter().position(|n| *n == w))
        .map(|i| i as u32)
    }
  }
}

/// Four distinct counts containing `answer`, shuffled.
pub fn synthesize_counting_options<R: Rng + ?Sized>(answer: u32, rng: &mut R) -> Vec<u32> {
  let mut options: Vec<u32> = if answer <= 3 { vec![0, 1, 2, 3] } else { (answer - 2..=answer + 1).collect() };
  options.shuffle(rng);
  options
}

pub fn to_counting<R: Rng + ?Sized>(record: &RawQuestionRecord, notes: &mut Vec<String>, rng: &mut R) -> CountingBody {
  let visual = match record.visual.as_deref().filter(|v| count_glyphs(v) > 0) {
    Some(v) => v.trim().to_string(),
    None => {
      let lifted = emoji_glyphs(&record.prompt).concat();
      if !lifted.is_empty() {
        notes.push("Visual lifted from glyphs embedded in the prompt".to_string());
      }
      lifted
    }
  };

  let stated = record.answer.as_ref().and_then(coerce_count);
  if stated == Some(0) {
    notes.push("Counting answer 0 discarded".to_string());
  }
  let answer = match stated.filter(|n| *n > 0) {
    Some(n) => n,
    None => match count_glyphs(&visual) {
      0 => {
        notes.push(format!("No usable count; answer defaulted to {COUNTING_FALLBACK_ANSWER}"));
        COUNTING_FALLBACK_ANSWER
      }
      n => {
        notes.push("Answer taken from the visual glyph count".to_string());
        n as u32
      }
    },
  };

  let options = synthesize_counting_options(answer, rng);
  CountingBody { visual, answer, options }
}

/// Lenient number parsing: fractions, thousands separators, currency signs
/// and trailing units.
pub fn parse_number_permissive(s: &str) -> Option<f64> {
  if let Some(c) = FRACTION.captures(s) {
    let num: f64 = c[1].parse().ok()?;
    let den: f64 = c[2].parse().ok()?;
    return (den != 0.0).then(|| num / den);
  }
  let cleaned = s.replace(',', "");
  FIRST_NUMBER.find(&cleaned)?.as_str().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn unit_of(s: &str) -> Option<String> {
  UNIT_SUFFIX.captures(s).map(|c| c[1].trim().to_string()).filter(|u| !u.is_empty())
}

pub fn to_numeric(record: &RawQuestionRecord, notes: &mut Vec<String>, default_tolerance: f64) -> NumericBody {
  let (parsed, unit) = match record.answer.as_ref() {
    Some(RawAnswerValue::Num(n)) => (Some(*n), None),
    Some(RawAnswerValue::Str(s)) => (parse_number_permissive(s), unit_of(s)),
    Some(RawAnswerValue::Bool(_)) | None => (None, None),
  };
  let answer = match parsed {
    Some(n) => n,
    None => {
      let shown = record.answer.as_ref().map(RawAnswerValue::as_text).unwrap_or_default();
      error!(target: "question", answer = %shown, prompt = %record.prompt, "Numeric answer unparseable; using 0");
      notes.push(format!("Numeric answer {shown:?} could not be parsed; defaulted to 0"));
      0.0
    }
  };
  let tolerance = record
    .extra_value(&["tolerance"])
    .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(parse_number_permissive)))
    .filter(|t| *t >= 0.0)
    .unwrap_or(default_tolerance);
  let unit = unit.or_else(|| record.extra_text(&["unit", "units"]));
  NumericBody { answer, tolerance, unit }
}

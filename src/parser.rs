//! Best-effort recovery of a JSON object tree from noisy generated text.
//!
//! Flow:
//! 1) Strip BOM / zero-width characters.
//! 2) Extract the fenced code block, or the outermost `{...}` / `[...]` span.
//! 3) Try a direct parse.
//! 4) Apply `REPAIRS` in order (each pure and idempotent), retrying after each.
//! 5) If the text looks truncated, append the minimal closing sequence and retry once.
//!
//! Anything still unparseable becomes a `ParseError`; the caller decides on fallback content.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::ParseError;
use crate::util::trunc_for_log;

static FENCE_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fence regex"));
static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex"));
static BARE_KEY_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_$][A-Za-z0-9_$]*)(\s*:)").expect("bare key regex"));
static UNDEFINED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(undefined|NaN)\b").expect("undefined regex"));

/// A named textual repair.
pub type Repair = (&'static str, fn(&str) -> String);

/// Ordered repair sequence. Order matters: commas before quotes before keys.
pub const REPAIRS: &[Repair] = &[
  ("trailing_commas", remove_trailing_commas),
  ("quotes", normalize_quotes),
  ("bare_keys", quote_bare_keys),
  ("undefined", replace_undefined),
  ("newlines", collapse_newlines),
];

/// Parse one response into a JSON value, repairing as needed.
#[instrument(level = "debug", skip(text), fields(text_len = text.len()))]
pub fn parse_response(text: &str) -> Result<Value, ParseError> {
  let cleaned = strip_invisible(text);
  let candidate = extract_payload(&cleaned);
  if candidate.trim().is_empty() {
    return Err(ParseError::new("empty response", text));
  }

  if let Ok(v) = serde_json::from_str::<Value>(&candidate) {
    return Ok(v);
  }

  let mut repaired = candidate.clone();
  for (name, repair) in REPAIRS {
    repaired = repair(&repaired);
    match serde_json::from_str::<Value>(&repaired) {
      Ok(v) => {
        debug!(target: "question_pipeline", repair = %name, "Parsed after repair");
        return Ok(v);
      }
      Err(_) => continue,
    }
  }

  let trimmed = repaired.trim_end();
  if scan_brackets(trimmed).is_open() {
    let closed = close_truncated(trimmed);
    match serde_json::from_str::<Value>(&closed) {
      Ok(v) => {
        warn!(target: "question_pipeline", "Recovered truncated response by closing open brackets");
        return Ok(v);
      }
      Err(e) => {
        warn!(target: "question_pipeline", error = %e, text = %trunc_for_log(text, 120), "Truncation repair failed");
        return Err(ParseError::new(format!("truncated response could not be closed: {e}"), text));
      }
    }
  }

  let reason = serde_json::from_str::<Value>(&repaired).err().map(|e| e.to_string()).unwrap_or_default();
  warn!(target: "question_pipeline", error = %reason, text = %trunc_for_log(text, 120), "Repairs exhausted");
  Err(ParseError::new(format!("unrepairable JSON: {reason}"), text))
}

/// Parse a response that may hold one record, an array of records, or a wrapper object.
pub fn parse_records(text: &str) -> Result<Vec<Value>, ParseError> {
  match parse_response(text)? {
    Value::Array(items) => Ok(items.into_iter().filter(Value::is_object).collect()),
    Value::Object(mut map) => {
      for key in ["questions", "items", "data"] {
        if let Some(Value::Array(items)) = map.remove(key) {
          return Ok(items.into_iter().filter(Value::is_object).collect());
        }
      }
      Ok(vec![Value::Object(map)])
    }
    _ => Err(ParseError::new("response is not an object or array", text)),
  }
}

pub fn strip_invisible(s: &str) -> String {
  s.chars().filter(|c| !matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}')).collect()
}

/// Inner text of the first fenced block, else the outermost bracketed span.
pub fn extract_payload(s: &str) -> String {
  if let Some(inner) = FENCE_RE.captures(s).and_then(|c| c.get(1)) {
    return inner.as_str().trim().to_string();
  }
  // Unclosed fence: drop the opener and keep the rest.
  let s = match s.find("```") {
    Some(idx) => {
      let rest = &s[idx + 3..];
      rest.find('\n').map(|nl| &rest[nl + 1..]).unwrap_or(rest)
    }
    None => s,
  };
  let start = match s.find(['{', '[']) {
    Some(i) => i,
    None => return s.trim().to_string(),
  };
  // Trailing commentary is only dropped from a balanced span; a truncated
  // payload keeps everything after its last closing bracket.
  let tail = &s[start..];
  match tail.rfind(['}', ']']).map(|e| &tail[..=e]) {
    Some(span) if !scan_brackets(span).is_open() => span.to_string(),
    _ => tail.trim_end().to_string(),
  }
}

/// Apply `f` to every region outside string literals (either quote style).
fn map_outside_strings(s: &str, f: impl Fn(&str) -> String) -> String {
  let mut out = String::with_capacity(s.len());
  let mut plain = String::new();
  let mut chars = s.chars().peekable();
  while let Some(ch) = chars.next() {
    if ch == '"' || ch == '\'' {
      out.push_str(&f(&plain));
      plain.clear();
      out.push(ch);
      let quote = ch;
      while let Some(c) = chars.next() {
        out.push(c);
        if c == '\\' {
          if let Some(esc) = chars.next() {
            out.push(esc);
          }
        } else if c == quote {
          break;
        }
      }
    } else {
      plain.push(ch);
    }
  }
  out.push_str(&f(&plain));
  out
}

pub fn remove_trailing_commas(s: &str) -> String {
  map_outside_strings(s, |seg| TRAILING_COMMA_RE.replace_all(seg, "$1").into_owned())
}

/// Smart quotes become ASCII; single-quoted strings become double-quoted.
pub fn normalize_quotes(s: &str) -> String {
  let ascii: String = s
    .chars()
    .map(|c| match c {
      '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
      '\u{2018}' | '\u{2019}' => '\'',
      other => other,
    })
    .collect();

  let mut out = String::with_capacity(ascii.len());
  let mut chars = ascii.chars().peekable();
  while let Some(ch) = chars.next() {
    match ch {
      '"' => {
        out.push('"');
        while let Some(c) = chars.next() {
          out.push(c);
          if c == '\\' {
            if let Some(esc) = chars.next() {
              out.push(esc);
            }
          } else if c == '"' {
            break;
          }
        }
      }
      '\'' => {
        out.push('"');
        while let Some(c) = chars.next() {
          match c {
            '\\' => match chars.next() {
              Some('\'') => out.push('\''),
              Some(esc) => {
                out.push('\\');
                out.push(esc);
              }
              None => {}
            },
            '\'' => break,
            '"' => out.push_str("\\\""),
            other => out.push(other),
          }
        }
        out.push('"');
      }
      other => out.push(other),
    }
  }
  out
}

pub fn quote_bare_keys(s: &str) -> String {
  map_outside_strings(s, |seg| BARE_KEY_RE.replace_all(seg, "$1\"$2\"$3").into_owned())
}

pub fn replace_undefined(s: &str) -> String {
  map_outside_strings(s, |seg| UNDEFINED_RE.replace_all(seg, "null").into_owned())
}

/// Raw newlines are illegal inside JSON strings; flatten them to spaces.
pub fn collapse_newlines(s: &str) -> String {
  s.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Unmatched openers (as their closers) and string state at the end of `s`.
#[derive(Debug, Default)]
struct BracketScan {
  closers: Vec<char>,
  in_string: bool,
  escaped: bool,
}

impl BracketScan {
  fn is_open(&self) -> bool {
    self.in_string || !self.closers.is_empty()
  }
}

fn scan_brackets(s: &str) -> BracketScan {
  let mut scan = BracketScan::default();
  for ch in s.chars() {
    if scan.in_string {
      if scan.escaped {
        scan.escaped = false;
      } else if ch == '\\' {
        scan.escaped = true;
      } else if ch == '"' {
        scan.in_string = false;
      }
      continue;
    }
    match ch {
      '"' => scan.in_string = true,
      '{' => scan.closers.push('}'),
      '[' => scan.closers.push(']'),
      '}' | ']' => {
        scan.closers.pop();
      }
      _ => {}
    }
  }
  scan
}

/// Close an open string, settle a dangling separator, then close every open bracket.
pub fn close_truncated(s: &str) -> String {
  let BracketScan { closers: mut stack, in_string, escaped } = scan_brackets(s);

  let mut out = s.to_string();
  if in_string {
    if escaped {
      out.pop();
    }
    out.push('"');
  }
  let tail = out.trim_end().to_string();
  out = tail;
  if out.ends_with(',') {
    out.pop();
  } else if out.ends_with(':') {
    out.push_str(" null");
  }
  while let Some(close) = stack.pop() {
    out.push(close);
  }
  out
}

//! Blank extraction for fill-in-the-blank questions.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Blank;

static BLANK_MARKER: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)_{2,}|\[blank\]|\{\{\s*blank(?:_\d+)?\s*\}\}").expect("blank marker regex"));

#[derive(Clone, Debug, PartialEq)]
pub struct BlankTemplate {
  pub template: String,
  pub blanks: Vec<Blank>,
}

/// Turns a prompt plus answer into a `{{blank_i}}` template.
pub trait BlankExtractor: Send + Sync {
  fn extract(&self, prompt: &str, answer: &str, alternates: &[String]) -> BlankTemplate;
}

/// Recognizes `___`, `[blank]` and `{{blank}}` markers; without a marker the
/// answer's first occurrence in the prompt is blanked.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkerBlankExtractor;

pub fn slot(i: usize) -> String {
  format!("{{{{blank_{i}}}}}")
}

impl BlankExtractor for MarkerBlankExtractor {
  fn extract(&self, prompt: &str, answer: &str, alternates: &[String]) -> BlankTemplate {
    let markers = BLANK_MARKER.find_iter(prompt).count();
    if markers > 0 {
      let mut i = 0;
      let template = BLANK_MARKER
        .replace_all(prompt, |_: &regex::Captures| {
          let s = slot(i);
          i += 1;
          s
        })
        .into_owned();
      let blanks = if markers == 1 {
        vec![Blank { index: 0, accepted: accepted_for_single(answer, alternates) }]
      } else {
        let parts: Vec<String> = answer.split([',', ';']).map(|p| p.trim().to_string()).collect();
        (0..markers)
          .map(|index| Blank {
            index,
            accepted: parts.get(index).filter(|p| !p.is_empty()).cloned().into_iter().collect(),
          })
          .collect()
      };
      return BlankTemplate { template, blanks };
    }

    let accepted = accepted_for_single(answer, alternates);
    let template = match find_case_insensitive(prompt, answer.trim()) {
      Some((start, end)) => format!("{}{}{}", &prompt[..start], slot(0), &prompt[end..]),
      None => format!("{} {}", prompt.trim_end(), slot(0)),
    };
    BlankTemplate { template, blanks: vec![Blank { index: 0, accepted }] }
  }
}

fn accepted_for_single(answer: &str, alternates: &[String]) -> Vec<String> {
  let mut accepted: Vec<String> = Vec::new();
  for a in answer.split('|').map(str::trim).chain(alternates.iter().map(|s| s.trim())) {
    if !a.is_empty() && !accepted.iter().any(|x| x.eq_ignore_ascii_case(a)) {
      accepted.push(a.to_string());
    }
  }
  accepted
}

/// Byte range of the first case-insensitive, whole-word occurrence of `needle`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
  let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
  if needle.is_empty() {
    return None;
  }
  let lead = if is_word(needle.chars().next()) { r"\b" } else { "" };
  let trail = if is_word(needle.chars().last()) { r"\b" } else { "" };
  let re = Regex::new(&format!("(?i){lead}{}{trail}", regex::escape(needle))).ok()?;
  re.find(haystack).map(|m| (m.start(), m.end()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn underscores_become_a_slot() {
    let t = MarkerBlankExtractor.extract("The sun is a ____.", "star|Star", &["sun".into()]);
    assert_eq!(t.template, "The sun is a {{blank_0}}.");
    assert_eq!(t.blanks[0].accepted, vec!["star", "sun"]);
  }

  #[test]
  fn several_markers_split_the_answer() {
    let t = MarkerBlankExtractor.extract("__ plus [blank] is {{blank}}", "2, 3, 5", &[]);
    assert_eq!(t.template, "{{blank_0}} plus {{blank_1}} is {{blank_2}}");
    assert_eq!(t.blanks.len(), 3);
    assert_eq!(t.blanks[2].accepted, vec!["5"]);
  }

  #[test]
  fn answer_in_prompt_is_blanked() {
    let t = MarkerBlankExtractor.extract("Paris is the capital of France.", "paris", &[]);
    assert_eq!(t.template, "{{blank_0}} is the capital of France.");
  }

  #[test]
  fn numeric_answer_is_not_blanked_inside_a_longer_number() {
    let t = MarkerBlankExtractor.extract("Which is more: 10 or 1?", "1", &[]);
    assert_eq!(t.template, "Which is more: 10 or {{blank_0}}?");
  }

  #[test]
  fn word_answer_is_not_blanked_inside_another_word() {
    let t = MarkerBlankExtractor.extract("Cats catch mice. A baby cat is a", "cat", &[]);
    assert_eq!(t.template, "Cats catch mice. A baby {{blank_0}} is a");
    let t = MarkerBlankExtractor.extract("Scatter the seeds.", "cat", &[]);
    assert_eq!(t.template, "Scatter the seeds. {{blank_0}}");
  }

  #[test]
  fn slot_is_appended_when_nothing_matches() {
    let t = MarkerBlankExtractor.extract("Complete: 2, 4, 6,", "8", &[]);
    assert_eq!(t.template, "Complete: 2, 4, 6, {{blank_0}}");
    assert_eq!(t.blanks[0].accepted, vec!["8"]);
  }
}

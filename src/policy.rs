//! Which question kinds are appropriate for a (subject, grade) pair.
//!
//! Kinds without a rule are allowed everywhere. Unknown grades skip grade bounds.

use crate::domain::{QuestionContext, QuestionKind, SubjectClass};

#[derive(Clone, Debug)]
pub struct KindRule {
  pub kind: QuestionKind,
  pub denied_subjects: &'static [SubjectClass],
  /// When set, only these subjects may use the kind.
  pub allowed_subjects: Option<&'static [SubjectClass]>,
  pub min_grade: Option<i32>,
  pub max_grade: Option<i32>,
  /// Kind to recommend instead.
  pub suggestion: QuestionKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PolicyViolation {
  pub kind: QuestionKind,
  pub reason: String,
  pub suggestion: QuestionKind,
}

#[derive(Clone, Debug)]
pub struct KindPolicy {
  rules: Vec<KindRule>,
}

impl KindPolicy {
  pub fn new(counting_max_grade: i32) -> Self {
    let rules = vec![
      KindRule {
        kind: QuestionKind::Counting,
        denied_subjects: &[SubjectClass::LanguageArts],
        allowed_subjects: Some(&[SubjectClass::Math, SubjectClass::Science]),
        min_grade: None,
        max_grade: Some(counting_max_grade),
        suggestion: QuestionKind::MultipleChoice,
      },
      KindRule {
        kind: QuestionKind::CodeCompletion,
        denied_subjects: &[],
        allowed_subjects: Some(&[SubjectClass::ComputerScience]),
        min_grade: None,
        max_grade: None,
        suggestion: QuestionKind::ShortAnswer,
      },
      KindRule {
        kind: QuestionKind::LongAnswer,
        denied_subjects: &[],
        allowed_subjects: None,
        min_grade: Some(2),
        max_grade: None,
        suggestion: QuestionKind::ShortAnswer,
      },
    ];
    Self { rules }
  }

  /// `None` when the kind is appropriate for the context.
  pub fn check(&self, kind: QuestionKind, ctx: &QuestionContext) -> Option<PolicyViolation> {
    let subject = ctx.subject_class();
    let grade = ctx.grade_level();
    let rule = self.rules.iter().find(|r| r.kind == kind)?;
    let violation = |reason: String| Some(PolicyViolation { kind, reason, suggestion: rule.suggestion });

    if rule.denied_subjects.contains(&subject) {
      return violation(format!("{kind} is not used for {} content", ctx.subject));
    }
    if let Some(allowed) = rule.allowed_subjects {
      if !allowed.contains(&subject) {
        return violation(format!("{kind} is only used for {}", subject_list(allowed)));
      }
    }
    if let Some(g) = grade {
      if let Some(max) = rule.max_grade {
        if g > max {
          return violation(format!("{kind} is limited to grade {} and below (got {})", grade_label(max), ctx.grade));
        }
      }
      if let Some(min) = rule.min_grade {
        if g < min {
          return violation(format!("{kind} needs grade {} or above (got {})", grade_label(min), ctx.grade));
        }
      }
    }
    None
  }
}

impl Default for KindPolicy {
  fn default() -> Self {
    Self::new(2)
  }
}

fn grade_label(g: i32) -> String {
  match g {
    -1 => "Pre-K".into(),
    0 => "K".into(),
    n => n.to_string(),
  }
}

fn subject_list(subjects: &[SubjectClass]) -> String {
  subjects
    .iter()
    .map(|s| match s {
      SubjectClass::Math => "math",
      SubjectClass::Science => "science",
      SubjectClass::LanguageArts => "language arts",
      SubjectClass::SocialStudies => "social studies",
      SubjectClass::ComputerScience => "computer science",
      SubjectClass::Other => "other",
    })
    .collect::<Vec<_>>()
    .join(" or ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counting_is_never_allowed_for_language_arts() {
    let policy = KindPolicy::default();
    let v = policy.check(QuestionKind::Counting, &QuestionContext::new("ELA", "K", "phonics")).expect("violation");
    assert_eq!(v.suggestion, QuestionKind::MultipleChoice);
  }

  #[test]
  fn counting_is_limited_to_low_grades_in_math() {
    let policy = KindPolicy::default();
    assert!(policy.check(QuestionKind::Counting, &QuestionContext::new("Math", "K", "")).is_none());
    assert!(policy.check(QuestionKind::Counting, &QuestionContext::new("Math", "2", "")).is_none());
    assert!(policy.check(QuestionKind::Counting, &QuestionContext::new("Math", "5", "")).is_some());
    assert!(policy.check(QuestionKind::Counting, &QuestionContext::new("Math", "??", "")).is_none());
  }

  #[test]
  fn configured_band_moves_the_limit() {
    let policy = KindPolicy::new(4);
    assert!(policy.check(QuestionKind::Counting, &QuestionContext::new("Math", "4", "")).is_none());
  }

  #[test]
  fn unruled_kinds_are_always_allowed() {
    let policy = KindPolicy::default();
    assert!(policy.check(QuestionKind::MultipleChoice, &QuestionContext::new("History", "7", "")).is_none());
    assert!(policy.check(QuestionKind::CodeCompletion, &QuestionContext::new("Computer Science", "9", "")).is_none());
    assert!(policy.check(QuestionKind::LongAnswer, &QuestionContext::new("ELA", "1", "")).is_some());
  }
}

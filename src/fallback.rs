//! Built-in content served when generation output cannot be parsed.
//!
//! Deterministic per subject and already consistent, so it passes validation as-is.

use std::collections::BTreeSet;

use crate::domain::{
  CanonicalQuestion, ChoiceOption, CountingBody, Difficulty, InferenceSource, MultipleChoiceBody, NumericBody,
  QuestionBody, QuestionContext, QuestionMetadata, SubjectClass,
};
use crate::normalize::choice::option_id;
use crate::normalize::IdGenerator;

/// Absolute last-resort question for a context.
pub fn fallback_question(ctx: &QuestionContext, ids: &IdGenerator, counting_max_grade: i32) -> CanonicalQuestion {
  let low_band = ctx.grade_level().map(|g| g <= counting_max_grade).unwrap_or(true);
  let (prompt, body) = match ctx.subject_class() {
    SubjectClass::Math if low_band => (
      "How many apples are there?",
      QuestionBody::Counting(CountingBody { visual: "🍎🍎🍎".into(), answer: 3, options: vec![0, 1, 2, 3] }),
    ),
    SubjectClass::Math => ("What is 2 + 3?", QuestionBody::Numeric(NumericBody { answer: 5.0, tolerance: 0.01, unit: None })),
    _ => (
      "Which of these is a fruit?",
      QuestionBody::MultipleChoice(MultipleChoiceBody {
        options: ["Apple", "Chair", "Shoe", "Rock"]
          .iter()
          .enumerate()
          .map(|(i, t)| ChoiceOption { id: option_id(i), text: t.to_string(), is_correct: i == 0 })
          .collect(),
        correct_index: 0,
        visual: None,
      }),
    ),
  };

  CanonicalQuestion {
    id: ids.next_id(),
    prompt_text: prompt.into(),
    topic: ctx.skill_name.clone(),
    subject: ctx.subject.clone(),
    difficulty: Difficulty::Easy,
    points: 1,
    explanation: None,
    hint: None,
    metadata: QuestionMetadata {
      grade: ctx.grade.clone(),
      skill_name: ctx.skill_name.clone(),
      inferred_by: InferenceSource::Fallback,
      matched_pattern: None,
      original_kind_tag: None,
      notes: vec!["Built-in fallback content".into()],
      corrections: BTreeSet::new(),
    },
    body,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuestionKind;
  use crate::raw::RawQuestionRecord;
  use crate::validator::ConsistencyValidator;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn kind_follows_subject_and_grade() {
    let ids = IdGenerator::default();
    assert_eq!(fallback_question(&QuestionContext::new("Math", "K", "count"), &ids, 2).kind(), QuestionKind::Counting);
    assert_eq!(fallback_question(&QuestionContext::new("Math", "6", "add"), &ids, 2).kind(), QuestionKind::Numeric);
    assert_eq!(fallback_question(&QuestionContext::new("ELA", "K", "read"), &ids, 2).kind(), QuestionKind::MultipleChoice);
  }

  #[test]
  fn fallback_content_is_already_valid() {
    let ids = IdGenerator::default();
    let v = ConsistencyValidator::default();
    for ctx in [
      QuestionContext::new("Math", "1", "count"),
      QuestionContext::new("Math", "8", "add"),
      QuestionContext::new("Science", "3", "plants"),
    ] {
      let mut q = fallback_question(&ctx, &ids, 2);
      let before = q.clone();
      let res = v.validate(&mut q, &RawQuestionRecord::default(), &ctx, &mut StdRng::seed_from_u64(1));
      assert!(res.valid, "{ctx:?}: {res:?}");
      assert!(res.warnings.is_empty(), "{ctx:?}: {res:?}");
      assert_eq!(q, before);
    }
  }
}

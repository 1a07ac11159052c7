//! Domain models: question kinds, request context, and the canonical question union.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical question kind. The snake_case name is the discriminator
/// rendering and grading switch on.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  MultipleChoice,
  TrueFalse,
  Counting,
  Numeric,
  FillBlank,
  ShortAnswer,
  LongAnswer,
  Matching,
  Ordering,
  Classification,
  VisualIdentification,
  PatternRecognition,
  CodeCompletion,
  DiagramLabeling,
  OpenEnded,
}

impl QuestionKind {
  pub const ALL: [QuestionKind; 15] = [
    QuestionKind::MultipleChoice,
    QuestionKind::TrueFalse,
    QuestionKind::Counting,
    QuestionKind::Numeric,
    QuestionKind::FillBlank,
    QuestionKind::ShortAnswer,
    QuestionKind::LongAnswer,
    QuestionKind::Matching,
    QuestionKind::Ordering,
    QuestionKind::Classification,
    QuestionKind::VisualIdentification,
    QuestionKind::PatternRecognition,
    QuestionKind::CodeCompletion,
    QuestionKind::DiagramLabeling,
    QuestionKind::OpenEnded,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      QuestionKind::MultipleChoice => "multiple_choice",
      QuestionKind::TrueFalse => "true_false",
      QuestionKind::Counting => "counting",
      QuestionKind::Numeric => "numeric",
      QuestionKind::FillBlank => "fill_blank",
      QuestionKind::ShortAnswer => "short_answer",
      QuestionKind::LongAnswer => "long_answer",
      QuestionKind::Matching => "matching",
      QuestionKind::Ordering => "ordering",
      QuestionKind::Classification => "classification",
      QuestionKind::VisualIdentification => "visual_identification",
      QuestionKind::PatternRecognition => "pattern_recognition",
      QuestionKind::CodeCompletion => "code_completion",
      QuestionKind::DiagramLabeling => "diagram_labeling",
      QuestionKind::OpenEnded => "open_ended",
    }
  }

  /// Resolve a loosely written type tag ("MCQ", "true/false", "fill-in-the-blank", ...).
  pub fn from_tag(tag: &str) -> Option<Self> {
    let norm: String = tag
      .trim()
      .to_lowercase()
      .chars()
      .map(|c| if matches!(c, '-' | ' ' | '/') { '_' } else { c })
      .collect();
    let kind = match norm.as_str() {
      "multiple_choice" | "multiplechoice" | "mcq" | "mc" | "multiple" | "choice" => QuestionKind::MultipleChoice,
      "true_false" | "truefalse" | "true_or_false" | "tf" | "t_f" | "boolean" | "yes_no" => QuestionKind::TrueFalse,
      "counting" | "count" => QuestionKind::Counting,
      "numeric" | "number" | "numerical" | "calculation" => QuestionKind::Numeric,
      "fill_blank" | "fill_in_the_blank" | "fill_in_blank" | "fillblank" | "fill_in" | "cloze" => QuestionKind::FillBlank,
      "short_answer" | "shortanswer" | "short" => QuestionKind::ShortAnswer,
      "long_answer" | "longanswer" | "essay" | "paragraph" => QuestionKind::LongAnswer,
      "matching" | "match" => QuestionKind::Matching,
      "ordering" | "order" | "sequencing" | "sequence" => QuestionKind::Ordering,
      "classification" | "classify" | "categorize" | "categorization" | "sorting" => QuestionKind::Classification,
      "visual_identification" | "visualidentification" | "identify" | "image_identification" => {
        QuestionKind::VisualIdentification
      }
      "pattern_recognition" | "patternrecognition" | "pattern" | "patterns" => QuestionKind::PatternRecognition,
      "code_completion" | "codecompletion" | "code" | "coding" => QuestionKind::CodeCompletion,
      "diagram_labeling" | "diagram_labelling" | "diagramlabeling" | "labeling" | "diagram" => {
        QuestionKind::DiagramLabeling
      }
      "open_ended" | "openended" | "open" | "free_response" => QuestionKind::OpenEnded,
      _ => return None,
    };
    Some(kind)
  }
}

impl fmt::Display for QuestionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Coarse subject classes used by the kind policy table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectClass {
  Math,
  Science,
  LanguageArts,
  SocialStudies,
  ComputerScience,
  Other,
}

impl SubjectClass {
  pub fn from_label(label: &str) -> Self {
    let s = label.trim().to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| s.contains(k));
    if has(&["computer", "coding", "programming"]) || s == "cs" {
      SubjectClass::ComputerScience
    } else if has(&["math", "arithmetic", "algebra", "geometry", "number"]) {
      SubjectClass::Math
    } else if has(&["science", "biology", "physics", "chemistry"]) {
      SubjectClass::Science
    } else if has(&["english", "reading", "language", "writing", "phonics", "grammar", "spelling", "literacy"])
      || s == "ela"
    {
      SubjectClass::LanguageArts
    } else if has(&["social", "history", "geography", "civics"]) {
      SubjectClass::SocialStudies
    } else {
      SubjectClass::Other
    }
  }
}

/// Caller-supplied context for one conversion.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionContext {
  #[serde(default)]
  pub subject: String,
  #[serde(default)]
  pub grade: String,
  #[serde(default, alias = "skill_name")]
  pub skill_name: String,
}

impl QuestionContext {
  pub fn new(subject: impl Into<String>, grade: impl Into<String>, skill_name: impl Into<String>) -> Self {
    Self { subject: subject.into(), grade: grade.into(), skill_name: skill_name.into() }
  }

  pub fn subject_class(&self) -> SubjectClass {
    SubjectClass::from_label(&self.subject)
  }

  /// Numeric grade level: K = 0, Pre-K = -1. None when unrecognized.
  pub fn grade_level(&self) -> Option<i32> {
    parse_grade(&self.grade)
  }
}

pub fn parse_grade(grade: &str) -> Option<i32> {
  let g = grade.trim().to_lowercase();
  let compact: String = g.chars().filter(|c| c.is_alphanumeric()).collect();
  match compact.as_str() {
    "prek" | "pk" | "preschool" => return Some(-1),
    "k" | "kg" | "kindergarten" | "gradek" => return Some(0),
    _ => {}
  }
  let digits: String = g.chars().skip_while(|c| !c.is_ascii_digit()).take_while(|c| c.is_ascii_digit()).collect();
  digits.parse::<i32>().ok().filter(|n| (0..=12).contains(n))
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

impl Difficulty {
  pub fn from_label(label: &str) -> Self {
    match label.trim().to_lowercase().as_str() {
      "easy" | "beginner" | "simple" | "1" => Difficulty::Easy,
      "hard" | "advanced" | "challenging" | "difficult" | "3" => Difficulty::Hard,
      _ => Difficulty::Medium,
    }
  }
}

/// Which inference rule decided the kind.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InferenceSource {
  LiteralGuard,
  ExplicitTag,
  Pattern,
  Structural,
  /// Built-in content substituted when generation output was unusable.
  Fallback,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMetadata {
  pub grade: String,
  pub skill_name: String,
  pub inferred_by: InferenceSource,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub matched_pattern: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub original_kind_tag: Option<String>,
  /// Normalization notes (defaults taken, fields lifted).
  #[serde(default)]
  pub notes: Vec<String>,
  /// Correction codes already applied by the validator.
  #[serde(default)]
  pub corrections: BTreeSet<String>,
}

/// The normalized, strongly-typed question. `body` carries the `kind` tag.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalQuestion {
  pub id: String,
  pub prompt_text: String,
  pub topic: String,
  pub subject: String,
  pub difficulty: Difficulty,
  pub points: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hint: Option<String>,
  pub metadata: QuestionMetadata,
  #[serde(flatten)]
  pub body: QuestionBody,
}

impl CanonicalQuestion {
  pub fn kind(&self) -> QuestionKind {
    self.body.kind()
  }

  /// Separate visual field, for kinds that carry one.
  pub fn visual(&self) -> Option<&str> {
    match &self.body {
      QuestionBody::MultipleChoice(b) => b.visual.as_deref(),
      QuestionBody::TrueFalse(b) => b.visual.as_deref(),
      QuestionBody::Counting(b) => Some(b.visual.as_str()),
      QuestionBody::VisualIdentification(b) => Some(b.visual.as_str()),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionBody {
  MultipleChoice(MultipleChoiceBody),
  TrueFalse(TrueFalseBody),
  Counting(CountingBody),
  Numeric(NumericBody),
  FillBlank(FillBlankBody),
  ShortAnswer(ShortAnswerBody),
  LongAnswer(LongAnswerBody),
  Matching(MatchingBody),
  Ordering(OrderingBody),
  Classification(ClassificationBody),
  VisualIdentification(VisualIdentificationBody),
  PatternRecognition(PatternRecognitionBody),
  CodeCompletion(CodeCompletionBody),
  DiagramLabeling(DiagramLabelingBody),
  OpenEnded(OpenEndedBody),
}

impl QuestionBody {
  pub fn kind(&self) -> QuestionKind {
    match self {
      QuestionBody::MultipleChoice(_) => QuestionKind::MultipleChoice,
      QuestionBody::TrueFalse(_) => QuestionKind::TrueFalse,
      QuestionBody::Counting(_) => QuestionKind::Counting,
      QuestionBody::Numeric(_) => QuestionKind::Numeric,
      QuestionBody::FillBlank(_) => QuestionKind::FillBlank,
      QuestionBody::ShortAnswer(_) => QuestionKind::ShortAnswer,
      QuestionBody::LongAnswer(_) => QuestionKind::LongAnswer,
      QuestionBody::Matching(_) => QuestionKind::Matching,
      QuestionBody::Ordering(_) => QuestionKind::Ordering,
      QuestionBody::Classification(_) => QuestionKind::Classification,
      QuestionBody::VisualIdentification(_) => QuestionKind::VisualIdentification,
      QuestionBody::PatternRecognition(_) => QuestionKind::PatternRecognition,
      QuestionBody::CodeCompletion(_) => QuestionKind::CodeCompletion,
      QuestionBody::DiagramLabeling(_) => QuestionKind::DiagramLabeling,
      QuestionBody::OpenEnded(_) => QuestionKind::OpenEnded,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
  pub id: String,
  pub text: String,
  pub is_correct: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceBody {
  pub options: Vec<ChoiceOption>,
  pub correct_index: usize,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub visual: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrueFalseBody {
  pub statement: String,
  pub answer: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub visual: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountingBody {
  pub visual: String,
  pub answer: u32,
  pub options: Vec<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NumericBody {
  pub answer: f64,
  pub tolerance: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unit: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blank {
  pub index: usize,
  pub accepted: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FillBlankBody {
  /// Prompt with `{{blank_i}}` slots.
  pub template: String,
  pub blanks: Vec<Blank>,
  pub options: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShortAnswerBody {
  pub accepted: Vec<String>,
  pub case_sensitive: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LongAnswerBody {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rubric: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub min_words: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sample_answer: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MatchPair {
  pub left: String,
  pub right: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MatchingBody {
  pub pairs: Vec<MatchPair>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderingBody {
  /// Items in their correct order.
  pub items: Vec<String>,
  /// Same items in display order.
  pub display: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Category {
  pub name: String,
  pub items: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassificationBody {
  pub categories: Vec<Category>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VisualIdentificationBody {
  pub visual: String,
  pub answer: String,
  pub options: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatternRecognitionBody {
  pub sequence: Vec<String>,
  pub answer: String,
  pub options: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CodeCompletionBody {
  pub language: String,
  pub code: String,
  pub accepted: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DiagramLabel {
  pub id: String,
  pub text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub x: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub y: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DiagramLabelingBody {
  pub image: String,
  pub labels: Vec<DiagramLabel>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenEndedBody {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub guidance: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sample_answer: Option<String>,
}

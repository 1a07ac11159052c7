//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Records travel as raw JSON values; the pipeline does the lenient reading.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::QuestionContext;
use crate::inference::Inference;
use crate::pipeline::ProcessedQuestion;
use crate::reporter::{ValidationLogEntry, ValidationStatistics};
use crate::validator::ValidationResult;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Normalize(NormalizeIn),
    Convert(RecordIn),
    Infer(RecordIn),
    Validate(ValidateIn),
    Stats,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Normalized(NormalizeOut),
    Converted {
        question: Box<ProcessedQuestion>,
    },
    Inferred {
        inference: Inference,
    },
    Validation {
        result: ValidationResult,
    },
    Stats {
        stats: ValidationStatistics,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        validation: Option<ValidationResult>,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct NormalizeIn {
    /// Raw generated text: one object, an array, or a `{questions: [...]}` wrapper.
    pub text: String,
    #[serde(default)]
    pub context: QuestionContext,
}

#[derive(Debug, Serialize)]
pub struct NormalizeOut {
    /// "pipeline" or "fallback".
    pub source: &'static str,
    pub questions: Vec<ProcessedQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordIn {
    pub record: Value,
    #[serde(default)]
    pub context: QuestionContext,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateIn {
    pub record: Value,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, alias = "skill_name")]
    pub skill_name: Option<String>,
}

impl ValidateIn {
    pub fn context(&self) -> QuestionContext {
        QuestionContext::new(
            self.subject.clone().unwrap_or_default(),
            self.grade.clone(),
            self.skill_name.clone().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct RecentOut {
    pub entries: Vec<ValidationLogEntry>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub strict: bool,
    pub patterns: usize,
}

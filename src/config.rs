//! Loading pipeline configuration (settings + extra detection patterns) from TOML.
//!
//! See `PipelineConfig` and `PipelineSettings` for expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::QuestionKind;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineConfig {
  #[serde(default)]
  pub pipeline: PipelineSettings,
  #[serde(default)]
  pub patterns: Vec<PatternCfg>,
}

/// Extra detection pattern accepted in TOML configuration.
/// Configured patterns carry no predicate: the regex alone decides.
#[derive(Clone, Debug, Deserialize)]
pub struct PatternCfg {
  pub name: String,
  pub pattern: String,
  pub kind: QuestionKind,
  pub priority: u32,
}

/// Tunables for normalization, validation and reporting.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
  /// Turn validation errors into a hard failure instead of best-effort output.
  pub strict: bool,
  /// Absolute tolerance attached to numeric answers.
  pub numeric_tolerance: f64,
  /// Capacity of the rolling validation log.
  pub log_capacity: usize,
  /// How many issues `statistics` reports.
  pub top_issues: usize,
  /// Highest grade where counting questions are appropriate.
  pub counting_max_grade: i32,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      strict: false,
      numeric_tolerance: 0.01,
      log_capacity: 500,
      top_issues: 10,
      counting_max_grade: 2,
    }
  }
}

/// Attempt to load `PipelineConfig` from PIPELINE_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_pipeline_config_from_env() -> Option<PipelineConfig> {
  let path = std::env::var("PIPELINE_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_pipeline_config(&s) {
      Ok(cfg) => {
        info!(target: "question_pipeline", %path, patterns = cfg.patterns.len(), "Loaded pipeline config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "question_pipeline", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "question_pipeline", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_pipeline_config(s: &str) -> Result<PipelineConfig, toml::de::Error> {
  toml::from_str::<PipelineConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_toml_yields_defaults() {
    let cfg = parse_pipeline_config("").expect("empty config");
    assert!(!cfg.pipeline.strict);
    assert_eq!(cfg.pipeline.log_capacity, 500);
    assert!(cfg.patterns.is_empty());
  }

  #[test]
  fn partial_settings_and_patterns() {
    let cfg = parse_pipeline_config(
      r#"
        [pipeline]
        strict = true
        counting_max_grade = 1

        [[patterns]]
        name = "rank"
        pattern = "(?i)rank these"
        kind = "ordering"
        priority = 22
      "#,
    )
    .expect("config");
    assert!(cfg.pipeline.strict);
    assert_eq!(cfg.pipeline.counting_max_grade, 1);
    assert_eq!(cfg.pipeline.numeric_tolerance, 0.01);
    assert_eq!(cfg.patterns[0].kind, QuestionKind::Ordering);
  }

  #[test]
  fn unknown_kind_is_rejected() {
    let err = parse_pipeline_config("[[patterns]]\nname='x'\npattern='y'\nkind='riddle'\npriority=1");
    assert!(err.is_err());
  }
}

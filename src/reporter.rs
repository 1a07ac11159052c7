//! In-memory validation telemetry: a bounded rolling log plus lifetime counters.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::domain::{CanonicalQuestion, QuestionKind};
use crate::raw::RawQuestionRecord;
use crate::validator::ValidationResult;

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digits regex"));

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationLogEntry {
  pub timestamp: DateTime<Utc>,
  pub original: RawQuestionRecord,
  /// Absent when conversion failed.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub corrected: Option<CanonicalQuestion>,
  pub issues: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kind_transition: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct IssueCount {
  pub issue: String,
  pub count: u64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatistics {
  pub total_validations: u64,
  pub kind_mismatches: u64,
  pub most_common_issues: Vec<IssueCount>,
  /// `"from->to"` → count.
  pub kind_corrections: BTreeMap<String, u64>,
}

#[derive(Debug)]
pub struct ValidationReporter {
  capacity: usize,
  log: Mutex<VecDeque<ValidationLogEntry>>,
  total_validations: AtomicU64,
  kind_mismatches: AtomicU64,
}

impl ValidationReporter {
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      capacity,
      log: Mutex::new(VecDeque::with_capacity(capacity)),
      total_validations: AtomicU64::new(0),
      kind_mismatches: AtomicU64::new(0),
    }
  }

  fn entries(&self) -> std::sync::MutexGuard<'_, VecDeque<ValidationLogEntry>> {
    // A panic while holding the lock leaves the deque itself intact.
    self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  pub fn record(&self, original: &RawQuestionRecord, corrected: Option<&CanonicalQuestion>, result: &ValidationResult) {
    self.total_validations.fetch_add(1, Ordering::Relaxed);
    let kind_transition = result.corrected_kind.map(|to| {
      self.kind_mismatches.fetch_add(1, Ordering::Relaxed);
      let from = original
        .kind_tag
        .as_deref()
        .map(|t| QuestionKind::from_tag(t).map(|k| k.to_string()).unwrap_or_else(|| t.to_string()))
        .unwrap_or_else(|| "untagged".to_string());
      format!("{from}->{to}")
    });

    let entry = ValidationLogEntry {
      timestamp: Utc::now(),
      original: original.clone(),
      corrected: corrected.cloned(),
      issues: result.issues(),
      kind_transition,
    };
    let mut log = self.entries();
    if log.len() == self.capacity {
      log.pop_front();
    }
    log.push_back(entry);
    debug!(target: "question_pipeline", buffered = log.len(), "Validation recorded");
  }

  /// Counters are lifetime totals; issue and correction tables cover the buffered entries.
  pub fn statistics(&self, top_n: usize) -> ValidationStatistics {
    let log = self.entries();
    let mut issues: HashMap<String, u64> = HashMap::new();
    let mut kind_corrections: BTreeMap<String, u64> = BTreeMap::new();
    for entry in log.iter() {
      for issue in &entry.issues {
        *issues.entry(DIGITS.replace_all(issue, "N").into_owned()).or_default() += 1;
      }
      if let Some(t) = &entry.kind_transition {
        *kind_corrections.entry(t.clone()).or_default() += 1;
      }
    }
    let mut most_common_issues: Vec<IssueCount> =
      issues.into_iter().map(|(issue, count)| IssueCount { issue, count }).collect();
    most_common_issues.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.issue.cmp(&b.issue)));
    most_common_issues.truncate(top_n);

    ValidationStatistics {
      total_validations: self.total_validations.load(Ordering::Relaxed),
      kind_mismatches: self.kind_mismatches.load(Ordering::Relaxed),
      most_common_issues,
      kind_corrections,
    }
  }

  /// Latest entries, newest first.
  pub fn recent(&self, limit: usize) -> Vec<ValidationLogEntry> {
    self.entries().iter().rev().take(limit).cloned().collect()
  }
}

impl Default for ValidationReporter {
  fn default() -> Self {
    Self::new(500)
  }
}

//! Recent question/answer log kept in memory for `/api/records`.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{AnswerResult, AnswerSource, QuestionQuery, QuestionType};

pub const RECORD_CAPACITY: usize = 100;

#[derive(Clone, Debug, Serialize)]
pub struct QaRecord {
  pub id: Uuid,
  pub time: DateTime<Utc>,
  pub question: String,
  #[serde(rename = "type")]
  pub kind: QuestionType,
  pub options: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub context: Option<String>,
  pub answer: String,
  pub source: AnswerSource,
}

impl QaRecord {
  pub fn new(query: &QuestionQuery, result: &AnswerResult) -> Self {
    Self {
      id: Uuid::new_v4(),
      time: Utc::now(),
      question: query.title.clone(),
      kind: query.kind,
      options: query.options.clone(),
      context: query.context.clone(),
      answer: result.answer.clone(),
      source: result.source.clone(),
    }
  }
}

/// Fixed-capacity ring; pushing past capacity drops the oldest record.
pub struct RecordLog {
  inner: RwLock<VecDeque<QaRecord>>,
  capacity: usize,
}

impl RecordLog {
  pub fn new(capacity: usize) -> Self {
    Self { inner: RwLock::new(VecDeque::with_capacity(capacity)), capacity: capacity.max(1) }
  }

  pub async fn push(&self, record: QaRecord) {
    let mut inner = self.inner.write().await;
    while inner.len() >= self.capacity {
      inner.pop_front();
    }
    inner.push_back(record);
  }

  /// Oldest first.
  pub async fn snapshot(&self) -> Vec<QaRecord> {
    self.inner.read().await.iter().cloned().collect()
  }
}

impl Default for RecordLog {
  fn default() -> Self {
    Self::new(RECORD_CAPACITY)
  }
}

//! Domain models used by the backend: question types, the immutable query,
//! parsed choice options and the answer result handed back to callers.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::QueryError;

/// What kind of question is being asked?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
  Single,
  Multiple,
  Judgement,
  Completion,
  #[default]
  Unspecified,
}

impl QuestionType {
  /// Parse the wire name. Empty input means "unspecified"; unknown names yield None.
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "" | "unspecified" => Some(Self::Unspecified),
      "single" => Some(Self::Single),
      "multiple" => Some(Self::Multiple),
      "judgement" | "judgment" => Some(Self::Judgement),
      "completion" => Some(Self::Completion),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Single => "single",
      Self::Multiple => "multiple",
      Self::Judgement => "judgement",
      Self::Completion => "completion",
      Self::Unspecified => "unspecified",
    }
  }

  /// Human label used inside prompts.
  pub fn label_zh(&self) -> &'static str {
    match self {
      Self::Single => "单选题",
      Self::Multiple => "多选题",
      Self::Judgement => "判断题",
      Self::Completion => "填空题",
      Self::Unspecified => "未指定类型",
    }
  }
}

impl fmt::Display for QuestionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One incoming question. Built once per request and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionQuery {
  pub title: String,
  pub kind: QuestionType,
  /// Raw options text as received (line-delimited, inline-labeled or a JSON array).
  pub options: String,
  pub context: Option<String>,
  /// Only used to fill external database templates.
  pub course: Option<String>,
}

impl QuestionQuery {
  pub fn new(
    title: impl Into<String>,
    kind: QuestionType,
    options: impl Into<String>,
    context: Option<String>,
    course: Option<String>,
  ) -> Result<Self, QueryError> {
    let title = title.into();
    if title.trim().is_empty() {
      return Err(QueryError::EmptyTitle);
    }
    Ok(Self {
      title,
      kind,
      options: options.into(),
      context: context.filter(|c| !c.trim().is_empty()),
      course: course.filter(|c| !c.trim().is_empty()),
    })
  }

  /// Parsed view of `options`.
  pub fn choices(&self) -> Vec<ChoiceOption> {
    parse_options(&self.options)
  }
}

/// A single answer choice, optionally carrying its letter label ("A", "B", ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceOption {
  pub label: Option<String>,
  pub text: String,
}

static LINE_LABEL: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^[(（]?([A-Z])\s*[.、:：．)）]\s*(.+)$").expect("valid regex")
});

static INLINE_LABEL: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?:^|\s)[(（]?([A-H])\s*[.、:：．)）]\s*").expect("valid regex")
});

/// Split a raw options blob into individual choices.
pub fn parse_options(raw: &str) -> Vec<ChoiceOption> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Vec::new();
  }

  if raw.starts_with('[') {
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
      return list
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|text| ChoiceOption { label: None, text })
        .collect();
    }
  }

  let lines: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
  if lines.len() > 1 {
    return lines.into_iter().map(split_line_label).collect();
  }

  let inline = split_inline_labels(raw);
  if inline.len() > 1 {
    return inline;
  }
  vec![split_line_label(raw)]
}

fn split_line_label(line: &str) -> ChoiceOption {
  match LINE_LABEL.captures(line) {
    Some(c) => ChoiceOption {
      label: Some(c[1].to_string()),
      text: c[2].trim().to_string(),
    },
    None => ChoiceOption { label: None, text: line.to_string() },
  }
}

fn split_inline_labels(line: &str) -> Vec<ChoiceOption> {
  let marks: Vec<(usize, usize, String)> = INLINE_LABEL
    .captures_iter(line)
    .filter_map(|c| {
      let whole = c.get(0)?;
      Some((whole.start(), whole.end(), c[1].to_string()))
    })
    .collect();

  let mut out = Vec::with_capacity(marks.len());
  for (i, (_, body_start, label)) in marks.iter().enumerate() {
    let body_end = marks.get(i + 1).map(|m| m.0).unwrap_or(line.len());
    let text = line[*body_start..body_end].trim();
    if !text.is_empty() {
      out.push(ChoiceOption { label: Some(label.clone()), text: text.to_string() });
    }
  }
  out
}

/// Which component produced an answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerSource {
  Cache,
  External(String),
  Ai,
}

impl fmt::Display for AnswerSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Cache => f.write_str("cache"),
      Self::External(name) => write!(f, "external:{name}"),
      Self::Ai => f.write_str("ai"),
    }
  }
}

impl Serialize for AnswerSource {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// Outcome of a resolution. Multiple-choice answers are joined by `#`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AnswerResult {
  pub found: bool,
  pub question: String,
  pub answer: String,
  pub source: AnswerSource,
}

impl AnswerResult {
  pub fn found(question: impl Into<String>, answer: impl Into<String>, source: AnswerSource) -> Self {
    Self { found: true, question: question.into(), answer: answer.into(), source }
  }
}

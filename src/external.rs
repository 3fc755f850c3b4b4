//! External question-bank lookups.
//!
//! Every enabled database is queried concurrently with its own timeout; the
//! first structurally valid answer wins and the remaining calls are aborted.
//! Any per-database failure (network, timeout, status, body, "not found"
//! replies) only removes that database from the race.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::ai::answer::{match_choice, select_multiple};
use crate::domain::{AnswerResult, AnswerSource, ChoiceOption, QuestionQuery, QuestionType};
use crate::error::ExternalDbError;
use crate::util::{collapse_whitespace, fill_placeholders, trunc_for_log};

/// Root of the external database JSON file.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExternalDatabaseFile {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Per-call timeout in seconds; overrides the environment default.
  #[serde(default)]
  pub timeout: Option<u64>,
  #[serde(default)]
  pub databases: Vec<ExternalDatabase>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
  Get,
  Post,
}

impl<'de> Deserialize<'de> for HttpMethodLenient {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(d)?;
    match raw.to_ascii_lowercase().as_str() {
      "get" => Ok(Self(HttpMethod::Get)),
      "post" => Ok(Self(HttpMethod::Post)),
      other => Err(serde::de::Error::custom(format!("unsupported method '{other}'"))),
    }
  }
}

/// Case-insensitive wrapper so "GET", "get" and "Get" are all accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpMethodLenient(pub HttpMethod);

impl Default for HttpMethodLenient {
  fn default() -> Self {
    Self(HttpMethod::Get)
  }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
  #[default]
  Json,
  Form,
}

/// How a database's JSON reply is read.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseAdapter {
  /// `answer` / `data.answer` / string `data`, with optional `question`.
  #[default]
  Generic,
  /// `{code, data: {question, answer}}`; `code == 0` means no answer.
  Enncy,
  /// `{code, data, msg}`; `code == 1` means `data` holds the answer.
  Icodef,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExternalDatabase {
  pub name: String,
  pub url: String,
  #[serde(default)]
  pub method: HttpMethodLenient,
  #[serde(default)]
  pub data: Map<String, Value>,
  #[serde(default)]
  pub headers: HashMap<String, String>,
  #[serde(default, rename = "contentType", alias = "content_type")]
  pub content_type: BodyEncoding,
  #[serde(default)]
  pub adapter: ResponseAdapter,
  #[serde(default = "default_true")]
  pub enabled: bool,
}

fn default_true() -> bool {
  true
}

/// A raw answer extracted from one database reply, before validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalHit {
  pub question: Option<String>,
  pub answer: String,
}

#[derive(Clone)]
pub struct ExternalDbClient {
  client: reqwest::Client,
  databases: Arc<Vec<Arc<ExternalDatabase>>>,
  timeout: Duration,
}

impl ExternalDbClient {
  /// Returns None when the feature is disabled globally or nothing is enabled.
  pub fn from_file(file: ExternalDatabaseFile, default_timeout: Duration) -> Option<Self> {
    if !file.enabled {
      info!(target: "edubrain_backend", "External databases disabled in config file");
      return None;
    }
    let databases: Vec<Arc<ExternalDatabase>> =
      file.databases.into_iter().filter(|d| d.enabled).map(Arc::new).collect();
    if databases.is_empty() {
      return None;
    }
    let timeout = file.timeout.filter(|t| *t > 0).map(Duration::from_secs).unwrap_or(default_timeout);
    Some(Self::new(databases, timeout))
  }

  pub fn new(databases: Vec<Arc<ExternalDatabase>>, timeout: Duration) -> Self {
    for db in &databases {
      info!(target: "edubrain_backend", name = %db.name, url = %db.url, "External database enabled");
    }
    Self { client: reqwest::Client::new(), databases: Arc::new(databases), timeout }
  }

  pub fn database_count(&self) -> usize {
    self.databases.len()
  }

  /// Race all enabled databases; first valid answer wins.
  #[instrument(level = "info", skip(self, query), fields(dbs = self.databases.len(), title_len = query.title.len()))]
  pub async fn query_all(&self, query: &QuestionQuery) -> Option<AnswerResult> {
    let mut set = JoinSet::new();
    for db in self.databases.iter() {
      let client = self.client.clone();
      let db = db.clone();
      let data = build_request_data(&db.data, query);
      let timeout = self.timeout;
      set.spawn(async move {
        let outcome = match tokio::time::timeout(timeout, query_one(&client, &db, data)).await {
          Ok(res) => res,
          Err(_) => Err(ExternalDbError::Timeout(timeout)),
        };
        (db, outcome)
      });
    }

    let choices = query.choices();
    while let Some(joined) = set.join_next().await {
      let (db, outcome) = match joined {
        Ok(v) => v,
        Err(e) => {
          warn!(target: "resolver", error = %e, "External lookup task failed");
          continue;
        }
      };
      match outcome {
        Ok(hit) => match validate_answer(&hit.answer, query.kind, &choices) {
          Some(answer) => {
            set.abort_all();
            info!(target: "resolver", db = %db.name, answer = %trunc_for_log(&answer, 40), "External database answered");
            let question = hit.question.filter(|q| !q.trim().is_empty()).unwrap_or_else(|| query.title.clone());
            return Some(AnswerResult::found(question, answer, AnswerSource::External(db.name.clone())));
          }
          None => {
            debug!(target: "resolver", db = %db.name, answer = %trunc_for_log(&hit.answer, 40), "External answer rejected");
          }
        },
        Err(e) => warn!(target: "resolver", db = %db.name, error = %e, "External database produced nothing"),
      }
    }

    info!(target: "resolver", "No external database returned a valid answer");
    None
  }
}

/// Substitute query fields into the string values of a request template.
pub fn build_request_data(template: &Map<String, Value>, query: &QuestionQuery) -> Map<String, Value> {
  let pairs = [
    ("title", query.title.as_str()),
    ("type", query.kind.as_str()),
    ("options", query.options.as_str()),
    ("context", query.context.as_deref().unwrap_or("")),
    ("course", query.course.as_deref().unwrap_or("")),
  ];
  template
    .iter()
    .map(|(k, v)| {
      let v = match v {
        Value::String(s) => Value::String(fill_placeholders(s, &pairs)),
        other => other.clone(),
      };
      (k.clone(), v)
    })
    .collect()
}

fn as_param(v: &Value) -> String {
  match v {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

async fn query_one(
  client: &reqwest::Client,
  db: &ExternalDatabase,
  data: Map<String, Value>,
) -> Result<ExternalHit, ExternalDbError> {
  let mut headers = HeaderMap::new();
  headers.insert(USER_AGENT, HeaderValue::from_static("edubrain-backend/0.1"));
  for (k, v) in &db.headers {
    if v.is_empty() {
      continue;
    }
    match (HeaderName::try_from(k.as_str()), HeaderValue::try_from(v.as_str())) {
      (Ok(name), Ok(value)) if name != CONTENT_TYPE => {
        headers.insert(name, value);
      }
      (Ok(_), Ok(_)) => {}
      _ => debug!(target: "resolver", db = %db.name, header = %k, "Skipping invalid header"),
    }
  }

  let params: Vec<(String, String)> = data.iter().map(|(k, v)| (k.clone(), as_param(v))).collect();
  let req = match db.method.0 {
    HttpMethod::Get => client.get(&db.url).query(&params),
    HttpMethod::Post => match db.content_type {
      BodyEncoding::Json => client.post(&db.url).json(&data),
      BodyEncoding::Form => client.post(&db.url).form(&params),
    },
  };

  let res = req
    .headers(headers)
    .send()
    .await
    .map_err(|e| ExternalDbError::Network(e.to_string()))?;
  let status = res.status();
  if !status.is_success() {
    return Err(ExternalDbError::Status(status.as_u16()));
  }
  let body = res.text().await.map_err(|e| ExternalDbError::Network(e.to_string()))?;
  parse_response(db.adapter, &body)
}

/// Read an answer out of a reply body according to the adapter.
pub fn parse_response(adapter: ResponseAdapter, body: &str) -> Result<ExternalHit, ExternalDbError> {
  let v: Value = serde_json::from_str(body).map_err(|e| ExternalDbError::Malformed(e.to_string()))?;
  let text = |v: Option<&Value>| -> Option<String> {
    match v? {
      Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    }
  };

  let hit = match adapter {
    ResponseAdapter::Enncy => {
      if v.get("code").and_then(Value::as_i64) == Some(0) {
        None
      } else {
        let data = v.get("data");
        text(data.and_then(|d| d.get("answer")))
          .map(|answer| ExternalHit { question: text(data.and_then(|d| d.get("question"))), answer })
      }
    }
    ResponseAdapter::Icodef => {
      if v.get("code").and_then(Value::as_i64) == Some(1) {
        text(v.get("data")).map(|answer| ExternalHit { question: None, answer })
      } else {
        None
      }
    }
    ResponseAdapter::Generic => {
      let data = v.get("data");
      let answer = text(v.get("answer"))
        .or_else(|| text(data.and_then(|d| d.get("answer"))))
        .or_else(|| text(data));
      answer.map(|answer| ExternalHit {
        question: text(v.get("question")).or_else(|| text(data.and_then(|d| d.get("question")))),
        answer,
      })
    }
  };
  hit.ok_or(ExternalDbError::Empty)
}

const NOT_FOUND_PHRASES: &[&str] = &[
  "非常抱歉", "抱歉", "题目搜索不到", "搜索不到", "未找到", "没有找到", "无法找到", "查询失败",
  "暂无答案", "暂无此题", "未收录", "sorry", "not found", "no answer",
];

const JUDGEMENT_TOKENS: &[&str] = &["对", "错", "正确", "错误", "true", "false", "√", "×", "是", "否", "yes", "no"];

/// Whether a reply is one of the "could not find it" messages banks send back.
pub fn is_not_found_answer(answer: &str) -> bool {
  let lower = answer.trim().to_lowercase();
  lower.is_empty() || NOT_FOUND_PHRASES.iter().any(|p| lower.contains(p))
}

/// Accept or reject an external answer for the question type.
///
/// When the question carries options, choice answers must name at least one
/// of them (by text or label) and come back as option texts, `#`-joined in
/// option order. Without options, multiple-choice separators become `#`.
pub fn validate_answer(answer: &str, kind: QuestionType, choices: &[ChoiceOption]) -> Option<String> {
  let answer = collapse_whitespace(answer);
  if is_not_found_answer(&answer) {
    return None;
  }
  let lower = answer.to_lowercase();
  let is_judgement_token = JUDGEMENT_TOKENS.contains(&lower.as_str());

  match kind {
    QuestionType::Judgement => is_judgement_token.then_some(answer),
    QuestionType::Single | QuestionType::Multiple => {
      if is_judgement_token {
        return None;
      }
      let spread = spread_inline_choices(choices);
      let choices = spread.as_deref().unwrap_or(choices);
      match (kind, choices.is_empty()) {
        (QuestionType::Multiple, false) => select_multiple(&answer, choices).ok(),
        (QuestionType::Multiple, true) => Some(answer.replace(['；', ';'], "#")),
        (_, false) => match_choice(&answer, choices).map(|i| choices[i].text.clone()),
        (_, true) => Some(answer),
      }
    }
    QuestionType::Completion | QuestionType::Unspecified => Some(answer),
  }
}

/// A lone unlabeled option line such as "甲 乙 丙" lists its options by spaces.
fn spread_inline_choices(choices: &[ChoiceOption]) -> Option<Vec<ChoiceOption>> {
  match choices {
    [only] if only.label.is_none() && only.text.contains(char::is_whitespace) => Some(
      only
        .text
        .split_whitespace()
        .map(|text| ChoiceOption { label: None, text: text.to_string() })
        .collect(),
    ),
    _ => None,
  }
}

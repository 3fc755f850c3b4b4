//! Answer resolution: cache, then the external question banks, then the AI.
//!
//! Each request walks the stages once and in order; a hit at any stage ends
//! the walk. Only successful external or AI answers are written to the cache.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::ai::AiClient;
use crate::cache::AnswerCache;
use crate::domain::{AnswerResult, QuestionQuery};
use crate::error::ResolveError;
use crate::external::ExternalDbClient;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct Resolver {
  cache: Option<Arc<AnswerCache>>,
  external: Option<ExternalDbClient>,
  ai: AiClient,
}

impl Resolver {
  /// `None` for cache or external disables that stage.
  pub fn new(cache: Option<Arc<AnswerCache>>, external: Option<ExternalDbClient>, ai: AiClient) -> Self {
    Self { cache, external, ai }
  }

  pub fn cache(&self) -> Option<&Arc<AnswerCache>> {
    self.cache.as_ref()
  }

  pub fn external_enabled(&self) -> bool {
    self.external.is_some()
  }

  pub fn ai(&self) -> &AiClient {
    &self.ai
  }

  #[instrument(
    level = "info",
    skip(self, query),
    fields(kind = %query.kind, title = %trunc_for_log(&query.title, 40))
  )]
  pub async fn resolve(&self, query: &QuestionQuery) -> Result<AnswerResult, ResolveError> {
    if let Some(cache) = &self.cache {
      if let Some(hit) = cache.get(query).await {
        info!(target: "resolver", "Cache hit");
        return Ok(hit);
      }
      debug!(target: "resolver", "Cache miss");
    }

    if let Some(external) = &self.external {
      debug!(target: "resolver", dbs = external.database_count(), "Querying external databases");
      if let Some(hit) = external.query_all(query).await {
        self.remember(query, &hit).await;
        info!(target: "resolver", source = %hit.source, "Resolved from external database");
        return Ok(hit);
      }
    }

    debug!(target: "resolver", provider = self.ai.provider(), "Falling back to AI");
    match self.ai.ask(query).await {
      Ok(result) => {
        self.remember(query, &result).await;
        info!(target: "resolver", answer = %trunc_for_log(&result.answer, 40), "Resolved by AI");
        Ok(result)
      }
      Err(e) => {
        warn!(target: "resolver", error = %e, "AI fallback failed");
        Err(ResolveError::Ai(e))
      }
    }
  }

  async fn remember(&self, query: &QuestionQuery, result: &AnswerResult) {
    if let Some(cache) = &self.cache {
      cache.put(query, result.clone()).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::{Duration, Instant};

  use axum::{http::StatusCode, routing::get, Json, Router};
  use serde_json::json;

  use super::*;
  use crate::ai::{CompletionBackend, CompletionOptions};
  use crate::config::Prompts;
  use crate::domain::{AnswerSource, QuestionType};
  use crate::error::AskError;
  use crate::external::ExternalDatabase;
  use crate::test_support::{spawn_stub, ScriptedBackend};

  const OPTS: CompletionOptions = CompletionOptions { temperature: 0.2, max_tokens: 128 };

  fn ai(backend: Arc<ScriptedBackend>) -> AiClient {
    AiClient::new(backend as Arc<dyn CompletionBackend>, Prompts::default(), OPTS)
  }

  fn cache() -> Arc<AnswerCache> {
    Arc::new(AnswerCache::new(Duration::from_secs(60), None))
  }

  fn one_plus_one() -> QuestionQuery {
    QuestionQuery::new("1+1=?", QuestionType::Single, "A.1\nB.2\nC.3", None, None).unwrap()
  }

  fn bank(name: &str, url: String) -> Arc<ExternalDatabase> {
    let db: ExternalDatabase = serde_json::from_value(json!({
      "name": name,
      "url": url,
      "method": "get",
      "data": {"title": "${title}"}
    }))
    .unwrap();
    Arc::new(db)
  }

  async fn answering_bank(answer: &'static str, delay_ms: u64) -> String {
    let app = Router::new().route(
      "/q",
      get(move || async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Json(json!({"code": 1, "question": "1+1=?", "answer": answer}))
      }),
    );
    format!("{}/q", spawn_stub(app).await)
  }

  async fn failing_bank() -> String {
    let app = Router::new().route("/q", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    format!("{}/q", spawn_stub(app).await)
  }

  #[tokio::test]
  async fn ai_answer_is_returned_and_cached() {
    let backend = ScriptedBackend::replying("B");
    let cache = cache();
    let resolver = Resolver::new(Some(cache.clone()), None, ai(backend.clone()));
    let q = one_plus_one();

    let res = resolver.resolve(&q).await.unwrap();
    assert!(res.found);
    assert_eq!(res.answer, "B");
    assert_eq!(res.source, AnswerSource::Ai);
    assert_eq!(backend.calls(), 1);

    let cached = cache.get(&q).await.expect("cached after AI success");
    assert_eq!(cached.answer, "B");
  }

  #[tokio::test]
  async fn warm_cache_is_idempotent_and_skips_everything() {
    let backend = ScriptedBackend::replying("B");
    let resolver = Resolver::new(Some(cache()), None, ai(backend.clone()));
    let q = one_plus_one();

    let first = resolver.resolve(&q).await.unwrap();
    let second = resolver.resolve(&q).await.unwrap();
    assert_eq!(backend.calls(), 1);
    assert_eq!(second.answer, first.answer);
    assert_eq!(second.question, first.question);
    assert_eq!(second.source, AnswerSource::Cache);

    // whitespace/case variants share the entry
    let variant = QuestionQuery::new("  1+1=?  ", QuestionType::Single, "A.1\n\nB.2\nC.3 ", None, None).unwrap();
    resolver.resolve(&variant).await.unwrap();
    assert_eq!(backend.calls(), 1);
  }

  #[tokio::test]
  async fn external_hit_short_circuits_ai() {
    let backend = ScriptedBackend::replying("C");
    let external = ExternalDbClient::new(
      vec![bank("slow", answering_bank("2", 1_500).await), bank("fast", answering_bank("2", 20).await)],
      Duration::from_secs(5),
    );
    let cache = cache();
    let resolver = Resolver::new(Some(cache.clone()), Some(external), ai(backend.clone()));
    let q = one_plus_one();

    let start = Instant::now();
    let res = resolver.resolve(&q).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(1_000), "waited for the slow bank");
    assert_eq!(res.answer, "2");
    assert_eq!(res.source, AnswerSource::External("fast".into()));
    assert_eq!(backend.calls(), 0);
    assert!(cache.get(&q).await.is_some());
  }

  #[tokio::test]
  async fn failing_banks_fall_back_to_ai_exactly_once() {
    let backend = ScriptedBackend::replying("B");
    let external = ExternalDbClient::new(
      vec![bank("down-1", failing_bank().await), bank("down-2", failing_bank().await)],
      Duration::from_secs(2),
    );
    let resolver = Resolver::new(None, Some(external), ai(backend.clone()));

    let res = resolver.resolve(&one_plus_one()).await.unwrap();
    assert_eq!(res.source, AnswerSource::Ai);
    assert_eq!(backend.calls(), 1);
  }

  #[tokio::test]
  async fn ai_failure_is_terminal_and_not_cached() {
    let backend = ScriptedBackend::failing(AskError::Timeout);
    let cache = cache();
    let resolver = Resolver::new(Some(cache.clone()), None, ai(backend.clone()));
    let q = one_plus_one();

    assert_eq!(resolver.resolve(&q).await.unwrap_err(), ResolveError::Ai(AskError::Timeout));
    assert_eq!(backend.calls(), 1);
    assert_eq!(cache.size().await, 0);
  }

  #[tokio::test]
  async fn disabled_cache_always_asks() {
    let backend = ScriptedBackend::replying("B");
    let resolver = Resolver::new(None, None, ai(backend.clone()));
    resolver.resolve(&one_plus_one()).await.unwrap();
    resolver.resolve(&one_plus_one()).await.unwrap();
    assert_eq!(backend.calls(), 2);
  }
}

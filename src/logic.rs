//! Request-level behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - the search flow (screening, resolution, record keeping)
//!   - cache maintenance and the health snapshot

use tracing::{info, instrument, warn};

use crate::domain::{AnswerResult, QuestionQuery};
use crate::error::AppError;
use crate::protocol::{CacheClearOut, HealthOut};
use crate::records::QaRecord;
use crate::state::AppState;
use crate::validation::validate_query;

#[instrument(level = "info", skip(state, query), fields(kind = %query.kind, title_len = query.title.len()))]
pub async fn search(state: &AppState, query: QuestionQuery) -> Result<AnswerResult, AppError> {
  if state.input_validation {
    if let Err(e) = validate_query(&query) {
      warn!(target: "edubrain_backend", error = %e, "Rejected search input");
      return Err(e.into());
    }
  }

  let result = state.resolver.resolve(&query).await?;
  state.records.push(QaRecord::new(&query, &result)).await;
  Ok(result)
}

pub async fn clear_cache(state: &AppState) -> CacheClearOut {
  match state.resolver.cache() {
    Some(cache) => {
      let dropped = cache.size().await;
      cache.clear().await;
      info!(target: "edubrain_backend", dropped, "Answer cache cleared");
      CacheClearOut { success: true, message: "缓存已清除".into() }
    }
    None => CacheClearOut { success: false, message: "缓存未启用".into() },
  }
}

pub async fn health(state: &AppState) -> HealthOut {
  let cache = state.resolver.cache();
  let cache_size = match cache {
    Some(c) => c.size().await,
    None => 0,
  };
  HealthOut {
    status: "ok",
    version: env!("CARGO_PKG_VERSION"),
    cache_enabled: cache.is_some(),
    cache_size,
    external_enabled: state.resolver.external_enabled(),
    ai_provider: state.resolver.ai().provider(),
    model: state.resolver.ai().model().to_string(),
  }
}

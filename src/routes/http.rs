//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  async_trait,
  extract::{FromRequest, Query, Request, State},
  http::header::CONTENT_TYPE,
  response::{IntoResponse, Response},
  Form, Json,
};
use tracing::{info, instrument};

use crate::error::{AppError, QueryError};
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::health(&state).await)
}

#[instrument(level = "info", skip(state, params), fields(title_len = params.title.len(), kind = ?params.kind))]
pub async fn http_get_search(
  State(state): State<Arc<AppState>>,
  Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
  run_search(&state, params).await
}

#[instrument(level = "info", skip(state, body), fields(title_len = body.0.title.len(), kind = ?body.0.kind))]
pub async fn http_post_search(
  State(state): State<Arc<AppState>>,
  body: JsonOrForm<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
  run_search(&state, body.0).await
}

async fn run_search(state: &AppState, params: SearchParams) -> Result<Json<crate::domain::AnswerResult>, AppError> {
  let query = params.into_query(state.input_validation)?;
  let result = logic::search(state, query).await?;
  info!(target: "edubrain_backend", source = %result.source, answer_len = result.answer.len(), "HTTP search answered");
  Ok(Json(result))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_cache_clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::clear_cache(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_records(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let records = state.records.snapshot().await;
  Json(RecordsOut { total: records.len(), records })
}

/// Body extractor accepting `application/json` or a urlencoded form.
pub struct JsonOrForm<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonOrForm<T>
where
  S: Send + Sync,
  T: serde::de::DeserializeOwned + Send + 'static,
  Json<T>: FromRequest<S>,
  Form<T>: FromRequest<S>,
{
  type Rejection = Response;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let is_json = req
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(|ct| ct.starts_with("application/json"))
      .unwrap_or(false);

    if is_json {
      let Json(v) = Json::<T>::from_request(req, state)
        .await
        .map_err(|_| AppError::from(QueryError::Malformed("invalid JSON body")).into_response())?;
      Ok(Self(v))
    } else {
      let Form(v) = Form::<T>::from_request(req, state)
        .await
        .map_err(|_| AppError::from(QueryError::Malformed("invalid form body")).into_response())?;
      Ok(Self(v))
    }
  }
}

//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - search, health, cache and records endpoints under `/api/...`
/// - CORS (allow any origin/method/headers) so browser userscripts can call it
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/search",
            get(http::http_get_search).post(http::http_post_search),
        )
        .route("/api/health", get(http::http_health))
        .route("/api/cache/clear", post(http::http_post_cache_clear))
        .route("/api/records", get(http::http_get_records))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::ai::{AiClient, CompletionOptions};
    use crate::cache::AnswerCache;
    use crate::config::Prompts;
    use crate::error::AskError;
    use crate::resolver::Resolver;
    use crate::test_support::ScriptedBackend;

    fn app_with(backend: Arc<ScriptedBackend>, validation: bool) -> Router {
        let ai = AiClient::new(
            backend,
            Prompts::default(),
            CompletionOptions { temperature: 0.2, max_tokens: 64 },
        );
        let cache = Some(Arc::new(AnswerCache::new(Duration::from_secs(60), None)));
        build_router(Arc::new(AppState::new(Resolver::new(cache, None, ai), validation)))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn get_search_resolves_and_then_hits_cache() {
        let backend = ScriptedBackend::replying("B");
        let app = app_with(backend.clone(), false);
        let uri = "/api/search?title=1%2B1%3D%3F&type=single&options=A.1%0AB.2%0AC.3";

        let (status, body) = send(app.clone(), Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"found": true, "question": "1+1=?", "answer": "B", "source": "ai"}));

        let (_, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(body["source"], "cache");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn post_search_accepts_json_and_form() {
        let app = app_with(ScriptedBackend::replying("北京#广州"), false);

        let json_req = Request::post("/api/search")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"哪些是城市?","type":"multiple","options":"[\"北京\",\"上海\",\"广州\"]"}"#))
            .unwrap();
        let (status, body) = send(app.clone(), json_req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "北京#广州");

        let form_req = Request::post("/api/search")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("title=%E5%93%AA%E4%BA%9B%E6%98%AF%E5%9F%8E%E5%B8%82%3F&type=multiple&options=%E5%8C%97%E4%BA%AC%0A%E5%B9%BF%E5%B7%9E"))
            .unwrap();
        let (status, body) = send(app, form_req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "北京#广州");
    }

    #[tokio::test]
    async fn bad_input_is_400() {
        let app = app_with(ScriptedBackend::replying("B"), true);
        let (status, body) = send(app.clone(), Request::get("/api/search?title=&type=single").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["found"], false);

        let (status, _) = send(app.clone(), Request::get("/api/search?title=x&type=essay").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            app,
            Request::get("/api/search?title=1%3B%20DROP%20TABLE%20t").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ai_failures_map_to_gateway_errors() {
        let app = app_with(ScriptedBackend::failing(AskError::Timeout), false);
        let (status, body) = send(app, Request::get("/api/search?title=q").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["found"], false);

        let app = app_with(ScriptedBackend::failing(AskError::NoCandidates), false);
        let (status, _) = send(app, Request::get("/api/search?title=q").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn health_clear_and_records() {
        let app = app_with(ScriptedBackend::replying("B"), false);
        send(app.clone(), Request::get("/api/search?title=q&type=single&options=A.1%0AB.2").body(Body::empty()).unwrap()).await;

        let (_, health) = send(app.clone(), Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["cache_size"], 1);
        assert_eq!(health["ai_provider"], "scripted");

        let (_, records) = send(app.clone(), Request::get("/api/records").body(Body::empty()).unwrap()).await;
        assert_eq!(records["total"], 1);
        assert_eq!(records["records"][0]["answer"], "B");

        let (_, cleared) = send(app.clone(), Request::post("/api/cache/clear").body(Body::empty()).unwrap()).await;
        assert_eq!(cleared["success"], true);

        let (_, health) = send(app, Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(health["cache_size"], 0);
    }
}

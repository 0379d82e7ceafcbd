//! HTTP surface: router, shared state and the endpoint handlers.

use crate::analysis::{self, AnalysisResult};
use crate::chat::relay_chat;
use crate::config::AppConfig;
use crate::history::recent_history;
use crate::provider::ChatProvider;
use crate::providers::OpenAIProvider;
use crate::store::{AnalysisRecord, RecordStore};
use crate::Error;
use axum::{
    body::Body,
    extract::{Json, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Request body shared by `/analyze` and `/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// `None` when no upstream credential is configured.
    pub provider: Option<Arc<dyn ChatProvider>>,
    pub store: RecordStore,
}

impl AppState {
    /// Build state from configuration, creating the upstream client when a
    /// credential is present.
    pub fn new(config: AppConfig, store: RecordStore) -> Result<Self, Error> {
        let provider = match &config.api_key {
            Some(key) => {
                let provider = OpenAIProvider::new_with_base_url(
                    key.clone(),
                    config.base_url.clone(),
                    config.model.clone(),
                )?;
                Some(Arc::new(provider) as Arc<dyn ChatProvider>)
            }
            None => {
                tracing::warn!("AI_API_KEY is not set; /analyze will answer 500 until it is");
                None
            }
        };
        Ok(Self::with_provider(config, provider, store))
    }

    pub fn with_provider(
        config: AppConfig,
        provider: Option<Arc<dyn ChatProvider>>,
        store: RecordStore,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            store,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/analyze", post(analyze))
        .route("/chat", post(chat))
        .route("/history", get(history))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "Hello": "World" }))
}

async fn analyze(
    State(state): State<AppState>,
    Json(payload): Json<TextRequest>,
) -> Result<Json<AnalysisResult>, Error> {
    let provider = state
        .provider
        .as_deref()
        .ok_or_else(|| Error::config("upstream API key is not configured"))?;

    let result = analysis::analyze(provider, &state.store, &payload.text).await?;
    Ok(Json(result))
}

async fn chat(State(state): State<AppState>, Json(payload): Json<TextRequest>) -> impl IntoResponse {
    let fragments = relay_chat(state.provider.clone(), state.store.clone(), payload.text)
        .map(|fragment| Ok::<Bytes, Infallible>(Bytes::from(fragment)));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(fragments),
    )
}

async fn history(State(state): State<AppState>) -> Result<Json<Vec<AnalysisRecord>>, Error> {
    Ok(Json(recent_history(&state.store).await?))
}

/// Open the store, bind the listener and serve until `shutdown` resolves.
pub async fn serve<F>(config: AppConfig, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = RecordStore::open(&config.db_path).await?;
    tracing::info!(path = %config.db_path.display(), "record store ready");

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, store.clone())?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    store.close().await;
    Ok(())
}

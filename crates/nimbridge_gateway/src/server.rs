use crate::error::ApiError;
use crate::types::{
    ChatCompletionRequest, HealthResponse, ModelInfo, ModelList, SwitchUpdate, ToggleRequest,
    ToggleResponse, VariableUpdate,
};
use crate::upstream::UpstreamClient;
use anyhow::Context;
use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use nimbridge_core::ModelConfig;
use nimbridge_rules::{InjectionEngine, RuleSetSummary, SessionSnapshot};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

const SERVICE_NAME: &str = "nimbridge";

/// Shared state for the gateway server.
#[derive(Clone)]
struct AppState {
    /// Rule catalog and session state, shared by every request.
    engine: Arc<InjectionEngine>,
    upstream: Arc<UpstreamClient>,
    models: Arc<ModelConfig>,
}

/// The proxy HTTP server.
///
/// - `POST /v1/chat/completions`: rewrite messages, forward upstream
/// - `GET /v1/models`: client-facing model aliases
/// - `GET /health`: health check
/// - `/rulesets/...`: rule set management and session state
pub struct GatewayServer {
    state: AppState,
    /// Bind address.
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(
        engine: Arc<InjectionEngine>,
        upstream: UpstreamClient,
        models: ModelConfig,
        host: &str,
        port: u16,
    ) -> Self {
        Self {
            state: AppState {
                engine,
                upstream: Arc::new(upstream),
                models: Arc::new(models),
            },
            host: host.to_string(),
            port,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/v1/models", get(list_models))
            .route("/v1/chat/completions", post(chat_completions))
            .route("/rulesets", get(list_rule_sets))
            .route("/rulesets/state", get(session_state))
            .route("/rulesets/reset-count", post(reset_count))
            .route("/rulesets/:name/toggle", post(toggle_rule_set))
            .route("/rulesets/variables/:name", put(set_variable))
            .route("/rulesets/switches/:name", put(set_switch))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind the listener, then serve on a background task. Bind errors are
    /// returned; the handle only resolves when serving stops.
    pub async fn start(self) -> anyhow::Result<tokio::task::JoinHandle<()>> {
        let app = self.router();
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Gateway failed to bind {}", addr))?;
        tracing::info!(
            "Gateway listening on {} (upstream {})",
            addr,
            self.state.upstream.base_url()
        );

        Ok(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Gateway server error: {}", e);
            }
        }))
    }
}

// ============================================================================
// Proxy handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let rule_sets = state.engine.list();
    Json(HealthResponse {
        status: "ok".into(),
        service: SERVICE_NAME.into(),
        rule_sets: rule_sets.len(),
        enabled_rule_sets: rule_sets.iter().filter(|r| r.enabled).count(),
        turn_count: state.engine.state().turn_count(),
    })
}

async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    let created = chrono::Utc::now().timestamp();
    Json(ModelList {
        object: "list".into(),
        data: state
            .models
            .mapping
            .keys()
            .map(|alias| ModelInfo::new(alias.as_str(), created))
            .collect(),
    })
}

/// POST /v1/chat/completions: apply one turn of rules, then proxy.
///
/// Buffered responses come back with `model` set to the name the client
/// asked for; streamed responses are relayed byte for byte.
async fn chat_completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let requested_model = request.model.clone();
    let upstream_model = state.models.resolve(&requested_model);
    let stream = request.is_stream();

    // ThreadRng is not Send; keep it out of scope across awaits.
    let messages = {
        let mut rng = rand::thread_rng();
        state.engine.rewrite(&request.messages, &mut rng)
    };
    tracing::info!(
        "Chat request: {} -> {} ({} -> {} messages, stream={})",
        requested_model,
        upstream_model,
        request.messages.len(),
        messages.len(),
        stream
    );

    let outgoing = ChatCompletionRequest {
        model: upstream_model,
        messages,
        ..request
    };
    let body = serde_json::to_value(&outgoing)
        .map_err(|e| ApiError::BadRequest(format!("Unserializable request: {}", e)))?;

    let resp = state.upstream.chat_completions(&body).await.map_err(|e| {
        tracing::error!("Upstream request failed: {:#}", e);
        ApiError::Unavailable(format!("{:#}", e))
    })?;

    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        tracing::error!("Upstream returned {}: {}", status, body);
        return Err(ApiError::Upstream { status, body });
    }

    if stream {
        return Ok((
            status,
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(resp.bytes_stream()),
        )
            .into_response());
    }

    let mut completion: Value = resp
        .json()
        .await
        .map_err(|e| ApiError::Unavailable(format!("Invalid upstream response: {}", e)))?;
    if let Some(obj) = completion.as_object_mut() {
        obj.insert("model".into(), Value::String(requested_model));
    }
    Ok((status, Json(completion)).into_response())
}

// ============================================================================
// Management handlers
// ============================================================================

async fn list_rule_sets(State(state): State<AppState>) -> Json<Vec<RuleSetSummary>> {
    Json(state.engine.list())
}

/// POST /rulesets/{name}/toggle: set `enabled` if given, otherwise flip it.
async fn toggle_rule_set(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ToggleResponse>, ApiError> {
    let request: ToggleRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ToggleRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let enabled = match request.enabled {
        Some(enabled) => {
            state.engine.set_enabled(&name, enabled)?;
            enabled
        }
        None => state.engine.toggle(&name)?,
    };
    Ok(Json(ToggleResponse { name, enabled }))
}

async fn reset_count(State(state): State<AppState>) -> Json<SessionSnapshot> {
    state.engine.state().reset_turn_count();
    tracing::info!("Turn counter reset");
    Json(state.engine.state().snapshot())
}

async fn session_state(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.engine.state().snapshot())
}

async fn set_variable(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<VariableUpdate>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let Json(update) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state.engine.state().set_variable(name, update.value);
    Ok(Json(state.engine.state().snapshot()))
}

async fn set_switch(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<SwitchUpdate>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let Json(update) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state.engine.state().set_switch(name, update.value);
    Ok(Json(state.engine.state().snapshot()))
}

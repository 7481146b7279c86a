use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::{info, warn};
use vla_core::{create_environment_with_config, list_environments, EngineError, Environment, Observation, Snapshot, ToolCall};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Live sessions keyed by id. The lock is async because handlers await the env while holding it.
#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<HashMap<String, Box<dyn Environment>>>>,
    id_ctr: Arc<AtomicU64>,
}

impl AppState {
    fn new() -> Self {
        Self { store: Arc::new(RwLock::new(HashMap::new())), id_ctr: Arc::new(AtomicU64::new(1)) }
    }

    fn next_id(&self) -> String {
        format!("env-{}", self.id_ctr.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Deserialize)]
pub struct InitRequest {
    pub env_type: String,
    #[serde(default)]
    pub config: Option<JsonValue>,
}

#[derive(Serialize)]
pub struct InitResponse {
    pub env_id: String,
    pub observation: Observation,
}

#[derive(Deserialize)]
pub struct StepRequest {
    pub env_id: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
pub struct IdRequest {
    pub env_id: String,
}

fn not_found(env_id: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("env {env_id} not found"))
}

async fn list_envs() -> impl IntoResponse {
    Json(list_environments())
}

async fn initialize(State(state): State<AppState>, Json(req): Json<InitRequest>) -> ApiResult<InitResponse> {
    let mut env = create_environment_with_config(&req.env_type, req.config).map_err(map_engine_err)?;
    let obs = env.initialize().await.map_err(map_engine_err)?;
    let id = state.next_id();
    state.store.write().await.insert(id.clone(), env);
    info!(env_id = %id, env_type = %req.env_type, "session created");
    Ok(Json(InitResponse { env_id: id, observation: obs }))
}

async fn step(State(state): State<AppState>, Json(req): Json<StepRequest>) -> ApiResult<Observation> {
    let mut guard = state.store.write().await;
    let env = guard.get_mut(&req.env_id).ok_or_else(|| not_found(&req.env_id))?;
    let obs = env.step(req.tool_calls).await.map_err(map_engine_err)?;
    Ok(Json(obs))
}

async fn checkpoint(State(state): State<AppState>, Json(req): Json<IdRequest>) -> ApiResult<Snapshot> {
    let guard = state.store.read().await;
    let env = guard.get(&req.env_id).ok_or_else(|| not_found(&req.env_id))?;
    let snap = env.checkpoint().await.map_err(map_engine_err)?;
    Ok(Json(snap))
}

async fn terminate(State(state): State<AppState>, Json(req): Json<IdRequest>) -> ApiResult<Observation> {
    let mut env = state
        .store
        .write()
        .await
        .remove(&req.env_id)
        .ok_or_else(|| not_found(&req.env_id))?;
    let obs = env.terminate().await.map_err(map_engine_err)?;
    info!(env_id = %req.env_id, "session terminated");
    Ok(Json(obs))
}

fn map_engine_err(err: EngineError) -> (StatusCode, String) {
    match err {
        EngineError::Validation(s) => (StatusCode::BAD_REQUEST, s),
        EngineError::NotFound(s) => (StatusCode::NOT_FOUND, s),
        EngineError::Internal(s) => {
            warn!(error = %s, "internal engine error");
            (StatusCode::INTERNAL_SERVER_ERROR, s)
        }
    }
}

pub fn make_app() -> Router {
    let state = AppState::new();
    Router::new()
        .route("/envs", get(list_envs))
        .route("/initialize", post(initialize))
        .route("/step", post(step))
        .route("/checkpoint", post(checkpoint))
        .route("/terminate", post(terminate))
        .with_state(state)
}

//! REST API handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::types::{
    CwdResponse, EnvResponse, ErrorResponse, ExecuteRequest, SetCwdRequest, SetEnvRequest,
    StatusResponse,
};
use crate::engine::ShellEngine;
use crate::error::ShellRelayError;
use crate::execution::{CommandRequest, CommandResult};
use crate::security::ValidationError;
use crate::shell::SessionInfo;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(error: ShellRelayError) -> ApiError {
    let status = match error {
        ShellRelayError::Validation(_) => StatusCode::BAD_REQUEST,
        ShellRelayError::SessionTerminated => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::from_error(&error)))
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ShellEngine>,
}

impl AppState {
    pub fn new(engine: Arc<ShellEngine>) -> Self {
        Self { engine }
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "shell-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Engine liveness check.
pub async fn ping(State(state): State<AppState>) -> &'static str {
    state.engine.ping()
}

/// Execute a command in the session.
///
/// Always answers 200: failures are classified inside the result.
pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Json<CommandResult> {
    let trim_chars = req.trim_chars();
    let fallback_trim = trim_chars.clone().ok().flatten();

    let result = match (req.command.as_str(), req.timeout_secs(), trim_chars) {
        (None, _, _) => state.engine.reject(
            &req.command.to_string(),
            &ValidationError::NotText,
            fallback_trim,
        ),
        (Some(command), Err(e), _) | (Some(command), _, Err(e)) => {
            state.engine.reject(command, &e, fallback_trim)
        }
        (Some(command), Ok(timeout_secs), Ok(trim_chars)) => {
            let mut request = CommandRequest::new(command);
            request.timeout_secs = timeout_secs;
            request.trim_chars = trim_chars;
            state.engine.execute(&request).await
        }
    };
    Json(result)
}

/// Get the tracked working directory.
pub async fn get_cwd(State(state): State<AppState>) -> Result<Json<CwdResponse>, ApiError> {
    let cwd = state.engine.cwd().map_err(api_error)?;
    Ok(Json(CwdResponse { cwd }))
}

/// Change the working directory.
pub async fn set_cwd(
    State(state): State<AppState>,
    Json(req): Json<SetCwdRequest>,
) -> Json<CommandResult> {
    Json(state.engine.set_cwd(&req.path).await)
}

/// List the environment overlay.
pub async fn env_overlay(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    let overlay = state.engine.env_overlay().map_err(api_error)?;
    Ok(Json(overlay))
}

/// Look up one variable.
pub async fn get_env(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EnvResponse>, ApiError> {
    let value = state.engine.env(&name).map_err(api_error)?;
    Ok(Json(EnvResponse { name, value }))
}

/// Set one overlay variable.
pub async fn set_env(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SetEnvRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .engine
        .set_env(&name, &req.value)
        .map_err(api_error)?;
    Ok(Json(StatusResponse::ok()))
}

/// Restart the interpreter.
pub async fn reset(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let info = state.engine.reset().await.map_err(api_error)?;
    Ok(Json(StatusResponse::ok().with_session(info)))
}

/// Interpreter lifecycle snapshot.
pub async fn session_info(State(state): State<AppState>) -> Result<Json<SessionInfo>, ApiError> {
    let info = state.engine.session_info().map_err(api_error)?;
    Ok(Json(info))
}

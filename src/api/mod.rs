//! API layer for shell-relay.
//!
//! This module exposes the engine's operations as REST endpoints.
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check (never authenticated)
//! - `GET /api/v1` - API information
//! - `GET /api/v1/ping` - Engine liveness, answers `pong`
//!
//! ### Session
//! - `POST /api/v1/execute` - Run a command
//! - `GET /api/v1/cwd` / `PUT /api/v1/cwd` - Tracked working directory
//! - `GET /api/v1/env` - Environment overlay
//! - `GET /api/v1/env/{name}` / `PUT /api/v1/env/{name}` - One variable
//! - `POST /api/v1/reset` - Restart the interpreter
//! - `GET /api/v1/session` - Interpreter lifecycle snapshot
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shell_relay::api::{serve, ServerConfig};
//! use shell_relay::{EngineConfig, ShellEngine};
//!
//! #[tokio::main]
//! async fn main() -> shell_relay::Result<()> {
//!     let engine = Arc::new(ShellEngine::new(EngineConfig::default()));
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     serve(ServerConfig::default(), engine, shutdown).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;

pub use handlers::AppState;
pub use router::{create_router, create_router_with_auth, serve, ServerConfig};
pub use types::{
    CwdResponse, EnvResponse, ErrorResponse, ExecuteRequest, SetCwdRequest, SetEnvRequest,
    StatusResponse,
};

//! API router configuration.

use std::future::{Future, IntoFuture};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    api_info, env_overlay, execute, get_cwd, get_env, health, ping, reset, session_info, set_cwd,
    set_env, AppState,
};
use crate::engine::ShellEngine;
use crate::security::{auth_middleware, ApiKeyStore};

/// Create the API router without authentication.
pub fn create_router(engine: Arc<ShellEngine>) -> Router {
    create_router_with_auth(engine, ApiKeyStore::disabled())
}

/// Create the API router guarded by `auth`.
pub fn create_router_with_auth(engine: Arc<ShellEngine>, auth: ApiKeyStore) -> Router {
    let api_v1 = Router::new()
        .route("/", get(api_info))
        .route("/ping", get(ping))
        .route("/execute", post(execute))
        .route("/cwd", get(get_cwd).put(set_cwd))
        .route("/env", get(env_overlay))
        .route("/env/{name}", get(get_env).put(set_env))
        .route("/reset", post(reset))
        .route("/session", get(session_info));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(middleware::from_fn_with_state(Arc::new(auth), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(AppState::new(engine))
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Accepted API keys.
    pub auth: ApiKeyStore,
    /// Drain in-flight requests on shutdown.
    pub graceful_shutdown: bool,
}

impl ServerConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            host,
            port,
            auth: ApiKeyStore::disabled(),
            graceful_shutdown: true,
        }
    }

    pub fn with_auth(mut self, auth: ApiKeyStore) -> Self {
        self.auth = auth;
        self
    }

    pub fn without_graceful_shutdown(mut self) -> Self {
        self.graceful_shutdown = false;
        self
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000)
    }
}

/// Start the API server and run until `shutdown` resolves.
pub async fn serve<F>(
    config: ServerConfig,
    engine: Arc<ShellEngine>,
    shutdown: F,
) -> crate::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_address();
    let router = create_router_with_auth(engine, config.auth.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting shell-relay API server on {}", addr);

    let server = axum::serve(listener, router);
    if config.graceful_shutdown {
        server.with_graceful_shutdown(shutdown).await?;
    } else {
        tokio::select! {
            result = server.into_future() => result?,
            _ = shutdown => {}
        }
    }

    Ok(())
}

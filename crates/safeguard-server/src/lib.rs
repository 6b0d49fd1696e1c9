//! Safeguard Server - HTTP and WebSocket API.
//!
//! Local transport between the browser extension and the policy engine.
//!
//! ## Endpoints
//!
//! - `POST /api/classify` - Decide the fate of one intercepted request
//! - `GET /ws/state` - Observer connection speaking the sync protocol
//! - `GET /ws/redirect-target` - One-shot interstitial handshake
//!
//! ## Example
//!
//! ```no_run
//! use safeguard_server::{AppState, Server, ServerConfig};
//! use safeguard_storage::Database;
//! use safeguard_sync::Engine;
//! use safeguard_core::classifier::PageUrls;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let db = Database::in_memory().unwrap();
//!     let (tab_commands, _tab_rx) = mpsc::unbounded_channel();
//!     let engine = Engine::spawn(db, PageUrls::default(), tab_commands).unwrap();
//!
//!     let server = Server::with_state(ServerConfig::default(), AppState::new(engine)).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod error;
mod handlers;
pub mod models;
pub mod state;
mod ws;

use std::net::SocketAddr;

use axum::routing::{any, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use error::{ApiError, Result};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 48710;

/// Default server host (localhost only).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// The API server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a server around existing application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        // The extension's pages load from a moz-extension:// origin.
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = Router::new()
            .route("/api/classify", post(handlers::classify))
            .route("/ws/state", any(ws::state_socket))
            .route("/ws/redirect-target", any(ws::redirect_target_socket))
            .layer(cors)
            .with_state(state);

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self { router, addr })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until shutdown.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Safeguard API server on {}", self.addr);

        // SO_REUSEADDR lets a restart bind past lingering TIME_WAIT sockets.
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        axum::serve(listener, self.router)
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use safeguard_core::classifier::PageUrls;
    use safeguard_storage::Database;
    use safeguard_sync::{ClientMessage, Engine, EngineHandle};
    use serde_json::json;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn create_test_app() -> (Router, EngineHandle) {
        let db = Database::in_memory().unwrap();
        let (tab_commands, _tab_rx) = mpsc::unbounded_channel();
        let engine = Engine::spawn(db, PageUrls::default(), tab_commands).unwrap();

        let server =
            Server::with_state(ServerConfig::default(), AppState::new(engine.clone())).unwrap();
        (server.router(), engine)
    }

    fn classify_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/classify")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_classify_unknown_navigation_returns_redirect_url() {
        let (app, _engine) = create_test_app();

        let request = classify_request(json!({
            "url": "http://example.com/",
            "isTopLevelNavigation": true,
            "hasVisibleTab": true,
            "method": "GET"
        }));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        let redirect_url = json["redirectUrl"].as_str().unwrap();
        assert!(redirect_url.starts_with("/pages/redirect-target.html?url="));
        assert!(redirect_url.contains("&hmac="));
    }

    #[tokio::test]
    async fn test_classify_unknown_subresource_cancels() {
        let (app, _engine) = create_test_app();

        let request = classify_request(json!({"url": "http://example.com/x.js"}));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response_json(response).await, json!({"cancel": true}));
    }

    #[tokio::test]
    async fn test_classify_allowed_host_returns_empty_object() {
        let (app, engine) = create_test_app();

        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = engine.connect(tx).await.unwrap();
        connection
            .send(ClientMessage::Allow {
                hostnames: vec!["example.com".to_string()],
            })
            .unwrap();

        let request = classify_request(json!({
            "url": "http://example.com/",
            "isTopLevelNavigation": true,
            "hasVisibleTab": true
        }));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response_json(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_classify_redirected_host_upgrades() {
        let (app, engine) = create_test_app();

        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = engine.connect(tx).await.unwrap();
        connection
            .send(ClientMessage::Redirect {
                hostnames: vec!["example.com".to_string()],
            })
            .unwrap();

        let request = classify_request(json!({"url": "http://example.com/"}));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response_json(response).await,
            json!({"upgradeToSecure": true})
        );
    }

    #[tokio::test]
    async fn test_classify_rejects_missing_url() {
        let (app, _engine) = create_test_app();

        let request = classify_request(json!({"method": "GET"}));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[tokio::test]
    async fn test_server_config_with_port() {
        let config = ServerConfig::default().with_port(9000);
        assert_eq!(config.port, 9000);
    }
}

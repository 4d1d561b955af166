//! API server assembly

use std::sync::Arc;

use anyhow::Result;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::chat::SessionRegistry;
use crate::config::Settings;
use crate::services::Services;

use super::middleware::{require_auth, AuthState};
use super::routes::{chat_socket, health_check, history, login, AppState};

/// HTTP/WebSocket front end over the session registry.
pub struct ApiServer {
    settings: Settings,
    services: Arc<Services>,
}

impl ApiServer {
    pub fn new(settings: Settings, services: Arc<Services>) -> Self {
        Self { settings, services }
    }

    pub async fn start(self) -> Result<()> {
        let registry = SessionRegistry::new(self.services);

        // Idle sessions are swept in the background for the process
        // lifetime; the handle is intentionally dropped.
        let _reaper = registry.spawn_reaper();

        let app_state = Arc::new(AppState { registry });
        let auth_state = AuthState::new(&self.settings.jwt_secret);

        let public = Router::new()
            .route("/health", get(health_check))
            .route("/login", post(login))
            .with_state(auth_state.clone());

        let chat = Router::new()
            .route("/api/history/:client_id", get(history))
            .route_layer(from_fn_with_state(auth_state, require_auth))
            .route("/ws/:client_id", get(chat_socket))
            .with_state(app_state);

        let app = public.merge(chat).layer(CorsLayer::permissive());

        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        info!("starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

//! HTTP/WebSocket transport for Sibyl

mod auth;
mod middleware;
mod routes;
mod server;

pub use auth::{bearer_token, Claims, JwtAuth};
pub use middleware::{require_auth, AuthState, Principal};
pub use routes::AppState;
pub use server::ApiServer;

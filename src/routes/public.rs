use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. Does not touch the database.
        .route("/health", get(|| async { "ok" }))
        // POST /login
        // Exchanges name and password for a session token.
        .route("/login", post(handlers::login))
        // POST /user
        // Registration. New accounts always get the `user` role.
        .route("/user", post(handlers::create_user))
}

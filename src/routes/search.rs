use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Search Router Module
///
/// GET /advertisement is kept out of the token middleware: a request without any
/// filter must be refused with 400 before the token store is consulted. The
/// handler still requires an `AuthUser`, extracted after the `SearchPlan`.
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/advertisement", get(handlers::search_listings))
}

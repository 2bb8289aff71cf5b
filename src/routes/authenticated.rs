use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Everything here sits behind `auth_middleware`, which resolves the token once and
/// stores the `AuthUser` in the request extensions. Ownership checks happen in the
/// handlers through `policy::authorize`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Users ---
        // GET/PATCH/DELETE /user/{id}
        // Reads are open to any session; changes need self or admin.
        .route(
            "/user/{id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // --- Advertisements ---
        // POST /advertisement
        // The owner is always the caller.
        .route("/advertisement", post(handlers::create_listing))
        // GET/PATCH/DELETE /advertisement/{id}
        // Owner or admin only, reads included.
        .route(
            "/advertisement/{id}",
            get(handlers::get_listing)
                .patch(handlers::update_listing)
                .delete(handlers::delete_listing),
        )
}

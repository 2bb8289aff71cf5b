use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Request-facing layer.
pub mod auth;
pub mod error;
pub mod handlers;
pub mod search;

// Domain rules.
pub mod password;
pub mod policy;
pub mod tokens;

// Data and infrastructure.
pub mod config;
pub mod models;
pub mod repository;

// Routing, split by authentication strategy.
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public, search as search_route};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::create_user, handlers::get_user, handlers::update_user,
        handlers::delete_user, handlers::create_listing, handlers::get_listing,
        handlers::search_listings, handlers::update_listing, handlers::delete_listing
    ),
    components(
        schemas(
            models::Role, models::User, models::Listing, models::LoginRequest,
            models::LoginResponse, models::CreateUserRequest, models::UpdateUserRequest,
            models::CreateListingRequest, models::UpdateListingRequest, models::IdResponse,
            models::SearchListingsResponse,
        )
    ),
    tags(
        (name = "listing-service", description = "Classified advertisements API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for everything a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Storage access, behind the `Repository` trait so tests can swap it.
    pub repo: RepositoryState,
    /// Immutable configuration loaded at startup.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards `authenticated_routes`. A failed `AuthUser` extraction rejects with 401
/// before the handler runs; on success the identity is left in the request
/// extensions so the handler's own `AuthUser` does not hit storage again.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing table, the scoped auth layer and the global
/// observability layers, then binds the state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Same path as POST /advertisement; the method routers are merged.
        .merge(search_route::search_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` set by the
/// layer above, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

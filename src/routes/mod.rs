/// Router Module Index
///
/// Splits the routing table by how each group is authenticated, so the guard is
/// applied once per module as an Axum layer rather than remembered per handler.

/// Routes open to anonymous clients: health, login and registration.
pub mod public;

/// Routes wrapped in the token middleware. Every handler here receives a
/// validated `AuthUser`.
pub mod authenticated;

/// The advertisement search. Authenticated inside the handler, after the query
/// string has been validated.
pub mod search;

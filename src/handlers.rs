use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{
        CreateListingRequest, CreateUserRequest, IdResponse, Listing, LoginRequest,
        LoginResponse, NewListing, NewUser, Role, SearchListingsResponse, UpdateListingRequest,
        UpdateUserRequest, User, UserPatch,
    },
    password::{hash_password, verify_password_or_dummy},
    policy::authorize,
    search::{SearchParams, SearchPlan},
    tokens,
};
use axum::{
    Json,
    extract::{FromRequest, Path, State},
};

/// Longest accepted user name, matching the `users.name` column.
pub const MAX_NAME_LEN: usize = 50;

/// AppJson
///
/// `axum::Json` with body rejections reported as `ApiError::Validation`, so a
/// malformed payload (including an unknown role) is a 400 with the usual body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

// --- Input validation ---

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".to_string()));
    }
    Ok(())
}

fn hashing_failed(e: argon2::password_hash::Error) -> ApiError {
    tracing::error!(error = %e, "password hashing failed");
    ApiError::Internal
}

// --- Authentication ---

/// login
///
/// [Public Route] Exchanges a name and password for a new session token.
/// Unknown names and wrong passwords are indistinguishable (401).
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
#[tracing::instrument(skip_all, fields(name = %payload.name))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state.repo.find_user_by_name(&payload.name).await?;
    // Unknown names still pay for one argon2 verify.
    let verified = verify_password_or_dummy(
        &payload.password,
        user.as_ref().map(|user| user.password_hash.as_str()),
    );
    let user = match user {
        Some(user) if verified => user,
        _ => return Err(ApiError::Authentication("Invalid credentials")),
    };

    let token = tokens::issue(state.repo.as_ref(), user.id).await?;
    Ok(Json(LoginResponse { token: token.token }))
}

// --- Users ---

/// create_user
///
/// [Public Route] Registers a new account with the `user` role.
#[utoipa::path(
    post,
    path = "/user",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Created", body = IdResponse),
        (status = 409, description = "Name already taken")
    )
)]
#[tracing::instrument(skip_all, fields(name = %payload.name))]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<Json<IdResponse>, ApiError> {
    validate_name(&payload.name)?;
    validate_password(&payload.password)?;

    let password_hash = hash_password(&payload.password).map_err(hashing_failed)?;
    let user = state
        .repo
        .create_user(NewUser {
            name: payload.name,
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = user.id, "user created");
    Ok(Json(IdResponse { id: user.id }))
}

/// get_user
///
/// [Authenticated Route] Returns a user record, including its password digest.
#[utoipa::path(
    get,
    path = "/user/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    _actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.repo.get_user(id).await?))
}

/// update_user
///
/// [Authenticated Route] Partially updates a user. Allowed for the user themselves
/// or an admin. Omitted fields keep their value; an empty body is a no-op.
///
/// The self-or-admin rule covers every field, `role` included: a user may set
/// their own role to `admin`. Role changes are not restricted to admins.
#[utoipa::path(
    patch,
    path = "/user/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = IdResponse),
        (status = 403, description = "Not self or admin"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Name already taken")
    )
)]
#[tracing::instrument(skip_all, fields(actor_id = actor.id, user_id = id))]
pub async fn update_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<IdResponse>, ApiError> {
    if let Some(name) = &payload.name {
        validate_name(name)?;
    }
    if let Some(password) = &payload.password {
        validate_password(password)?;
    }

    let user = state.repo.get_user(id).await?;
    authorize(&actor, &user)?;

    let patch = UserPatch {
        name: payload.name,
        password_hash: payload
            .password
            .as_deref()
            .map(hash_password)
            .transpose()
            .map_err(hashing_failed)?,
        role: payload.role,
    };
    if !patch.is_empty() {
        state.repo.update_user(patch.apply(user)).await?;
    }

    Ok(Json(IdResponse { id }))
}

/// delete_user
///
/// [Authenticated Route] Removes a user and, through the schema, all of their
/// tokens. Refused with 409 while the user still owns advertisements.
#[utoipa::path(
    delete,
    path = "/user/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = IdResponse),
        (status = 403, description = "Not self or admin"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "User still owns advertisements")
    )
)]
#[tracing::instrument(skip_all, fields(actor_id = actor.id, user_id = id))]
pub async fn delete_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IdResponse>, ApiError> {
    let user = state.repo.get_user(id).await?;
    authorize(&actor, &user)?;

    if state.repo.count_listings_by_user(user.id).await? > 0 {
        return Err(ApiError::Conflict(
            "User still owns advertisements".to_string(),
        ));
    }
    state.repo.delete_user(user.id).await?;

    tracing::info!("user deleted");
    Ok(Json(IdResponse { id }))
}

// --- Listings ---

/// create_listing
///
/// [Authenticated Route] Creates an advertisement owned by the caller. A
/// client-supplied `owner` is ignored.
#[utoipa::path(
    post,
    path = "/advertisement",
    request_body = CreateListingRequest,
    responses((status = 200, description = "Created", body = IdResponse))
)]
#[tracing::instrument(skip_all, fields(actor_id = actor.id))]
pub async fn create_listing(
    actor: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateListingRequest>,
) -> Result<Json<IdResponse>, ApiError> {
    if payload.owner.as_deref().is_some_and(|owner| owner != actor.name) {
        tracing::debug!("ignoring client-supplied owner");
    }

    let listing = state
        .repo
        .create_listing(NewListing {
            title: payload.title,
            description: payload.description,
            price: payload.price,
            owner: actor.name,
            user_id: actor.id,
        })
        .await?;

    Ok(Json(IdResponse { id: listing.id }))
}

/// get_listing
///
/// [Authenticated Route] Returns one advertisement to its owner or an admin.
/// Anyone else gets 403, not an empty response.
#[utoipa::path(
    get,
    path = "/advertisement/{id}",
    params(("id" = i64, Path, description = "Advertisement ID")),
    responses(
        (status = 200, description = "Found", body = Listing),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_listing(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Listing>, ApiError> {
    let listing = state.repo.get_listing(id).await?;
    authorize(&actor, &listing)?;
    Ok(Json(listing))
}

/// search_listings
///
/// [Authenticated Route] Finds advertisements matching **any** of the given
/// filters (see [`SearchPlan`]). At least one filter is required; the check runs
/// before the token is looked up.
#[utoipa::path(
    get,
    path = "/advertisement",
    params(SearchParams),
    responses(
        (status = 200, description = "Matches, at most 10 000", body = SearchListingsResponse),
        (status = 400, description = "No filter given")
    )
)]
pub async fn search_listings(
    plan: SearchPlan,
    _actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SearchListingsResponse>, ApiError> {
    let listings = state.repo.search_listings(&plan).await?;
    tracing::debug!(matches = listings.len(), "search done");
    Ok(Json(SearchListingsResponse { listings }))
}

/// update_listing
///
/// [Authenticated Route] Partially updates title and description. Owner or admin only.
#[utoipa::path(
    patch,
    path = "/advertisement/{id}",
    params(("id" = i64, Path, description = "Advertisement ID")),
    request_body = UpdateListingRequest,
    responses(
        (status = 200, description = "Updated", body = IdResponse),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Not Found")
    )
)]
#[tracing::instrument(skip_all, fields(actor_id = actor.id, listing_id = id))]
pub async fn update_listing(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<UpdateListingRequest>,
) -> Result<Json<IdResponse>, ApiError> {
    let listing = state.repo.get_listing(id).await?;
    authorize(&actor, &listing)?;

    if !patch.is_empty() {
        state.repo.update_listing(patch.apply(listing)).await?;
    }

    Ok(Json(IdResponse { id }))
}

/// delete_listing
///
/// [Authenticated Route] Deletes an advertisement. Owner or admin only.
#[utoipa::path(
    delete,
    path = "/advertisement/{id}",
    params(("id" = i64, Path, description = "Advertisement ID")),
    responses(
        (status = 200, description = "Deleted", body = IdResponse),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Not Found")
    )
)]
#[tracing::instrument(skip_all, fields(actor_id = actor.id, listing_id = id))]
pub async fn delete_listing(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<IdResponse>, ApiError> {
    let listing = state.repo.get_listing(id).await?;
    authorize(&actor, &listing)?;
    state.repo.delete_listing(listing.id).await?;
    Ok(Json(IdResponse { id }))
}

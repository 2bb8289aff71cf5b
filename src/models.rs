use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The closed set of roles. Stored as the Postgres enum `user_role`; any other
/// value is rejected while deserializing a request body, long before a policy
/// check could see it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User
///
/// A registered identity from the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct User {
    pub id: i64,
    // Globally unique login name.
    pub name: String,
    /// Argon2 PHC string. Column and JSON key are both `password`.
    #[sqlx(rename = "password")]
    #[serde(rename = "password")]
    pub password_hash: String,
    pub role: Role,
}

/// Token
///
/// One authenticated session. Never updated after issuance; whether it is still
/// valid is derived from `creation_time` at validation time.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Token {
    pub id: i64,
    // The opaque value handed to the client.
    pub token: Uuid,
    pub user_id: i64,
    pub creation_time: DateTime<Utc>,
}

/// Listing
///
/// A record from the `listings` table, exposed over HTTP as an "advertisement".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: i64,
    // Denormalized name of the owning user, kept for search.
    pub owner: String,
    #[ts(type = "string")]
    pub date_posted: DateTime<Utc>,
    // FK to users.id. Immutable after creation.
    pub user_id: i64,
}

// --- Insert Payloads (server-side, never deserialized from clients) ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub token: Uuid,
    pub user_id: i64,
    pub creation_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub owner: String,
    pub user_id: i64,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Credentials exchanged for a session token (POST /login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

/// CreateUserRequest
///
/// Registration payload (POST /user). New accounts always start with the `user` role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    pub name: String,
    pub password: String,
}

/// UpdateUserRequest
///
/// Partial update for PATCH /user/{id}. The plaintext password is hashed before
/// it becomes part of a [`UserPatch`].
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// CreateListingRequest
///
/// Input payload for POST /advertisement. `owner` is accepted for compatibility
/// with older clients but ignored: the owner is always the authenticated caller.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateListingRequest {
    pub title: String,
    pub description: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// UpdateListingRequest
///
/// Partial update for PATCH /advertisement/{id}. Doubles as the patch value merged
/// into the stored listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UpdateListingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateListingRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }

    /// Merges the patch into `listing`, producing the record to persist.
    /// Identity, ownership and the posting date are never touched.
    pub fn apply(self, listing: Listing) -> Listing {
        Listing {
            title: self.title.unwrap_or(listing.title),
            description: self.description.unwrap_or(listing.description),
            ..listing
        }
    }
}

/// UserPatch
///
/// Validated, already-hashed changes for a user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.password_hash.is_none() && self.role.is_none()
    }

    pub fn apply(self, user: User) -> User {
        User {
            name: self.name.unwrap_or(user.name),
            password_hash: self.password_hash.unwrap_or(user.password_hash),
            role: self.role.unwrap_or(user.role),
            ..user
        }
    }
}

// --- Response Schemas (Output) ---

/// IdResponse
///
/// Returned by every create, update and delete endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct IdResponse {
    pub id: i64,
}

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: Uuid,
}

/// SearchListingsResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SearchListingsResponse {
    /// Serialized as `advs`, the key existing clients read.
    #[serde(rename = "advs")]
    pub listings: Vec<Listing>,
}

//! The role-or-ownership rule applied to every protected operation.

use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{Listing, Role, User},
};

/// Anything with a single owning user.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

impl Owned for Listing {
    fn owner_id(&self) -> i64 {
        self.user_id
    }
}

/// Users own themselves.
impl Owned for User {
    fn owner_id(&self) -> i64 {
        self.id
    }
}

/// Admins may act on anything; everyone else only on what they own.
pub fn allow(actor: &AuthUser, resource: &impl Owned) -> bool {
    actor.role == Role::Admin || actor.id == resource.owner_id()
}

pub fn authorize(actor: &AuthUser, resource: &impl Owned) -> Result<(), ApiError> {
    if allow(actor, resource) {
        Ok(())
    } else {
        tracing::warn!(
            actor_id = actor.id,
            owner_id = resource.owner_id(),
            "access denied"
        );
        Err(ApiError::Authorization)
    }
}

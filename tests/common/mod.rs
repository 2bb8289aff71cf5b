#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listing_service::{
    AppConfig, AppState,
    auth::AuthUser,
    models::{Listing, NewListing, NewToken, NewUser, Role, Token, User},
    password::hash_password,
    repository::{RepoError, Repository},
    search::{MAX_RESULTS, SearchPlan},
};
use std::sync::{
    Arc, LazyLock, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use uuid::Uuid;

/// Plaintext password of every seeded user.
pub const SEED_PASSWORD: &str = "correct horse battery staple";

// Argon2 is slow in debug builds; hash once and share the digest.
static SEED_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password(SEED_PASSWORD).expect("seed hash"));

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tokens: Vec<Token>,
    listings: Vec<Listing>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// MemoryRepository
///
/// In-memory stand-in for Postgres that enforces the same constraints as the
/// schema: unique user names, foreign keys, token cascade and the restrict rule on
/// users that still own listings. Every trait call is counted.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of `Repository` calls made so far. Seeding is not counted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call fail as if the database were down.
    pub fn go_offline(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    fn enter(&self) -> Result<std::sync::MutexGuard<'_, Tables>, RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(self.tables.lock().unwrap())
    }

    // --- Seeding (bypasses call counting) ---

    pub fn seed_user(&self, name: &str, role: Role) -> User {
        let mut tables = self.tables.lock().unwrap();
        let user = User {
            id: tables.next_id(),
            name: name.to_string(),
            password_hash: SEED_HASH.clone(),
            role,
        };
        tables.users.push(user.clone());
        user
    }

    pub fn seed_token(&self, user: &User, creation_time: DateTime<Utc>) -> Uuid {
        let mut tables = self.tables.lock().unwrap();
        let token = Token {
            id: tables.next_id(),
            token: Uuid::new_v4(),
            user_id: user.id,
            creation_time,
        };
        let value = token.token;
        tables.tokens.push(token);
        value
    }

    pub fn seed_listing(
        &self,
        owner: &User,
        title: &str,
        description: &str,
        price: i64,
        date_posted: DateTime<Utc>,
    ) -> Listing {
        let mut tables = self.tables.lock().unwrap();
        let listing = Listing {
            id: tables.next_id(),
            title: title.to_string(),
            description: description.to_string(),
            price,
            owner: owner.name.clone(),
            date_posted,
            user_id: owner.id,
        };
        tables.listings.push(listing.clone());
        listing
    }

    // --- Inspection (bypasses call counting) ---

    pub fn user(&self, id: i64) -> Option<User> {
        let tables = self.tables.lock().unwrap();
        tables.users.iter().find(|u| u.id == id).cloned()
    }

    pub fn users_named(&self, name: &str) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.users.iter().filter(|u| u.name == name).count()
    }

    pub fn listing(&self, id: i64) -> Option<Listing> {
        let tables = self.tables.lock().unwrap();
        tables.listings.iter().find(|l| l.id == id).cloned()
    }

    pub fn token_count(&self, user_id: i64) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.tokens.iter().filter(|t| t.user_id == user_id).count()
    }
}

fn not_found(kind: &'static str) -> RepoError {
    RepoError::NotFound { kind }
}

fn duplicate(kind: &'static str) -> RepoError {
    RepoError::Conflict {
        kind,
        reason: "already exists",
    }
}

fn referenced(kind: &'static str) -> RepoError {
    RepoError::Conflict {
        kind,
        reason: "is still referenced by other records",
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: i64) -> Result<User, RepoError> {
        let tables = self.enter()?;
        tables
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(not_found("User"))
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, RepoError> {
        let tables = self.enter()?;
        Ok(tables.users.iter().find(|u| u.name == name).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut tables = self.enter()?;
        if tables.users.iter().any(|u| u.name == user.name) {
            return Err(duplicate("User"));
        }
        let user = User {
            id: tables.next_id(),
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.enter()?;
        if tables
            .users
            .iter()
            .any(|u| u.id != user.id && u.name == user.name)
        {
            return Err(duplicate("User"));
        }
        let slot = tables
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(not_found("User"))?;
        *slot = user.clone();
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> Result<(), RepoError> {
        let mut tables = self.enter()?;
        if !tables.users.iter().any(|u| u.id == id) {
            return Err(not_found("User"));
        }
        if tables.listings.iter().any(|l| l.user_id == id) {
            return Err(referenced("User"));
        }
        tables.tokens.retain(|t| t.user_id != id);
        tables.users.retain(|u| u.id != id);
        Ok(())
    }

    async fn count_listings_by_user(&self, user_id: i64) -> Result<i64, RepoError> {
        let tables = self.enter()?;
        Ok(tables.listings.iter().filter(|l| l.user_id == user_id).count() as i64)
    }

    async fn create_token(&self, token: NewToken) -> Result<Token, RepoError> {
        let mut tables = self.enter()?;
        if !tables.users.iter().any(|u| u.id == token.user_id) {
            return Err(referenced("Token"));
        }
        let token = Token {
            id: tables.next_id(),
            token: token.token,
            user_id: token.user_id,
            creation_time: token.creation_time,
        };
        tables.tokens.push(token.clone());
        Ok(token)
    }

    async fn find_token(&self, value: Uuid) -> Result<Option<Token>, RepoError> {
        let tables = self.enter()?;
        Ok(tables.tokens.iter().find(|t| t.token == value).cloned())
    }

    async fn get_listing(&self, id: i64) -> Result<Listing, RepoError> {
        let tables = self.enter()?;
        tables
            .listings
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(not_found("Advertisement"))
    }

    async fn create_listing(&self, listing: NewListing) -> Result<Listing, RepoError> {
        let mut tables = self.enter()?;
        if !tables.users.iter().any(|u| u.id == listing.user_id) {
            return Err(referenced("Advertisement"));
        }
        let listing = Listing {
            id: tables.next_id(),
            title: listing.title,
            description: listing.description,
            price: listing.price,
            owner: listing.owner,
            date_posted: Utc::now(),
            user_id: listing.user_id,
        };
        tables.listings.push(listing.clone());
        Ok(listing)
    }

    async fn update_listing(&self, listing: Listing) -> Result<Listing, RepoError> {
        let mut tables = self.enter()?;
        let slot = tables
            .listings
            .iter_mut()
            .find(|l| l.id == listing.id)
            .ok_or(not_found("Advertisement"))?;
        slot.title = listing.title;
        slot.description = listing.description;
        Ok(slot.clone())
    }

    async fn delete_listing(&self, id: i64) -> Result<(), RepoError> {
        let mut tables = self.enter()?;
        let before = tables.listings.len();
        tables.listings.retain(|l| l.id != id);
        if tables.listings.len() == before {
            return Err(not_found("Advertisement"));
        }
        Ok(())
    }

    async fn search_listings(&self, plan: &SearchPlan) -> Result<Vec<Listing>, RepoError> {
        let tables = self.enter()?;
        let mut found: Vec<Listing> = tables
            .listings
            .iter()
            .filter(|l| plan.matches(l))
            .cloned()
            .collect();
        found.sort_by_key(|l| l.id);
        found.truncate(MAX_RESULTS as usize);
        Ok(found)
    }
}

// --- State and identity helpers ---

pub fn create_test_state(repo: Arc<MemoryRepository>) -> AppState {
    AppState {
        repo,
        config: AppConfig::default(),
    }
}

pub fn actor(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        name: user.name.clone(),
        role: user.role,
    }
}

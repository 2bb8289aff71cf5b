use crate::{
    models::{Listing, NewListing, NewToken, NewUser, Token, User},
    search::{MAX_RESULTS, SearchPlan},
};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, postgres::PgRow, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// RepoError
///
/// Everything the persistence layer can report. Raw `sqlx` errors are translated
/// here and never reach a handler.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{kind} not found")]
    NotFound { kind: &'static str },
    /// A uniqueness or foreign-key constraint rejected the write; nothing was applied.
    #[error("{kind} {reason}")]
    Conflict {
        kind: &'static str,
        reason: &'static str,
    },
    /// Connection, pool or driver failure. Logged where it is produced.
    #[error("storage unavailable")]
    Unavailable(#[source] sqlx::Error),
}

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers only ever see this
/// trait (through [`RepositoryState`]), so tests can swap in an in-memory store.
///
/// Writes take complete values: updates receive the record as it should look
/// afterwards, already merged with the client's patch.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> Result<User, RepoError>;
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, RepoError>;
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    async fn update_user(&self, user: User) -> Result<User, RepoError>;
    // Tokens cascade in the schema; owned listings make this a conflict.
    async fn delete_user(&self, id: i64) -> Result<(), RepoError>;
    async fn count_listings_by_user(&self, user_id: i64) -> Result<i64, RepoError>;

    // --- Tokens ---
    async fn create_token(&self, token: NewToken) -> Result<Token, RepoError>;
    async fn find_token(&self, value: Uuid) -> Result<Option<Token>, RepoError>;

    // --- Listings ---
    async fn get_listing(&self, id: i64) -> Result<Listing, RepoError>;
    async fn create_listing(&self, listing: NewListing) -> Result<Listing, RepoError>;
    async fn update_listing(&self, listing: Listing) -> Result<Listing, RepoError>;
    async fn delete_listing(&self, id: i64) -> Result<(), RepoError>;
    async fn search_listings(&self, plan: &SearchPlan) -> Result<Vec<Listing>, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Record
///
/// Table metadata that lets one generic code path fetch, write and delete every
/// record kind.
pub trait Record: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    /// Human-readable kind used in error messages.
    const KIND: &'static str;
    const TABLE: &'static str;
    /// Column list in `FromRow` order, used for SELECT and RETURNING.
    const COLUMNS: &'static str;
}

impl Record for User {
    const KIND: &'static str = "User";
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str = "id, name, password, role";
}

impl Record for Token {
    const KIND: &'static str = "Token";
    const TABLE: &'static str = "tokens";
    const COLUMNS: &'static str = "id, token, user_id, creation_time";
}

impl Record for Listing {
    const KIND: &'static str = "Advertisement";
    const TABLE: &'static str = "listings";
    const COLUMNS: &'static str = "id, title, description, price, owner, date_posted, user_id";
}

/// Maps a driver error onto the repository taxonomy.
fn translate(kind: &'static str, err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::RowNotFound => RepoError::NotFound { kind },
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict {
            kind,
            reason: "already exists",
        },
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepoError::Conflict {
            kind,
            reason: "is still referenced by other records",
        },
        _ => {
            tracing::error!(error = ?err, kind, "storage failure");
            RepoError::Unavailable(err)
        }
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Point lookup by primary key. Absence is an error, never a silent `None`.
    async fn fetch_by_id<T: Record>(&self, id: i64) -> Result<T, RepoError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", T::COLUMNS, T::TABLE);
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| translate(T::KIND, e))?
            .ok_or(RepoError::NotFound { kind: T::KIND })
    }

    /// Runs a single `INSERT ... RETURNING` or `UPDATE ... RETURNING` inside its own
    /// transaction. Any failure rolls the transaction back before it is reported.
    async fn write<T: Record>(
        &self,
        mut query: QueryBuilder<'static, Postgres>,
    ) -> Result<T, RepoError> {
        let mut tx = self.pool.begin().await.map_err(|e| translate(T::KIND, e))?;

        let written = query.build_query_as::<T>().fetch_optional(&mut *tx).await;
        match written {
            Ok(Some(record)) => {
                tx.commit().await.map_err(|e| translate(T::KIND, e))?;
                Ok(record)
            }
            Ok(None) => {
                rollback(tx, T::KIND).await;
                Err(RepoError::NotFound { kind: T::KIND })
            }
            Err(e) => {
                rollback(tx, T::KIND).await;
                Err(translate(T::KIND, e))
            }
        }
    }

    async fn remove<T: Record>(&self, id: i64) -> Result<(), RepoError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
        let mut tx = self.pool.begin().await.map_err(|e| translate(T::KIND, e))?;

        let deleted = sqlx::query(&sql).bind(id).execute(&mut *tx).await;
        match deleted {
            Ok(done) if done.rows_affected() > 0 => {
                tx.commit().await.map_err(|e| translate(T::KIND, e))
            }
            Ok(_) => {
                rollback(tx, T::KIND).await;
                Err(RepoError::NotFound { kind: T::KIND })
            }
            Err(e) => {
                rollback(tx, T::KIND).await;
                Err(translate(T::KIND, e))
            }
        }
    }
}

async fn rollback(tx: sqlx::Transaction<'_, Postgres>, kind: &'static str) {
    if let Err(e) = tx.rollback().await {
        tracing::error!(error = ?e, kind, "rollback failed");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: i64) -> Result<User, RepoError> {
        self.fetch_by_id::<User>(id).await
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE name = $1", User::COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| translate(User::KIND, e))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut query = QueryBuilder::new("INSERT INTO users (name, password, role) VALUES (");
        {
            let mut values = query.separated(", ");
            values.push_bind(user.name);
            values.push_bind(user.password_hash);
            values.push_bind(user.role);
        }
        query.push(") RETURNING ").push(User::COLUMNS);
        self.write::<User>(query).await
    }

    async fn update_user(&self, user: User) -> Result<User, RepoError> {
        let mut query = QueryBuilder::new("UPDATE users SET name = ");
        query
            .push_bind(user.name)
            .push(", password = ")
            .push_bind(user.password_hash)
            .push(", role = ")
            .push_bind(user.role)
            .push(" WHERE id = ")
            .push_bind(user.id)
            .push(" RETURNING ")
            .push(User::COLUMNS);
        self.write::<User>(query).await
    }

    async fn delete_user(&self, id: i64) -> Result<(), RepoError> {
        self.remove::<User>(id).await
    }

    async fn count_listings_by_user(&self, user_id: i64) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| translate(Listing::KIND, e))
    }

    async fn create_token(&self, token: NewToken) -> Result<Token, RepoError> {
        let mut query =
            QueryBuilder::new("INSERT INTO tokens (token, user_id, creation_time) VALUES (");
        {
            let mut values = query.separated(", ");
            values.push_bind(token.token);
            values.push_bind(token.user_id);
            values.push_bind(token.creation_time);
        }
        query.push(") RETURNING ").push(Token::COLUMNS);
        self.write::<Token>(query).await
    }

    async fn find_token(&self, value: Uuid) -> Result<Option<Token>, RepoError> {
        let sql = format!("SELECT {} FROM tokens WHERE token = $1", Token::COLUMNS);
        sqlx::query_as::<_, Token>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| translate(Token::KIND, e))
    }

    async fn get_listing(&self, id: i64) -> Result<Listing, RepoError> {
        self.fetch_by_id::<Listing>(id).await
    }

    async fn create_listing(&self, listing: NewListing) -> Result<Listing, RepoError> {
        let mut query = QueryBuilder::new(
            "INSERT INTO listings (title, description, price, owner, user_id) VALUES (",
        );
        {
            let mut values = query.separated(", ");
            values.push_bind(listing.title);
            values.push_bind(listing.description);
            values.push_bind(listing.price);
            values.push_bind(listing.owner);
            values.push_bind(listing.user_id);
        }
        query.push(") RETURNING ").push(Listing::COLUMNS);
        self.write::<Listing>(query).await
    }

    /// Only the mutable columns are written; owner and posting date stay as stored.
    async fn update_listing(&self, listing: Listing) -> Result<Listing, RepoError> {
        let mut query = QueryBuilder::new("UPDATE listings SET title = ");
        query
            .push_bind(listing.title)
            .push(", description = ")
            .push_bind(listing.description)
            .push(" WHERE id = ")
            .push_bind(listing.id)
            .push(" RETURNING ")
            .push(Listing::COLUMNS);
        self.write::<Listing>(query).await
    }

    async fn delete_listing(&self, id: i64) -> Result<(), RepoError> {
        self.remove::<Listing>(id).await
    }

    async fn search_listings(&self, plan: &SearchPlan) -> Result<Vec<Listing>, RepoError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM listings WHERE ", Listing::COLUMNS));
        plan.push_conditions(&mut query);
        query.push(" ORDER BY id LIMIT ").push_bind(MAX_RESULTS);

        query
            .build_query_as::<Listing>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| translate(Listing::KIND, e))
    }
}

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::users::repo_types::{NewUser, User, UserChanges};

const USER_COLUMNS: &str =
    "id, name, email, username, password_hash, api_token_hash, created_at, updated_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already taken")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations the account service needs.
///
/// Ids are assigned by the store, ascend with insertion and are never reused.
/// Email comparisons are case-insensitive.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, id: i64) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_by_api_token(&self, token_hash: &str) -> StoreResult<Option<User>>;

    /// Whether another record already uses `email`, ignoring the record `except`.
    async fn email_taken(&self, email: &str, except: Option<i64>) -> StoreResult<bool>;

    /// One page ordered by id, plus the total number of records.
    async fn paginate(&self, page: i64, per_page: i64) -> StoreResult<(Vec<User>, i64)>;

    async fn create(&self, new_user: NewUser) -> StoreResult<User>;

    /// Returns `None` when no record has this id.
    async fn update(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>>;

    async fn set_api_token(&self, id: i64, token_hash: &str) -> StoreResult<bool>;

    async fn delete(&self, id: i64) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_unique(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_api_token(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE api_token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE LOWER(email) = LOWER($1)
                  AND ($2::BIGINT IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.db)
        .await?;
        Ok(taken)
    }

    async fn paginate(&self, page: i64, per_page: i64) -> StoreResult<(Vec<User>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        let offset = (page.max(1) - 1).saturating_mul(per_page);
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok((rows, total))
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, username, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique)?;
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = $2, email = $3, username = $4, password_hash = $5,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.username)
        .bind(&changes.password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(map_unique)?;
        Ok(user)
    }

    async fn set_api_token(&self, id: i64, token_hash: &str) -> StoreResult<bool> {
        let res = sqlx::query(
            "UPDATE users SET api_token_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

//! User persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::{Role, User};
use crate::common::pagination::Page;
use crate::common::{AppError, AppResult, UserId};

/// New-user parameters for the login upsert.
#[derive(Debug, Clone)]
pub struct UpsertUser<'a> {
    pub id: UserId,
    pub subject: &'a str,
    pub email: &'a str,
    pub display_name: &'a str,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Create the user with role GENERAL if the email is unknown, otherwise
    /// refresh the display name. Returns the stored row either way.
    async fn upsert_by_email(&self, params: UpsertUser<'_>) -> AppResult<User>;

    async fn list(&self, page: Page) -> AppResult<Vec<User>>;

    /// Add penalty points with a fresh expiry (late-cancel / no-show
    /// accounting).
    async fn add_penalty(
        &self,
        id: UserId,
        points: i32,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// Postgres implementation.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 AND deleted_at IS NULL")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn upsert_by_email(&self, params: UpsertUser<'_>) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, subject, email, display_name, role, penalty_score,
                is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 0, TRUE, $6, $6)
            ON CONFLICT (email) DO UPDATE
                SET display_name = EXCLUDED.display_name,
                    updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(params.id)
        .bind(params.subject)
        .bind(params.email)
        .bind(params.display_name)
        .bind(Role::General)
        .bind(params.now)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn list(&self, page: Page) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn add_penalty(
        &self,
        id: UserId,
        points: i32,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET penalty_score = penalty_score + $2,
                penalty_expires_at = $3,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(points)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user"));
        }
        Ok(())
    }
}

//! Audit persistence and filtered listing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::{AuditAction, AuditEntry};
use crate::common::pagination::Page;
use crate::common::{AppResult, UserId};

/// Optional filters for the audit listing; all present filters must match.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub user_id: Option<UserId>,
    pub action: Option<AuditAction>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append-only; entries are never updated or deleted.
    async fn append(&self, entry: &AuditEntry) -> AppResult<()>;

    /// Newest-first listing with offset/limit pagination.
    async fn list(&self, filter: &AuditFilter, page: Page) -> AppResult<Vec<AuditEntry>>;
}

/// Postgres implementation.
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, entry: &AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (
                id, actor_user_id, action, target_type, target_id, details,
                ip_address, user_agent, created_at, signature
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.actor_user_id)
        .bind(entry.action)
        .bind(&entry.target_type)
        .bind(&entry.target_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .bind(&entry.signature)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, filter: &AuditFilter, page: Page) -> AppResult<Vec<AuditEntry>> {
        sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT * FROM audit_entries
            WHERE ($1::uuid IS NULL OR actor_user_id = $1)
              AND ($2::audit_action IS NULL OR action = $2)
              AND ($3::text IS NULL OR target_type = $3)
              AND ($4::text IS NULL OR target_id = $4)
              AND ($5::timestamptz IS NULL OR created_at >= $5)
              AND ($6::timestamptz IS NULL OR created_at <= $6)
            ORDER BY created_at DESC
            OFFSET $7 LIMIT $8
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.action)
        .bind(&filter.target_type)
        .bind(&filter.target_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }
}

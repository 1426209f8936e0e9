//! Resource persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use typed_builder::TypedBuilder;

use super::models::{Resource, ResourceType};
use crate::common::{AppError, AppResult, ResourceId};
use crate::domains::users::Role;

#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct CreateResource {
    pub id: ResourceId,
    pub name: String,
    pub resource_type: ResourceType,
    #[builder(default)]
    pub capacity: Option<i32>,
    #[builder(default)]
    pub location: Option<String>,
    #[builder(default = serde_json::json!({}))]
    pub attributes: serde_json::Value,
    #[builder(default)]
    pub required_role: Option<Role>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateResource {
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub required_role: Option<Role>,
    pub is_active: Option<bool>,
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn create(&self, params: CreateResource) -> AppResult<Resource>;

    async fn update(&self, id: ResourceId, params: UpdateResource) -> AppResult<Resource>;

    async fn delete(&self, id: ResourceId) -> AppResult<()>;

    async fn find_by_id(&self, id: ResourceId) -> AppResult<Option<Resource>>;

    /// All IDs in the set, active or not. Used to validate booking requests.
    async fn find_by_ids(&self, ids: &[ResourceId]) -> AppResult<Vec<Resource>>;

    async fn list(&self, resource_type: Option<ResourceType>) -> AppResult<Vec<Resource>>;

    /// Active resources of `resource_type` with no confirmed instance
    /// overlapping `[start, end)`.
    async fn find_available(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resource_type: ResourceType,
    ) -> AppResult<Vec<Resource>>;
}

/// Postgres implementation.
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn create(&self, params: CreateResource) -> AppResult<Resource> {
        sqlx::query_as::<_, Resource>(
            r#"
            INSERT INTO resources (
                id, name, resource_type, capacity, location, attributes,
                required_role, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8)
            RETURNING *
            "#,
        )
        .bind(params.id)
        .bind(&params.name)
        .bind(params.resource_type)
        .bind(params.capacity)
        .bind(&params.location)
        .bind(&params.attributes)
        .bind(params.required_role)
        .bind(params.now)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn update(&self, id: ResourceId, params: UpdateResource) -> AppResult<Resource> {
        sqlx::query_as::<_, Resource>(
            r#"
            UPDATE resources SET
                name = COALESCE($2, name),
                capacity = COALESCE($3, capacity),
                location = COALESCE($4, location),
                attributes = COALESCE($5, attributes),
                required_role = COALESCE($6, required_role),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&params.name)
        .bind(params.capacity)
        .bind(&params.location)
        .bind(&params.attributes)
        .bind(params.required_role)
        .bind(params.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("resource"))
    }

    async fn delete(&self, id: ResourceId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("resource"));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: ResourceId) -> AppResult<Option<Resource>> {
        sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn find_by_ids(&self, ids: &[ResourceId]) -> AppResult<Vec<Resource>> {
        sqlx::query_as::<_, Resource>("SELECT * FROM resources WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn list(&self, resource_type: Option<ResourceType>) -> AppResult<Vec<Resource>> {
        sqlx::query_as::<_, Resource>(
            r#"
            SELECT * FROM resources
            WHERE ($1::resource_type IS NULL OR resource_type = $1)
            ORDER BY name ASC
            "#,
        )
        .bind(resource_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_available(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resource_type: ResourceType,
    ) -> AppResult<Vec<Resource>> {
        // Half-open overlap: instances merely touching [start, end) do not
        // exclude a resource.
        sqlx::query_as::<_, Resource>(
            r#"
            SELECT r.* FROM resources r
            WHERE r.resource_type = $3
              AND r.is_active
              AND NOT EXISTS (
                  SELECT 1
                  FROM reservation_instances i
                  JOIN instance_assignments a ON a.instance_id = i.id
                  WHERE a.resource_id = r.id
                    AND i.status <> 'CANCELLED'
                    AND i.start_at < $2
                    AND i.end_at > $1
              )
            ORDER BY r.name ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(resource_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }
}

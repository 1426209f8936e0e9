//! Bookable resources: meeting rooms and shared equipment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{AppError, AppResult, ResourceId};
use crate::domains::users::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resource_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    MeetingRoom,
    Equipment,
}

/// A shared physical resource.
///
/// Meeting rooms must carry a positive capacity; equipment need not.
/// `required_role` gates who may book the resource; `attributes` is a
/// free-form property bag (projector, whiteboard, …).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub resource_type: ResourceType,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    pub attributes: serde_json::Value,
    pub required_role: Option<Role>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Meeting rooms need a positive capacity.
    pub fn validate(&self) -> AppResult<()> {
        if self.resource_type == ResourceType::MeetingRoom {
            match self.capacity {
                Some(capacity) if capacity > 0 => {}
                _ => {
                    return Err(AppError::InvalidRequest(
                        "meeting rooms require a positive capacity".into(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Whether `role` clears this resource's booking gate.
    pub fn bookable_by(&self, role: Role) -> bool {
        match self.required_role {
            Some(required) => role.satisfies(required),
            None => true,
        }
    }
}

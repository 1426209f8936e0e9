//! Instance-to-resource assignments.

use serde::{Deserialize, Serialize};

use crate::common::{InstanceId, ResourceId};

/// Links one instance to one resource. The engine guarantees that no two
/// non-cancelled instances assigned to the same resource hold overlapping
/// `[start_at, end_at)` intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub instance_id: InstanceId,
    pub resource_id: ResourceId,
}

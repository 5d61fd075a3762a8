use serde::Deserialize;

use crate::groups::Role;

// Request DTOs

#[derive(Debug, Default, Deserialize)]
pub struct JoinGroupRequest {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct BulkRemoveRequest {
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RoleChange {
    pub user_id: i64,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct BulkRoleChangeRequest {
    pub changes: Vec<RoleChange>,
}

impl BulkRoleChangeRequest {
    pub fn pairs(&self) -> Vec<(i64, Role)> {
        self.changes.iter().map(|c| (c.user_id, c.role)).collect()
    }
}

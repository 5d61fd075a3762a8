//! Result shapes returned across the governance boundary.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{Group, InvitationLink, JoinRequest, Membership};
use crate::GroupError;

/// Message shown in place of infrastructure fault details.
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong, please try again later";

/// Uniform envelope returned by every [`GroupAdminFacade`](super::GroupAdminFacade)
/// operation.
///
/// Serializes as `{success, data?, errorKind?, message}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(rename = "errorKind", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    pub message: String,
    /// The typed error behind a failed response. Not serialized.
    #[serde(skip)]
    pub error: Option<GroupError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_kind: None,
            message: message.into(),
            error: None,
        }
    }

    /// Builds a failed response. Infrastructure faults get a generic message.
    pub fn failure(error: GroupError) -> Self {
        Self {
            success: false,
            data: None,
            error_kind: Some(error.kind()),
            message: user_message(&error),
            error: Some(error),
        }
    }

    /// Returns the data of a successful response.
    pub fn into_result(self) -> Result<T, GroupError> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(GroupError::Internal("response carried no data".into())),
        }
    }
}

fn user_message(error: &GroupError) -> String {
    if error.is_internal() {
        INTERNAL_ERROR_MESSAGE.to_owned()
    } else {
        error.to_string()
    }
}

/// One item of a bulk operation that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    /// The request id or user id the item refers to.
    pub id: i64,
    #[serde(rename = "errorKind")]
    pub error_kind: &'static str,
    pub message: String,
    #[serde(skip)]
    pub error: GroupError,
}

impl BulkFailure {
    pub fn new(id: i64, error: GroupError) -> Self {
        Self {
            id,
            error_kind: error.kind(),
            message: user_message(&error),
            error,
        }
    }
}

/// Per-member outcome of a bulk membership change.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BulkFailure>,
}

impl<T> Default for BulkOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// A join request together with the membership its approval created.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovedRequest {
    pub request: JoinRequest,
    pub membership: Membership,
}

/// Outcome of approving every pending request of a group.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkApproval {
    pub approved: Vec<ApprovedRequest>,
    pub failed: Vec<BulkFailure>,
}

/// Outcome of rejecting every pending request of a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkRejection {
    pub rejected: usize,
}

/// What a governor sees when issuing or fetching the shareable link.
#[derive(Debug, Clone, Serialize)]
pub struct LinkView {
    pub token: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl LinkView {
    pub fn new(link: &InvitationLink, url: String) -> Self {
        Self {
            token: link.token.clone(),
            url,
            expires_at: link.expires_at,
        }
    }
}

/// Public summary of a group and its roster.
#[derive(Debug, Clone, Serialize)]
pub struct GroupInfo {
    pub group: Group,
    pub member_count: u32,
    pub admin_count: u32,
    /// `None` when the group has no ceiling.
    pub open_slots: Option<u32>,
}

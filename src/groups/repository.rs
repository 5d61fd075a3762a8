//! Storage traits for group governance.
//!
//! Composite operations that must be atomic (`admit`, `replace_active`,
//! `create_pending`, `reject`) are single trait methods so each backend can
//! run them inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{Group, GroupStatus, GroupVisibility, InvitationLink, JoinRequest, Membership};
use super::Role;
use crate::GroupError;

#[derive(Debug, Clone)]
pub struct CreateGroup {
    pub name: String,
    pub owner_id: i64,
    pub max_members: u32,
    pub visibility: GroupVisibility,
}

/// Partial update of a group's settings. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct GroupSettings {
    pub max_members: Option<u32>,
    pub visibility: Option<GroupVisibility>,
    pub status: Option<GroupStatus>,
}

impl GroupSettings {
    pub fn is_empty(&self) -> bool {
        self.max_members.is_none() && self.visibility.is_none() && self.status.is_none()
    }
}

/// What an admission consumes, re-validated inside the admission transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionSource {
    /// No credential; used for seeding and direct adds.
    Direct,
    /// An invitation link that must still be unrevoked and unexpired.
    InvitationLink { link_id: i64 },
    /// A join request that must still be pending; it is marked approved
    /// in the same transaction.
    JoinRequest { request_id: i64, processed_by: i64 },
}

/// A request to add `user_id` to `group_id`.
#[derive(Debug, Clone)]
pub struct Admission {
    pub group_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub source: AdmissionSource,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateInvitationLink {
    pub group_id: i64,
    pub token: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateJoinRequest {
    pub group_id: i64,
    pub user_id: i64,
    pub message: Option<String>,
    pub requested_at: DateTime<Utc>,
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Creates a group together with its owner's membership.
    async fn create(&self, data: CreateGroup, at: DateTime<Utc>) -> Result<Group, GroupError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Group>, GroupError>;
    async fn update_settings(
        &self,
        id: i64,
        settings: &GroupSettings,
        at: DateTime<Utc>,
    ) -> Result<Group, GroupError>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Admits a user in one transaction.
    ///
    /// Under a lock on the group row: validates the [`AdmissionSource`],
    /// refuses an existing active membership (`AlreadyMember`), refuses a
    /// full group (`CapacityExceeded`), then inserts or reactivates the
    /// membership. On any error nothing is written.
    async fn admit(&self, admission: Admission) -> Result<Membership, GroupError>;
    async fn find_active(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<Membership>, GroupError>;
    /// Active memberships, oldest first.
    async fn list_active(&self, group_id: i64) -> Result<Vec<Membership>, GroupError>;
    async fn count_active(&self, group_id: i64) -> Result<u32, GroupError>;
    /// Changes the role of an active membership (`MemberNotFound` otherwise).
    async fn update_role(
        &self,
        group_id: i64,
        user_id: i64,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Membership, GroupError>;
    /// Marks an active membership removed (`MemberNotFound` otherwise).
    async fn mark_removed(
        &self,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Membership, GroupError>;
}

#[async_trait]
pub trait InvitationLinkRepository: Send + Sync {
    /// Revokes every unrevoked link of the group and inserts the new one,
    /// in one transaction.
    async fn replace_active(&self, data: CreateInvitationLink)
    -> Result<InvitationLink, GroupError>;
    async fn find_by_token(&self, token: &str) -> Result<Option<InvitationLink>, GroupError>;
    /// The unrevoked, unexpired link of the group, if any.
    async fn find_active(
        &self,
        group_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<InvitationLink>, GroupError>;
    /// Revokes every unrevoked link of the group. Returns how many were revoked.
    async fn revoke_all(&self, group_id: i64) -> Result<u64, GroupError>;
}

#[async_trait]
pub trait JoinRequestRepository: Send + Sync {
    /// Inserts a pending request in one transaction, refusing users who are
    /// already active members (`AlreadyMember`) or already have a pending
    /// request (`DuplicatePending`).
    async fn create_pending(&self, data: CreateJoinRequest) -> Result<JoinRequest, GroupError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<JoinRequest>, GroupError>;
    /// Pending requests of the group ordered by `requested_at`, then id.
    async fn list_pending(&self, group_id: i64) -> Result<Vec<JoinRequest>, GroupError>;
    /// Moves a pending request to rejected. `RequestNotPending` if it was
    /// already processed, `RequestNotFound` if it does not exist.
    async fn reject(
        &self,
        id: i64,
        processed_by: i64,
        at: DateTime<Utc>,
    ) -> Result<JoinRequest, GroupError>;
}

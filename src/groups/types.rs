//! Core types for group governance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// Whether a group is listed publicly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupVisibility {
    Public,
    Private,
}

impl GroupVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Lifecycle status of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Active,
    Inactive,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// A study group with a membership ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier.
    pub id: i64,
    /// Human-readable group name.
    pub name: String,
    /// User ID of the group owner.
    pub owner_id: i64,
    /// Maximum number of active members. `0` means unlimited.
    pub max_members: u32,
    pub visibility: GroupVisibility,
    pub status: GroupStatus,
    /// When the group was created.
    pub created_at: DateTime<Utc>,
    /// When the group settings were last updated.
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Returns true if the group has a membership ceiling.
    pub fn is_capped(&self) -> bool {
        self.max_members > 0
    }

    /// Returns true if `active_members` leaves room for one more admission.
    pub fn has_room_for(&self, active_members: u32) -> bool {
        !self.is_capped() || active_members < self.max_members
    }

    /// Remaining open slots, or `None` when unlimited.
    pub fn open_slots(&self, active_members: u32) -> Option<u32> {
        self.is_capped()
            .then(|| self.max_members.saturating_sub(active_members))
    }
}

/// Whether a membership is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Removed,
}

impl MembershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Removed => "removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Links a user to a group with a role.
///
/// Identified by `(group_id, user_id)`. Removal flips `status` to
/// [`MembershipStatus::Removed`]; the row is kept for history and
/// reactivated if the user is admitted again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub status: MembershipStatus,
    /// When the user (most recently) joined the group.
    pub joined_at: DateTime<Utc>,
    /// When the membership was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

/// A shareable, time-limited link that admits whoever redeems it.
///
/// The token is multi-use until it expires or is revoked.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationLink {
    /// Unique identifier.
    pub id: i64,
    /// The group the link admits into.
    pub group_id: i64,
    /// Opaque random token.
    pub token: String,
    /// User ID of who issued the link.
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    /// When the link stops being redeemable.
    pub expires_at: DateTime<Utc>,
    /// Set when the link is explicitly revoked or replaced.
    pub revoked: bool,
}

impl InvitationLink {
    /// Check if the link has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check if the link can still be redeemed at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }
}

impl std::fmt::Debug for InvitationLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvitationLink")
            .field("id", &self.id)
            .field("group_id", &self.group_id)
            .field("token", &"[REDACTED]")
            .field("created_by", &self.created_by)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("revoked", &self.revoked)
            .finish()
    }
}

/// Where a join request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl JoinRequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A user's request to join a group, decided by an owner or admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Unique identifier.
    pub id: i64,
    pub group_id: i64,
    /// The user asking to join.
    pub user_id: i64,
    /// Optional note to the group admins.
    pub message: Option<String>,
    pub status: JoinRequestStatus,
    pub requested_at: DateTime<Utc>,
    /// Who approved or rejected the request.
    pub processed_by: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl JoinRequest {
    pub fn is_pending(&self) -> bool {
        self.status == JoinRequestStatus::Pending
    }
}

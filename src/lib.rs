//! Membership governance for capacity-bounded groups.
//!
//! `groupgate` decides who gets into a group and who may change it:
//!
//! - [`groups::InvitationLinkService`] issues one shareable, time-limited
//!   invitation link per group and admits whoever redeems it.
//! - [`groups::JoinRequestWorkflow`] records join requests and lets owners
//!   and admins approve or reject them, one at a time or in bulk.
//! - [`groups::MembershipStore`] performs every admission, enforcing the
//!   group's `max_members` ceiling inside a single storage transaction.
//! - [`groups::RoleGuard`] checks the caller's role against an explicit set
//!   of allowed roles before any mutation.
//! - [`groups::GroupAdminFacade`] composes the above and returns a uniform
//!   [`groups::ApiResponse`] envelope for every operation.
//!
//! Storage is abstracted behind the repository traits in [`groups`]. A
//! `SQLite` backend ships behind the `sqlx_sqlite` feature and in-memory
//! repositories behind the `mocks` feature.

use std::fmt;

pub mod clock;
pub mod config;
pub mod context;
pub mod crypto;
pub mod events;
pub mod groups;

#[cfg(feature = "sqlx_sqlite")]
pub mod sqlite;

#[cfg(feature = "axum_api")]
pub mod api;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GovernanceConfig;
pub use context::GovernanceContext;
pub use events::{EventDispatcher, GroupEvent, Listener};

/// Errors returned by every governance operation.
///
/// All variants except [`GroupError::DatabaseError`] and
/// [`GroupError::Internal`] are expected business outcomes and are returned
/// to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// The caller has no active membership in the group.
    NotMember,
    /// The caller's role is not in the operation's allowed role set.
    InsufficientRole,
    /// The group has reached `max_members` active members.
    CapacityExceeded,
    /// The user already holds an active membership in the group.
    AlreadyMember,
    /// The user already has a pending join request for the group.
    DuplicatePending,
    /// No invitation link exists for the token.
    InvalidToken,
    /// The invitation link is past its expiry.
    TokenExpired,
    /// The invitation link was revoked or replaced.
    TokenRevoked,
    /// The join request was already approved or rejected.
    RequestNotPending,
    /// The owner's membership cannot be removed.
    CannotRemoveOwner,
    /// The owner role cannot be granted through a role change.
    CannotAssignOwner,
    /// The owner's own role cannot be changed.
    CannotChangeOwnerRole,
    /// The group does not exist.
    GroupNotFound,
    /// The join request does not exist.
    RequestNotFound,
    /// The target user has no active membership in the group.
    MemberNotFound,
    /// The caller could not be identified.
    Unauthenticated,
    /// Input failed validation.
    Validation(String),
    /// The storage backend failed.
    DatabaseError(String),
    /// Unexpected internal failure.
    Internal(String),
}

impl GroupError {
    /// Stable machine-readable code used as `errorKind` in responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotMember => "NOT_MEMBER",
            Self::InsufficientRole => "INSUFFICIENT_ROLE",
            Self::CapacityExceeded => "CAPACITY_EXCEEDED",
            Self::AlreadyMember => "ALREADY_MEMBER",
            Self::DuplicatePending => "DUPLICATE_PENDING",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenRevoked => "TOKEN_REVOKED",
            Self::RequestNotPending => "REQUEST_NOT_PENDING",
            Self::CannotRemoveOwner => "CANNOT_REMOVE_OWNER",
            Self::CannotAssignOwner => "CANNOT_ASSIGN_OWNER",
            Self::CannotChangeOwnerRole => "CANNOT_CHANGE_OWNER_ROLE",
            Self::GroupNotFound => "GROUP_NOT_FOUND",
            Self::RequestNotFound => "REQUEST_NOT_FOUND",
            Self::MemberNotFound => "MEMBER_NOT_FOUND",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::DatabaseError(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true for infrastructure faults rather than business outcomes.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::DatabaseError(_) | Self::Internal(_))
    }
}

impl std::error::Error for GroupError {}

impl fmt::Display for GroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotMember => write!(f, "You are not a member of this group"),
            Self::InsufficientRole => {
                write!(f, "Your role in this group does not allow this action")
            }
            Self::CapacityExceeded => write!(f, "This group is full"),
            Self::AlreadyMember => write!(f, "You are already a member of this group"),
            Self::DuplicatePending => {
                write!(f, "You already have a pending request to join this group")
            }
            Self::InvalidToken => write!(f, "This invitation link is not valid"),
            Self::TokenExpired => {
                write!(f, "This invitation link has expired, ask for a new one")
            }
            Self::TokenRevoked => {
                write!(f, "This invitation link was replaced, ask for the new one")
            }
            Self::RequestNotPending => write!(f, "This join request was already processed"),
            Self::CannotRemoveOwner => write!(f, "The group owner cannot be removed"),
            Self::CannotAssignOwner => {
                write!(f, "Ownership cannot be granted by changing a member's role")
            }
            Self::CannotChangeOwnerRole => write!(f, "The group owner's role cannot be changed"),
            Self::GroupNotFound => write!(f, "Group not found"),
            Self::RequestNotFound => write!(f, "Join request not found"),
            Self::MemberNotFound => write!(f, "That user is not a member of this group"),
            Self::Unauthenticated => write!(f, "Authentication required"),
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

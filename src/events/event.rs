use chrono::{DateTime, Utc};

use crate::groups::Role;

/// Governance events emitted after a state change has been committed.
///
/// Notification delivery lives outside this crate; listeners receive these
/// events and decide what to send.
#[derive(Debug, Clone)]
pub enum GroupEvent {
    // membership
    MemberAdmitted {
        group_id: i64,
        user_id: i64,
        role: Role,
        at: DateTime<Utc>,
    },
    MemberRemoved {
        group_id: i64,
        user_id: i64,
        removed_by: i64,
        at: DateTime<Utc>,
    },
    MemberRoleChanged {
        group_id: i64,
        user_id: i64,
        role: Role,
        changed_by: i64,
        at: DateTime<Utc>,
    },

    // invitation links
    InvitationLinkIssued {
        group_id: i64,
        link_id: i64,
        issued_by: i64,
        expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    InvitationLinkRevoked {
        group_id: i64,
        revoked_by: i64,
        at: DateTime<Utc>,
    },

    // join requests
    JoinRequestSubmitted {
        group_id: i64,
        request_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    },
    JoinRequestApproved {
        group_id: i64,
        request_id: i64,
        user_id: i64,
        processed_by: i64,
        at: DateTime<Utc>,
    },
    JoinRequestRejected {
        group_id: i64,
        request_id: i64,
        user_id: i64,
        processed_by: i64,
        at: DateTime<Utc>,
    },
}

impl GroupEvent {
    /// Returns a dot-separated event name for logging/tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MemberAdmitted { .. } => "group.member.admitted",
            Self::MemberRemoved { .. } => "group.member.removed",
            Self::MemberRoleChanged { .. } => "group.member.role_changed",
            Self::InvitationLinkIssued { .. } => "group.invite_link.issued",
            Self::InvitationLinkRevoked { .. } => "group.invite_link.revoked",
            Self::JoinRequestSubmitted { .. } => "group.join_request.submitted",
            Self::JoinRequestApproved { .. } => "group.join_request.approved",
            Self::JoinRequestRejected { .. } => "group.join_request.rejected",
        }
    }

    /// Returns the group the event belongs to.
    pub fn group_id(&self) -> i64 {
        match self {
            Self::MemberAdmitted { group_id, .. }
            | Self::MemberRemoved { group_id, .. }
            | Self::MemberRoleChanged { group_id, .. }
            | Self::InvitationLinkIssued { group_id, .. }
            | Self::InvitationLinkRevoked { group_id, .. }
            | Self::JoinRequestSubmitted { group_id, .. }
            | Self::JoinRequestApproved { group_id, .. }
            | Self::JoinRequestRejected { group_id, .. } => *group_id,
        }
    }

    /// Returns the timestamp when this event occurred.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::MemberAdmitted { at, .. }
            | Self::MemberRemoved { at, .. }
            | Self::MemberRoleChanged { at, .. }
            | Self::InvitationLinkIssued { at, .. }
            | Self::InvitationLinkRevoked { at, .. }
            | Self::JoinRequestSubmitted { at, .. }
            | Self::JoinRequestApproved { at, .. }
            | Self::JoinRequestRejected { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let now = Utc::now();

        assert_eq!(
            GroupEvent::MemberAdmitted {
                group_id: 1,
                user_id: 2,
                role: Role::Member,
                at: now,
            }
            .name(),
            "group.member.admitted"
        );
        assert_eq!(
            GroupEvent::JoinRequestRejected {
                group_id: 1,
                request_id: 3,
                user_id: 2,
                processed_by: 1,
                at: now,
            }
            .name(),
            "group.join_request.rejected"
        );
    }

    #[test]
    fn test_event_accessors() {
        let now = Utc::now();
        let event = GroupEvent::InvitationLinkRevoked {
            group_id: 7,
            revoked_by: 1,
            at: now,
        };

        assert_eq!(event.group_id(), 7);
        assert_eq!(event.timestamp(), now);
    }
}

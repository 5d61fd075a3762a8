//! Route configuration for the group governance endpoints.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post, put};

use super::handlers;
use super::middleware::IdentityProvider;
use crate::groups::{
    GroupAdminFacade, GroupRepository, InvitationLinkRepository, JoinRequestRepository,
    MembershipRepository,
};

/// Application state for the group routes.
pub struct GroupsState<G, M, L, J>
where
    G: GroupRepository,
    M: MembershipRepository,
    L: InvitationLinkRepository,
    J: JoinRequestRepository,
{
    /// The governance boundary every handler calls.
    pub facade: Arc<GroupAdminFacade<G, M, L, J>>,
    /// Resolves bearer tokens to user ids.
    pub identity: Arc<dyn IdentityProvider>,
}

impl<G, M, L, J> GroupsState<G, M, L, J>
where
    G: GroupRepository,
    M: MembershipRepository,
    L: InvitationLinkRepository,
    J: JoinRequestRepository,
{
    pub fn new(
        facade: Arc<GroupAdminFacade<G, M, L, J>>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self { facade, identity }
    }
}

impl<G, M, L, J> Clone for GroupsState<G, M, L, J>
where
    G: GroupRepository,
    M: MembershipRepository,
    L: InvitationLinkRepository,
    J: JoinRequestRepository,
{
    fn clone(&self) -> Self {
        Self {
            facade: Arc::clone(&self.facade),
            identity: Arc::clone(&self.identity),
        }
    }
}

/// Creates all group routes.
///
/// Every route except `GET /groups/{id}` requires a bearer token.
///
/// # Routes
///
/// ## Groups
/// - `GET /groups/{id}` - Group details and roster summary
/// - `PATCH /groups/{id}/settings` - Update capacity, visibility or status
///
/// ## Members
/// - `GET /groups/{id}/members` - List active members
/// - `DELETE /groups/{id}/members/{user_id}` - Remove a member
/// - `PUT /groups/{id}/members/{user_id}/role` - Change a member's role
/// - `POST /groups/{id}/members/bulk-remove` - Remove several members
/// - `POST /groups/{id}/members/bulk-role` - Change several roles
///
/// ## Invitation links
/// - `GET /groups/{id}/invite-link` - Active link, if any
/// - `POST /groups/{id}/invite-link` - Active link, issuing one if needed
/// - `POST /groups/{id}/invite-link/regenerate` - Replace the link
/// - `DELETE /groups/{id}/invite-link` - Revoke the link
/// - `POST /invite-links/{token}/redeem` - Join through a link
///
/// ## Join requests
/// - `POST /groups/{id}/join-requests` - Ask to join
/// - `GET /groups/{id}/join-requests` - Pending requests, oldest first
/// - `POST /groups/{id}/join-requests/approve-all` - Approve until full
/// - `POST /groups/{id}/join-requests/reject-all` - Reject all pending
/// - `POST /join-requests/{id}/approve` - Approve one request
/// - `POST /join-requests/{id}/reject` - Reject one request
pub fn group_routes<G, M, L, J>() -> Router<GroupsState<G, M, L, J>>
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    Router::new()
        // Groups
        .route("/groups/{id}", get(handlers::get_group::<G, M, L, J>))
        .route(
            "/groups/{id}/settings",
            patch(handlers::update_settings::<G, M, L, J>),
        )
        // Members
        .route(
            "/groups/{id}/members",
            get(handlers::list_members::<G, M, L, J>),
        )
        .route(
            "/groups/{id}/members/{user_id}",
            delete(handlers::remove_member::<G, M, L, J>),
        )
        .route(
            "/groups/{id}/members/{user_id}/role",
            put(handlers::change_member_role::<G, M, L, J>),
        )
        .route(
            "/groups/{id}/members/bulk-remove",
            post(handlers::bulk_remove_members::<G, M, L, J>),
        )
        .route(
            "/groups/{id}/members/bulk-role",
            post(handlers::bulk_change_role::<G, M, L, J>),
        )
        // Invitation links
        .route(
            "/groups/{id}/invite-link",
            get(handlers::get_invite_link::<G, M, L, J>)
                .post(handlers::issue_invite_link::<G, M, L, J>)
                .delete(handlers::revoke_invite_link::<G, M, L, J>),
        )
        .route(
            "/groups/{id}/invite-link/regenerate",
            post(handlers::regenerate_invite_link::<G, M, L, J>),
        )
        .route(
            "/invite-links/{token}/redeem",
            post(handlers::redeem_invite_link::<G, M, L, J>),
        )
        // Join requests
        .route(
            "/groups/{id}/join-requests",
            post(handlers::submit_join_request::<G, M, L, J>)
                .get(handlers::list_join_requests::<G, M, L, J>),
        )
        .route(
            "/groups/{id}/join-requests/approve-all",
            post(handlers::approve_all::<G, M, L, J>),
        )
        .route(
            "/groups/{id}/join-requests/reject-all",
            post(handlers::reject_all::<G, M, L, J>),
        )
        .route(
            "/join-requests/{id}/approve",
            post(handlers::approve_join_request::<G, M, L, J>),
        )
        .route(
            "/join-requests/{id}/reject",
            post(handlers::reject_join_request::<G, M, L, J>),
        )
}

/// Builds the group router with its state applied.
pub fn router<G, M, L, J>(state: GroupsState<G, M, L, J>) -> Router
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    group_routes().with_state(state)
}

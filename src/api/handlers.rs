//! HTTP handlers for the group governance endpoints.
//!
//! Each handler resolves the caller, forwards to the facade and renders its
//! envelope; the status code follows the envelope's error kind.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;

use super::error::reply;
use super::middleware::CurrentUser;
use super::routes::GroupsState;
use super::types::{
    BulkRemoveRequest, BulkRoleChangeRequest, ChangeRoleRequest, JoinGroupRequest,
};
use crate::groups::{
    GroupRepository, GroupSettings, InvitationLinkRepository, JoinRequestRepository,
    MembershipRepository,
};

/// Group details and roster summary.
///
/// GET /groups/{id}
pub async fn get_group<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    Path(group_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(state.facade.get_group_info(group_id).await, StatusCode::OK)
}

/// Active members, oldest first.
///
/// GET /groups/{id}/members
pub async fn list_members<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.list_members(group_id, user.id()).await,
        StatusCode::OK,
    )
}

/// PATCH /groups/{id}/settings
pub async fn update_settings<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
    Json(body): Json<GroupSettings>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state
            .facade
            .update_group_settings(group_id, user.id(), body)
            .await,
        StatusCode::OK,
    )
}

/// Remove a member from the group.
///
/// DELETE /groups/{id}/members/{user_id}
pub async fn remove_member<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path((group_id, target_id)): Path<(i64, i64)>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state
            .facade
            .remove_member(group_id, user.id(), target_id)
            .await,
        StatusCode::OK,
    )
}

/// PUT /groups/{id}/members/{user_id}/role
pub async fn change_member_role<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path((group_id, target_id)): Path<(i64, i64)>,
    Json(body): Json<ChangeRoleRequest>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state
            .facade
            .change_member_role(group_id, user.id(), target_id, body.role)
            .await,
        StatusCode::OK,
    )
}

/// POST /groups/{id}/members/bulk-remove
pub async fn bulk_remove_members<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
    Json(body): Json<BulkRemoveRequest>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state
            .facade
            .bulk_remove_members(group_id, user.id(), &body.user_ids)
            .await,
        StatusCode::OK,
    )
}

/// POST /groups/{id}/members/bulk-role
pub async fn bulk_change_role<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
    Json(body): Json<BulkRoleChangeRequest>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    let changes = body.pairs();

    reply(
        state
            .facade
            .bulk_change_role(group_id, user.id(), &changes)
            .await,
        StatusCode::OK,
    )
}

/// Current link, or `null` data when none is active.
///
/// GET /groups/{id}/invite-link
pub async fn get_invite_link<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.active_link(group_id, user.id()).await,
        StatusCode::OK,
    )
}

/// Active link, issuing a fresh one when none is usable.
///
/// POST /groups/{id}/invite-link
pub async fn issue_invite_link<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.issue_or_fetch_link(group_id, user.id()).await,
        StatusCode::OK,
    )
}

/// POST /groups/{id}/invite-link/regenerate
pub async fn regenerate_invite_link<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.regenerate_link(group_id, user.id()).await,
        StatusCode::OK,
    )
}

/// DELETE /groups/{id}/invite-link
pub async fn revoke_invite_link<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.revoke_link(group_id, user.id()).await,
        StatusCode::OK,
    )
}

/// Join a group through an invitation link.
///
/// POST /invite-links/{token}/redeem
pub async fn redeem_invite_link<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(token): Path<String>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.redeem_link(&token, user.id()).await,
        StatusCode::CREATED,
    )
}

/// Ask to join a group. The body is optional.
///
/// POST /groups/{id}/join-requests
pub async fn submit_join_request<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
    body: Option<Json<JoinGroupRequest>>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    let body = body.map(|Json(body)| body).unwrap_or_default();

    reply(
        state
            .facade
            .submit_join_request(group_id, user.id(), body.message)
            .await,
        StatusCode::CREATED,
    )
}

/// GET /groups/{id}/join-requests
pub async fn list_join_requests<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state
            .facade
            .list_pending_requests(group_id, user.id())
            .await,
        StatusCode::OK,
    )
}

/// POST /join-requests/{id}/approve
pub async fn approve_join_request<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.approve_request(request_id, user.id()).await,
        StatusCode::OK,
    )
}

/// POST /join-requests/{id}/reject
pub async fn reject_join_request<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(request_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.reject_request(request_id, user.id()).await,
        StatusCode::OK,
    )
}

/// Approve pending requests oldest first until the group is full.
///
/// POST /groups/{id}/join-requests/approve-all
pub async fn approve_all<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.bulk_approve(group_id, user.id()).await,
        StatusCode::OK,
    )
}

/// POST /groups/{id}/join-requests/reject-all
pub async fn reject_all<G, M, L, J>(
    State(state): State<GroupsState<G, M, L, J>>,
    user: CurrentUser,
    Path(group_id): Path<i64>,
) -> Response
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    reply(
        state.facade.bulk_reject(group_id, user.id()).await,
        StatusCode::OK,
    )
}

use super::{
    ApiResponse, BulkApproval, BulkOutcome, BulkRejection, Group, GroupInfo, GroupRepository,
    GroupSettings, InvitationLinkRepository, InvitationLinkService, JoinRequest,
    JoinRequestRepository, JoinRequestWorkflow, LinkView, Membership, MembershipRepository,
    MembershipStore, Role, RoleGuard, RoleSet,
};
use crate::{GovernanceContext, GroupError};

/// The boundary external callers invoke.
///
/// Composes the governance services and turns every outcome into an
/// [`ApiResponse`]. Business errors keep their kind and message;
/// infrastructure faults are logged and reported as `INTERNAL_ERROR` with a
/// generic message.
///
/// # Example
///
/// ```rust
/// # #[cfg(feature = "mocks")]
/// # async fn demo() {
/// use groupgate::groups::{GroupAdminFacade, MockDatabase};
///
/// let db = MockDatabase::new();
/// let facade = GroupAdminFacade::new(
///     db.groups(),
///     db.memberships(),
///     db.invitation_links(),
///     db.join_requests(),
/// );
///
/// let response = facade.redeem_link("unknowntoken", 42).await;
/// assert!(!response.success);
/// assert_eq!(response.error_kind, Some("INVALID_TOKEN"));
/// # }
/// ```
#[derive(Clone)]
pub struct GroupAdminFacade<G, M, L, J>
where
    G: GroupRepository,
    M: MembershipRepository,
    L: InvitationLinkRepository,
    J: JoinRequestRepository,
{
    group_repo: G,
    guard: RoleGuard<M>,
    store: MembershipStore<G, M>,
    links: InvitationLinkService<G, M, L>,
    requests: JoinRequestWorkflow<G, M, J>,
    ctx: GovernanceContext,
}

impl<G, M, L, J> GroupAdminFacade<G, M, L, J>
where
    G: GroupRepository + Clone,
    M: MembershipRepository + Clone,
    L: InvitationLinkRepository,
    J: JoinRequestRepository,
{
    pub fn new(group_repo: G, membership_repo: M, link_repo: L, request_repo: J) -> Self {
        Self::with_context(
            group_repo,
            membership_repo,
            link_repo,
            request_repo,
            GovernanceContext::default(),
        )
    }

    pub fn with_context(
        group_repo: G,
        membership_repo: M,
        link_repo: L,
        request_repo: J,
        ctx: GovernanceContext,
    ) -> Self {
        Self {
            guard: RoleGuard::new(membership_repo.clone()),
            store: MembershipStore::with_context(
                group_repo.clone(),
                membership_repo.clone(),
                ctx.clone(),
            ),
            links: InvitationLinkService::with_context(
                group_repo.clone(),
                membership_repo.clone(),
                link_repo,
                ctx.clone(),
            ),
            requests: JoinRequestWorkflow::with_context(
                group_repo.clone(),
                membership_repo,
                request_repo,
                ctx.clone(),
            ),
            group_repo,
            ctx,
        }
    }
}

impl<G, M, L, J> GroupAdminFacade<G, M, L, J>
where
    G: GroupRepository,
    M: MembershipRepository,
    L: InvitationLinkRepository,
    J: JoinRequestRepository,
{
    pub fn context(&self) -> &GovernanceContext {
        &self.ctx
    }

    /// Group details and a roster summary. Open to anyone.
    pub async fn get_group_info(&self, group_id: i64) -> ApiResponse<GroupInfo> {
        let result: Result<GroupInfo, GroupError> = async {
            let group = self.find_group(group_id).await?;
            let members = self.store.list_members(group_id).await?;
            let member_count = count(members.len());
            let admin_count = count(members.iter().filter(|m| m.role == Role::Admin).count());

            Ok(GroupInfo {
                open_slots: group.open_slots(member_count),
                group,
                member_count,
                admin_count,
            })
        }
        .await;

        self.respond("get_group_info", result, |_| "Group loaded".to_owned())
    }

    /// Active members, oldest first. Open to any member of the group.
    pub async fn list_members(&self, group_id: i64, user_id: i64) -> ApiResponse<Vec<Membership>> {
        let result = async {
            self.guard
                .authorize(group_id, user_id, RoleSet::ANY_MEMBER)
                .await?;
            self.store.list_members(group_id).await
        }
        .await;

        self.respond("list_members", result, |members| {
            format!("{} members", members.len())
        })
    }

    /// The group's active link, issuing one when none is active.
    pub async fn issue_or_fetch_link(&self, group_id: i64, user_id: i64) -> ApiResponse<LinkView> {
        let result = self
            .links
            .issue_or_fetch(group_id, user_id)
            .await
            .map(|link| LinkView::new(&link, self.links.url_for(&link)));

        self.respond("issue_or_fetch_link", result, |view| {
            format!("Invitation link valid until {}", view.expires_at)
        })
    }

    /// The group's active link, without issuing one.
    pub async fn active_link(&self, group_id: i64, user_id: i64) -> ApiResponse<Option<LinkView>> {
        let result = self
            .links
            .active_link(group_id, user_id)
            .await
            .map(|link| link.map(|link| LinkView::new(&link, self.links.url_for(&link))));

        self.respond("active_link", result, |view| match view {
            Some(_) => "Invitation link is active".to_owned(),
            None => "No active invitation link".to_owned(),
        })
    }

    /// Issues a new link; the previous one stops working immediately.
    pub async fn regenerate_link(&self, group_id: i64, user_id: i64) -> ApiResponse<LinkView> {
        let result = self
            .links
            .regenerate(group_id, user_id)
            .await
            .map(|link| LinkView::new(&link, self.links.url_for(&link)));

        self.respond("regenerate_link", result, |_| {
            "New invitation link issued, the previous link no longer works".to_owned()
        })
    }

    pub async fn revoke_link(&self, group_id: i64, user_id: i64) -> ApiResponse<u64> {
        let result = self.links.revoke(group_id, user_id).await;

        self.respond("revoke_link", result, |revoked| match revoked {
            0 => "No active invitation link to revoke".to_owned(),
            _ => "Invitation link revoked".to_owned(),
        })
    }

    /// Joins the group behind `token`. The token is the credential.
    pub async fn redeem_link(&self, token: &str, user_id: i64) -> ApiResponse<Membership> {
        let result = self.links.redeem(token, user_id).await;

        self.respond("redeem_link", result, |_| {
            "You have joined the group".to_owned()
        })
    }

    pub async fn submit_join_request(
        &self,
        group_id: i64,
        user_id: i64,
        message: Option<String>,
    ) -> ApiResponse<JoinRequest> {
        let result = self.requests.submit(group_id, user_id, message).await;

        self.respond("submit_join_request", result, |_| {
            "Your request to join was sent".to_owned()
        })
    }

    pub async fn list_pending_requests(
        &self,
        group_id: i64,
        admin_id: i64,
    ) -> ApiResponse<Vec<JoinRequest>> {
        let result = self.requests.list_pending(group_id, admin_id).await;

        self.respond("list_pending_requests", result, |pending| {
            format!("{} pending requests", pending.len())
        })
    }

    pub async fn approve_request(&self, request_id: i64, admin_id: i64) -> ApiResponse<Membership> {
        let result = self.requests.approve(request_id, admin_id).await;

        self.respond("approve_request", result, |_| "Request approved".to_owned())
    }

    pub async fn reject_request(&self, request_id: i64, admin_id: i64) -> ApiResponse<JoinRequest> {
        let result = self.requests.reject(request_id, admin_id).await;

        self.respond("reject_request", result, |_| "Request rejected".to_owned())
    }

    /// Approves pending requests oldest first until the group is full.
    ///
    /// Succeeds as a whole once authorized; per-request failures are listed
    /// in `failed`.
    pub async fn bulk_approve(&self, group_id: i64, admin_id: i64) -> ApiResponse<BulkApproval> {
        let result = self.requests.bulk_approve(group_id, admin_id).await;

        self.respond("bulk_approve", result, |outcome| {
            format!(
                "Approved {} requests, {} could not be approved",
                outcome.approved.len(),
                outcome.failed.len()
            )
        })
    }

    pub async fn bulk_reject(&self, group_id: i64, admin_id: i64) -> ApiResponse<BulkRejection> {
        let result = self.requests.bulk_reject(group_id, admin_id).await;

        self.respond("bulk_reject", result, |outcome| {
            format!("Rejected {} requests", outcome.rejected)
        })
    }

    pub async fn remove_member(
        &self,
        group_id: i64,
        admin_id: i64,
        target_id: i64,
    ) -> ApiResponse<Membership> {
        let result = async {
            self.authorize_governor(group_id, admin_id).await?;
            self.store.remove(group_id, target_id, admin_id).await
        }
        .await;

        self.respond("remove_member", result, |_| "Member removed".to_owned())
    }

    pub async fn change_member_role(
        &self,
        group_id: i64,
        admin_id: i64,
        target_id: i64,
        role: Role,
    ) -> ApiResponse<Membership> {
        let result = async {
            self.authorize_governor(group_id, admin_id).await?;
            self.store
                .change_role(group_id, target_id, role, admin_id)
                .await
        }
        .await;

        self.respond("change_member_role", result, |membership| {
            format!("Role changed to {}", membership.role)
        })
    }

    /// Removes each listed member; one failure does not stop the rest.
    pub async fn bulk_remove_members(
        &self,
        group_id: i64,
        admin_id: i64,
        user_ids: &[i64],
    ) -> ApiResponse<BulkOutcome<Membership>> {
        let result: Result<_, GroupError> = async {
            self.authorize_governor(group_id, admin_id).await?;
            Ok(self.store.bulk_remove(group_id, user_ids, admin_id).await)
        }
        .await;

        self.respond("bulk_remove_members", result, |outcome| {
            format!(
                "Removed {} members, {} could not be removed",
                outcome.succeeded.len(),
                outcome.failed.len()
            )
        })
    }

    /// Applies each role change; one failure does not stop the rest.
    pub async fn bulk_change_role(
        &self,
        group_id: i64,
        admin_id: i64,
        changes: &[(i64, Role)],
    ) -> ApiResponse<BulkOutcome<Membership>> {
        let result: Result<_, GroupError> = async {
            self.authorize_governor(group_id, admin_id).await?;
            Ok(self
                .store
                .bulk_change_role(group_id, changes, admin_id)
                .await)
        }
        .await;

        self.respond("bulk_change_role", result, |outcome| {
            format!(
                "Updated {} members, {} could not be updated",
                outcome.succeeded.len(),
                outcome.failed.len()
            )
        })
    }

    /// Changes capacity, visibility or status.
    ///
    /// Lowering `max_members` below the current count is allowed; it only
    /// blocks further admissions.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "update_group_settings", skip(self))
    )]
    pub async fn update_group_settings(
        &self,
        group_id: i64,
        admin_id: i64,
        settings: GroupSettings,
    ) -> ApiResponse<Group> {
        let result = async {
            if settings.is_empty() {
                return Err(GroupError::Validation("no settings to update".to_owned()));
            }
            self.authorize_governor(group_id, admin_id).await?;

            let group = self
                .group_repo
                .update_settings(group_id, &settings, self.ctx.clock.now())
                .await?;

            log::info!(
                target: "groupgate",
                "msg=\"group settings updated\", group_id={group_id}, max_members={}, visibility={}, status={}, updated_by={admin_id}",
                group.max_members,
                group.visibility.as_str(),
                group.status.as_str()
            );

            Ok(group)
        }
        .await;

        self.respond("update_group_settings", result, |_| {
            "Group settings updated".to_owned()
        })
    }

    async fn authorize_governor(&self, group_id: i64, user_id: i64) -> Result<(), GroupError> {
        self.guard
            .authorize(group_id, user_id, RoleSet::GOVERNORS)
            .await
            .map(|_| ())
    }

    async fn find_group(&self, group_id: i64) -> Result<Group, GroupError> {
        self.group_repo
            .find_by_id(group_id)
            .await?
            .ok_or(GroupError::GroupNotFound)
    }

    fn respond<T>(
        &self,
        operation: &'static str,
        result: Result<T, GroupError>,
        message: impl FnOnce(&T) -> String,
    ) -> ApiResponse<T> {
        match result {
            Ok(data) => {
                let message = message(&data);
                ApiResponse::ok(data, message)
            }
            Err(e) => {
                if e.is_internal() {
                    log::error!(
                        target: "groupgate",
                        "msg=\"operation failed\", operation={operation}, error=\"{e}\""
                    );
                } else {
                    log::debug!(
                        target: "groupgate",
                        "msg=\"operation refused\", operation={operation}, error_kind={}",
                        e.kind()
                    );
                }
                ApiResponse::failure(e)
            }
        }
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::groups::{
        CreateGroup, GroupVisibility, MockDatabase, MockGroupRepository,
        MockInvitationLinkRepository, MockJoinRequestRepository, MockMembershipRepository,
        INTERNAL_ERROR_MESSAGE,
    };
    use crate::GovernanceConfig;

    type Facade = GroupAdminFacade<
        MockGroupRepository,
        MockMembershipRepository,
        MockInvitationLinkRepository,
        MockJoinRequestRepository,
    >;

    async fn setup(max_members: u32) -> (Facade, MockDatabase, i64) {
        let db = MockDatabase::new();
        let group = db
            .groups()
            .create(
                CreateGroup {
                    name: "Statistics".to_owned(),
                    owner_id: 1,
                    max_members,
                    visibility: GroupVisibility::Public,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let ctx = GovernanceContext::new().with_config(
            GovernanceConfig::default().with_invite_base_url("https://study.example.com/join/"),
        )
        .unwrap();
        let facade = GroupAdminFacade::with_context(
            db.groups(),
            db.memberships(),
            db.invitation_links(),
            db.join_requests(),
            ctx,
        );

        (facade, db, group.id)
    }

    #[tokio::test]
    async fn test_group_info_summary() {
        let (facade, _, group_id) = setup(4).await;
        let link = facade.issue_or_fetch_link(group_id, 1).await.data.unwrap();
        facade.redeem_link(&link.token, 2).await;
        facade.change_member_role(group_id, 1, 2, Role::Admin).await;

        let info = facade.get_group_info(group_id).await;
        assert!(info.success);
        let info = info.data.unwrap();
        assert_eq!(info.member_count, 2);
        assert_eq!(info.admin_count, 1);
        assert_eq!(info.open_slots, Some(2));

        let missing = facade.get_group_info(404).await;
        assert_eq!(missing.error_kind, Some("GROUP_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_link_view_renders_url() {
        let (facade, _, group_id) = setup(0).await;

        let view = facade.issue_or_fetch_link(group_id, 1).await.data.unwrap();
        assert_eq!(
            view.url,
            format!("https://study.example.com/join/{}", view.token)
        );

        let active = facade.active_link(group_id, 1).await.data.unwrap();
        assert_eq!(active.map(|v| v.token), Some(view.token));
    }

    #[tokio::test]
    async fn test_typed_errors_in_envelope() {
        let (facade, _, group_id) = setup(0).await;

        let response = facade.remove_member(group_id, 1, 1).await;
        assert!(!response.success);
        assert_eq!(response.error_kind, Some("CANNOT_REMOVE_OWNER"));
        assert_eq!(response.message, "The group owner cannot be removed");

        let response = facade.approve_request(1, 99).await;
        assert_eq!(response.error_kind, Some("REQUEST_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_member_cannot_govern() {
        let (facade, _, group_id) = setup(0).await;
        let link = facade.issue_or_fetch_link(group_id, 1).await.data.unwrap();
        facade.redeem_link(&link.token, 2).await;
        facade.redeem_link(&link.token, 3).await;

        let response = facade.remove_member(group_id, 2, 3).await;
        assert_eq!(response.error_kind, Some("INSUFFICIENT_ROLE"));

        let response = facade.regenerate_link(group_id, 2).await;
        assert_eq!(response.error_kind, Some("INSUFFICIENT_ROLE"));

        let members = facade.list_members(group_id, 2).await;
        assert_eq!(members.data.unwrap().len(), 3);

        let outsider = facade.list_members(group_id, 50).await;
        assert_eq!(outsider.error_kind, Some("NOT_MEMBER"));
    }

    #[tokio::test]
    async fn test_update_settings() {
        let (facade, _, group_id) = setup(10).await;

        let response = facade
            .update_group_settings(group_id, 1, GroupSettings::default())
            .await;
        assert_eq!(response.error_kind, Some("VALIDATION_ERROR"));

        let response = facade
            .update_group_settings(
                group_id,
                1,
                GroupSettings {
                    max_members: Some(1),
                    ..GroupSettings::default()
                },
            )
            .await;
        assert_eq!(response.data.unwrap().max_members, 1);

        let request = facade
            .submit_join_request(group_id, 5, None)
            .await
            .data
            .unwrap();
        let response = facade.approve_request(request.id, 1).await;
        assert_eq!(response.error_kind, Some("CAPACITY_EXCEEDED"));
    }

    #[tokio::test]
    async fn test_database_outage_is_generic() {
        let (facade, db, group_id) = setup(0).await;
        db.set_unavailable(true);

        let response = facade.bulk_approve(group_id, 1).await;
        assert!(!response.success);
        assert_eq!(response.error_kind, Some("INTERNAL_ERROR"));
        assert_eq!(response.message, INTERNAL_ERROR_MESSAGE);
        assert!(response.error.is_some_and(|e| e.is_internal()));
    }
}

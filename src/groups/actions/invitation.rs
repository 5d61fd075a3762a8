use chrono::{DateTime, Utc};

use super::{MembershipStore, RoleGuard};
use crate::crypto::{generate_token, is_well_formed_token};
use crate::groups::{
    AdmissionSource, CreateInvitationLink, GroupRepository, InvitationLink,
    InvitationLinkRepository, Membership, MembershipRepository, Role, RoleSet,
};
use crate::{GovernanceContext, GroupError, GroupEvent};

/// Issues, revokes and redeems shareable invitation links.
///
/// A group has at most one active link. Issuing a new one revokes the old
/// one in the same transaction, so the previous token fails with
/// `TokenRevoked` from then on. A link admits any number of users until it
/// expires or is replaced.
///
/// # Example
///
/// ```rust,ignore
/// let service = InvitationLinkService::new(groups, memberships, links);
///
/// // owner or admin
/// let link = service.issue(group_id, owner_id).await?;
///
/// // anyone holding the token
/// let membership = service.redeem(&link.token, student_id).await?;
/// ```
#[derive(Clone)]
pub struct InvitationLinkService<G, M, L>
where
    G: GroupRepository,
    M: MembershipRepository,
    L: InvitationLinkRepository,
{
    link_repo: L,
    guard: RoleGuard<M>,
    store: MembershipStore<G, M>,
    ctx: GovernanceContext,
}

impl<G, M, L> InvitationLinkService<G, M, L>
where
    G: GroupRepository + Clone,
    M: MembershipRepository + Clone,
    L: InvitationLinkRepository,
{
    pub fn new(group_repo: G, membership_repo: M, link_repo: L) -> Self {
        Self::with_context(
            group_repo,
            membership_repo,
            link_repo,
            GovernanceContext::default(),
        )
    }

    pub fn with_context(
        group_repo: G,
        membership_repo: M,
        link_repo: L,
        ctx: GovernanceContext,
    ) -> Self {
        Self {
            link_repo,
            guard: RoleGuard::new(membership_repo.clone()),
            store: MembershipStore::with_context(group_repo, membership_repo, ctx.clone()),
            ctx,
        }
    }
}

impl<G, M, L> InvitationLinkService<G, M, L>
where
    G: GroupRepository,
    M: MembershipRepository,
    L: InvitationLinkRepository,
{
    /// Issues a fresh link for the group, revoking any previous one.
    ///
    /// Requires the requester to be an owner or admin.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "issue_invitation_link", skip(self), err)
    )]
    pub async fn issue(
        &self,
        group_id: i64,
        requester_id: i64,
    ) -> Result<InvitationLink, GroupError> {
        self.guard
            .authorize(group_id, requester_id, RoleSet::GOVERNORS)
            .await?;
        self.issue_authorized(group_id, requester_id).await
    }

    /// Issuance is re-issuance: the previous token stops working at once.
    pub async fn regenerate(
        &self,
        group_id: i64,
        requester_id: i64,
    ) -> Result<InvitationLink, GroupError> {
        self.issue(group_id, requester_id).await
    }

    /// Returns the group's active link, issuing one if there is none.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "issue_or_fetch_invitation_link", skip(self), err)
    )]
    pub async fn issue_or_fetch(
        &self,
        group_id: i64,
        requester_id: i64,
    ) -> Result<InvitationLink, GroupError> {
        self.guard
            .authorize(group_id, requester_id, RoleSet::GOVERNORS)
            .await?;

        let now = self.ctx.clock.now();
        if let Some(link) = self.link_repo.find_active(group_id, now).await? {
            return Ok(link);
        }

        self.issue_authorized(group_id, requester_id).await
    }

    /// The group's active link, if any. Requires owner or admin.
    pub async fn active_link(
        &self,
        group_id: i64,
        requester_id: i64,
    ) -> Result<Option<InvitationLink>, GroupError> {
        self.guard
            .authorize(group_id, requester_id, RoleSet::GOVERNORS)
            .await?;

        self.link_repo
            .find_active(group_id, self.ctx.clock.now())
            .await
    }

    /// Revokes the group's link without issuing a new one.
    ///
    /// Returns how many links were revoked (zero when none was active).
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "revoke_invitation_link", skip(self), err)
    )]
    pub async fn revoke(&self, group_id: i64, requester_id: i64) -> Result<u64, GroupError> {
        self.guard
            .authorize(group_id, requester_id, RoleSet::GOVERNORS)
            .await?;

        let revoked = self.link_repo.revoke_all(group_id).await?;
        if revoked > 0 {
            log::info!(
                target: "groupgate",
                "msg=\"invitation link revoked\", group_id={group_id}, revoked_by={requester_id}"
            );

            self.ctx
                .events
                .dispatch(GroupEvent::InvitationLinkRevoked {
                    group_id,
                    revoked_by: requester_id,
                    at: self.ctx.clock.now(),
                })
                .await;
        }

        Ok(revoked)
    }

    /// Admits `user_id` into the link's group.
    ///
    /// Expiry is checked before revocation, so an expired link reports
    /// `TokenExpired` even if it was also revoked.
    ///
    /// # Returns
    ///
    /// - `Ok(membership)` - The user joined the group
    /// - `Err(GroupError::InvalidToken)` - No link carries this token
    /// - `Err(GroupError::TokenExpired)` - The link is past its expiry
    /// - `Err(GroupError::TokenRevoked)` - The link was revoked or replaced
    /// - `Err(GroupError::AlreadyMember)` - The user is already active
    /// - `Err(GroupError::CapacityExceeded)` - The group is full
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "redeem_invitation_link", skip(self, token), err)
    )]
    pub async fn redeem(&self, token: &str, user_id: i64) -> Result<Membership, GroupError> {
        if !is_well_formed_token(token) {
            return Err(GroupError::InvalidToken);
        }

        let link = self
            .link_repo
            .find_by_token(token)
            .await?
            .ok_or(GroupError::InvalidToken)?;

        check_redeemable(&link, self.ctx.clock.now())?;

        self.store
            .admit_with(
                AdmissionSource::InvitationLink { link_id: link.id },
                link.group_id,
                user_id,
                Role::Member,
            )
            .await
    }

    /// Renders the shareable URL for a link.
    pub fn url_for(&self, link: &InvitationLink) -> String {
        self.ctx.config().invite_url(&link.token)
    }

    async fn issue_authorized(
        &self,
        group_id: i64,
        requester_id: i64,
    ) -> Result<InvitationLink, GroupError> {
        let now = self.ctx.clock.now();
        let link = self
            .link_repo
            .replace_active(CreateInvitationLink {
                group_id,
                token: generate_token(self.ctx.config().token_length),
                created_by: requester_id,
                created_at: now,
                expires_at: now + self.ctx.config().invitation_ttl,
            })
            .await?;

        log::info!(
            target: "groupgate",
            "msg=\"invitation link issued\", group_id={group_id}, link_id={}, issued_by={requester_id}, expires_at={}",
            link.id,
            link.expires_at
        );

        self.ctx
            .events
            .dispatch(GroupEvent::InvitationLinkIssued {
                group_id,
                link_id: link.id,
                issued_by: requester_id,
                expires_at: link.expires_at,
                at: now,
            })
            .await;

        Ok(link)
    }
}

fn check_redeemable(link: &InvitationLink, now: DateTime<Utc>) -> Result<(), GroupError> {
    if link.is_expired_at(now) {
        return Err(GroupError::TokenExpired);
    }
    if link.revoked {
        return Err(GroupError::TokenRevoked);
    }
    Ok(())
}

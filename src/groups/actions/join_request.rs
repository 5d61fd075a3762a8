use chrono::{DateTime, Utc};

use super::{MembershipStore, RoleGuard};
use crate::groups::{
    AdmissionSource, ApprovedRequest, BulkApproval, BulkFailure, BulkRejection, CreateJoinRequest,
    GroupRepository, JoinRequest, JoinRequestRepository, JoinRequestStatus, Membership,
    MembershipRepository, Role, RoleSet,
};
use crate::{GovernanceContext, GroupError, GroupEvent};

/// The join request state machine.
///
/// A request starts `pending` and moves exactly once, to `approved` or
/// `rejected`. Approval and admission commit together: when admission
/// fails the request stays pending and no membership is written.
#[derive(Clone)]
pub struct JoinRequestWorkflow<G, M, J>
where
    G: GroupRepository,
    M: MembershipRepository,
    J: JoinRequestRepository,
{
    group_repo: G,
    request_repo: J,
    guard: RoleGuard<M>,
    store: MembershipStore<G, M>,
    ctx: GovernanceContext,
}

impl<G, M, J> JoinRequestWorkflow<G, M, J>
where
    G: GroupRepository + Clone,
    M: MembershipRepository + Clone,
    J: JoinRequestRepository,
{
    pub fn new(group_repo: G, membership_repo: M, request_repo: J) -> Self {
        Self::with_context(
            group_repo,
            membership_repo,
            request_repo,
            GovernanceContext::default(),
        )
    }

    pub fn with_context(
        group_repo: G,
        membership_repo: M,
        request_repo: J,
        ctx: GovernanceContext,
    ) -> Self {
        Self {
            group_repo: group_repo.clone(),
            request_repo,
            guard: RoleGuard::new(membership_repo.clone()),
            store: MembershipStore::with_context(group_repo, membership_repo, ctx.clone()),
            ctx,
        }
    }
}

impl<G, M, J> JoinRequestWorkflow<G, M, J>
where
    G: GroupRepository,
    M: MembershipRepository,
    J: JoinRequestRepository,
{
    /// Records a pending request for `user_id` to join the group.
    ///
    /// A blank message is stored as no message.
    ///
    /// # Returns
    ///
    /// - `Ok(request)` - The new pending request
    /// - `Err(GroupError::Validation)` - Message is too long
    /// - `Err(GroupError::GroupNotFound)` - No such group
    /// - `Err(GroupError::AlreadyMember)` - The user is already active
    /// - `Err(GroupError::DuplicatePending)` - A request is already pending
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "submit_join_request", skip(self, message), err)
    )]
    pub async fn submit(
        &self,
        group_id: i64,
        user_id: i64,
        message: Option<String>,
    ) -> Result<JoinRequest, GroupError> {
        let message = self.normalize_message(message)?;

        self.group_repo
            .find_by_id(group_id)
            .await?
            .ok_or(GroupError::GroupNotFound)?;

        let request = self
            .request_repo
            .create_pending(CreateJoinRequest {
                group_id,
                user_id,
                message,
                requested_at: self.ctx.clock.now(),
            })
            .await?;

        log::info!(
            target: "groupgate",
            "msg=\"join request submitted\", group_id={group_id}, user_id={user_id}, request_id={}",
            request.id
        );

        self.ctx
            .events
            .dispatch(GroupEvent::JoinRequestSubmitted {
                group_id,
                request_id: request.id,
                user_id,
                at: request.requested_at,
            })
            .await;

        Ok(request)
    }

    /// Approves a pending request and admits its user.
    ///
    /// # Returns
    ///
    /// - `Ok(membership)` - The request is approved and the user admitted
    /// - `Err(GroupError::RequestNotFound)` - No such request
    /// - `Err(GroupError::NotMember | InsufficientRole)` - Caller may not approve
    /// - `Err(GroupError::RequestNotPending)` - Already approved or rejected
    /// - `Err(GroupError::CapacityExceeded)` - The group is full; the request stays pending
    /// - `Err(GroupError::AlreadyMember)` - The user joined some other way; the request stays pending
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "approve_join_request", skip(self), err)
    )]
    pub async fn approve(
        &self,
        request_id: i64,
        admin_id: i64,
    ) -> Result<Membership, GroupError> {
        let request = self.find_request(request_id).await?;
        self.guard
            .authorize(request.group_id, admin_id, RoleSet::GOVERNORS)
            .await?;

        self.approve_authorized(&request, admin_id).await
    }

    /// Rejects a pending request.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "reject_join_request", skip(self), err)
    )]
    pub async fn reject(&self, request_id: i64, admin_id: i64) -> Result<JoinRequest, GroupError> {
        let request = self.find_request(request_id).await?;
        self.guard
            .authorize(request.group_id, admin_id, RoleSet::GOVERNORS)
            .await?;

        self.reject_authorized(&request, admin_id).await
    }

    /// Pending requests of the group, oldest first. Requires owner or admin.
    pub async fn list_pending(
        &self,
        group_id: i64,
        admin_id: i64,
    ) -> Result<Vec<JoinRequest>, GroupError> {
        self.guard
            .authorize(group_id, admin_id, RoleSet::GOVERNORS)
            .await?;

        self.request_repo.list_pending(group_id).await
    }

    /// Approves every pending request of the group, oldest first.
    ///
    /// Requests are processed one at a time so each admission sees the
    /// previous ones. Once the group is full, every remaining request is
    /// reported as `CapacityExceeded` and left pending.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "bulk_approve_join_requests", skip(self), err)
    )]
    pub async fn bulk_approve(
        &self,
        group_id: i64,
        admin_id: i64,
    ) -> Result<BulkApproval, GroupError> {
        self.guard
            .authorize(group_id, admin_id, RoleSet::GOVERNORS)
            .await?;

        let pending = self.request_repo.list_pending(group_id).await?;
        let mut outcome = BulkApproval::default();
        let mut full = false;

        for request in pending {
            if full {
                outcome
                    .failed
                    .push(BulkFailure::new(request.id, GroupError::CapacityExceeded));
                continue;
            }

            match self.approve_authorized(&request, admin_id).await {
                Ok(membership) => outcome.approved.push(ApprovedRequest {
                    request: approved_copy(request, admin_id, membership.joined_at),
                    membership,
                }),
                Err(e) => {
                    full = e == GroupError::CapacityExceeded;
                    outcome.failed.push(BulkFailure::new(request.id, e));
                }
            }
        }

        log::info!(
            target: "groupgate",
            "msg=\"bulk approve finished\", group_id={group_id}, approved={}, failed={}, processed_by={admin_id}",
            outcome.approved.len(),
            outcome.failed.len()
        );

        Ok(outcome)
    }

    /// Rejects every pending request of the group.
    ///
    /// Requests processed concurrently by someone else are skipped.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "bulk_reject_join_requests", skip(self), err)
    )]
    pub async fn bulk_reject(
        &self,
        group_id: i64,
        admin_id: i64,
    ) -> Result<BulkRejection, GroupError> {
        self.guard
            .authorize(group_id, admin_id, RoleSet::GOVERNORS)
            .await?;

        let pending = self.request_repo.list_pending(group_id).await?;
        let mut outcome = BulkRejection::default();

        for request in pending {
            match self.reject_authorized(&request, admin_id).await {
                Ok(_) => outcome.rejected += 1,
                Err(GroupError::RequestNotPending) => {}
                Err(e) => return Err(e),
            }
        }

        log::info!(
            target: "groupgate",
            "msg=\"bulk reject finished\", group_id={group_id}, rejected={}, processed_by={admin_id}",
            outcome.rejected
        );

        Ok(outcome)
    }

    async fn approve_authorized(
        &self,
        request: &JoinRequest,
        admin_id: i64,
    ) -> Result<Membership, GroupError> {
        if !request.is_pending() {
            return Err(GroupError::RequestNotPending);
        }

        let membership = self
            .store
            .admit_with(
                AdmissionSource::JoinRequest {
                    request_id: request.id,
                    processed_by: admin_id,
                },
                request.group_id,
                request.user_id,
                Role::Member,
            )
            .await?;

        log::info!(
            target: "groupgate",
            "msg=\"join request approved\", group_id={}, request_id={}, user_id={}, processed_by={admin_id}",
            request.group_id,
            request.id,
            request.user_id
        );

        self.ctx
            .events
            .dispatch(GroupEvent::JoinRequestApproved {
                group_id: request.group_id,
                request_id: request.id,
                user_id: request.user_id,
                processed_by: admin_id,
                at: membership.joined_at,
            })
            .await;

        Ok(membership)
    }

    async fn reject_authorized(
        &self,
        request: &JoinRequest,
        admin_id: i64,
    ) -> Result<JoinRequest, GroupError> {
        if !request.is_pending() {
            return Err(GroupError::RequestNotPending);
        }

        let rejected = self
            .request_repo
            .reject(request.id, admin_id, self.ctx.clock.now())
            .await?;

        log::info!(
            target: "groupgate",
            "msg=\"join request rejected\", group_id={}, request_id={}, user_id={}, processed_by={admin_id}",
            rejected.group_id,
            rejected.id,
            rejected.user_id
        );

        self.ctx
            .events
            .dispatch(GroupEvent::JoinRequestRejected {
                group_id: rejected.group_id,
                request_id: rejected.id,
                user_id: rejected.user_id,
                processed_by: admin_id,
                at: rejected.processed_at.unwrap_or_else(|| self.ctx.clock.now()),
            })
            .await;

        Ok(rejected)
    }

    async fn find_request(&self, request_id: i64) -> Result<JoinRequest, GroupError> {
        self.request_repo
            .find_by_id(request_id)
            .await?
            .ok_or(GroupError::RequestNotFound)
    }

    fn normalize_message(&self, message: Option<String>) -> Result<Option<String>, GroupError> {
        let Some(message) = message else {
            return Ok(None);
        };

        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let max = self.ctx.config().max_request_message_len;
        if trimmed.chars().count() > max {
            return Err(GroupError::Validation(format!(
                "message must be at most {max} characters"
            )));
        }

        Ok(Some(trimmed.to_owned()))
    }
}

fn approved_copy(mut request: JoinRequest, processed_by: i64, at: DateTime<Utc>) -> JoinRequest {
    request.status = JoinRequestStatus::Approved;
    request.processed_by = Some(processed_by);
    request.processed_at = Some(at);
    request
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::groups::{
        CreateGroup, GroupVisibility, MockDatabase, MockGroupRepository,
        MockJoinRequestRepository, MockMembershipRepository,
    };
    use crate::ManualClock;

    type Workflow = JoinRequestWorkflow<
        MockGroupRepository,
        MockMembershipRepository,
        MockJoinRequestRepository,
    >;

    async fn setup(max_members: u32) -> (Workflow, Arc<ManualClock>, MockDatabase, i64) {
        let db = MockDatabase::new();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let group = db
            .groups()
            .create(
                CreateGroup {
                    name: "Databases".to_owned(),
                    owner_id: 1,
                    max_members,
                    visibility: GroupVisibility::Private,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let workflow = JoinRequestWorkflow::with_context(
            db.groups(),
            db.memberships(),
            db.join_requests(),
            GovernanceContext::new().with_clock(clock.clone()),
        );

        (workflow, clock, db, group.id)
    }

    #[tokio::test]
    async fn test_submit_and_duplicate() {
        let (workflow, _, _, group_id) = setup(0).await;

        let request = workflow
            .submit(group_id, 5, Some("  I'm in the Tuesday lab  ".to_owned()))
            .await
            .unwrap();
        assert_eq!(request.status, JoinRequestStatus::Pending);
        assert_eq!(request.message.as_deref(), Some("I'm in the Tuesday lab"));

        let err = workflow.submit(group_id, 5, None).await.unwrap_err();
        assert_eq!(err, GroupError::DuplicatePending);
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let (workflow, _, _, group_id) = setup(0).await;

        let err = workflow
            .submit(group_id, 5, Some("x".repeat(501)))
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::Validation(_)));

        let request = workflow
            .submit(group_id, 5, Some("é".repeat(500)))
            .await
            .unwrap();
        assert_eq!(request.message.map(|m| m.chars().count()), Some(500));

        let blank = workflow
            .submit(group_id, 6, Some("   ".to_owned()))
            .await
            .unwrap();
        assert!(blank.message.is_none());

        let err = workflow.submit(999, 7, None).await.unwrap_err();
        assert_eq!(err, GroupError::GroupNotFound);
    }

    #[tokio::test]
    async fn test_member_cannot_submit() {
        let (workflow, _, _, group_id) = setup(0).await;

        let err = workflow.submit(group_id, 1, None).await.unwrap_err();
        assert_eq!(err, GroupError::AlreadyMember);
    }

    #[tokio::test]
    async fn test_approve_admits_and_is_terminal() {
        let (workflow, _, db, group_id) = setup(0).await;
        let request = workflow.submit(group_id, 5, None).await.unwrap();

        let membership = workflow.approve(request.id, 1).await.unwrap();
        assert_eq!(membership.user_id, 5);
        assert_eq!(membership.role, Role::Member);

        let stored = db
            .join_requests()
            .find_by_id(request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, JoinRequestStatus::Approved);
        assert_eq!(stored.processed_by, Some(1));

        let err = workflow.approve(request.id, 1).await.unwrap_err();
        assert_eq!(err, GroupError::RequestNotPending);
        let err = workflow.reject(request.id, 1).await.unwrap_err();
        assert_eq!(err, GroupError::RequestNotPending);
    }

    #[tokio::test]
    async fn test_approve_at_capacity_leaves_request_pending() {
        let (workflow, _, db, group_id) = setup(1).await;
        let request = workflow.submit(group_id, 5, None).await.unwrap();

        let err = workflow.approve(request.id, 1).await.unwrap_err();
        assert_eq!(err, GroupError::CapacityExceeded);

        let stored = db
            .join_requests()
            .find_by_id(request.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_pending());
        assert!(db
            .memberships()
            .find_active(group_id, 5)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_non_member_cannot_approve() {
        let (workflow, _, db, group_id) = setup(0).await;
        let request = workflow.submit(group_id, 5, None).await.unwrap();

        let err = workflow.approve(request.id, 77).await.unwrap_err();
        assert_eq!(err, GroupError::NotMember);

        let stored = db
            .join_requests()
            .find_by_id(request.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_pending());
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let (workflow, _, _, _) = setup(0).await;

        let err = workflow.approve(404, 1).await.unwrap_err();
        assert_eq!(err, GroupError::RequestNotFound);
    }

    #[tokio::test]
    async fn test_reject_records_processor() {
        let (workflow, _, _, group_id) = setup(0).await;
        let request = workflow.submit(group_id, 5, None).await.unwrap();

        let rejected = workflow.reject(request.id, 1).await.unwrap();
        assert_eq!(rejected.status, JoinRequestStatus::Rejected);
        assert_eq!(rejected.processed_by, Some(1));
        assert!(rejected.processed_at.is_some());

        // a rejected user may ask again
        workflow.submit(group_id, 5, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_bulk_approve_oldest_first() {
        let (workflow, clock, _, group_id) = setup(3).await;
        workflow.store.admit(group_id, 2, Role::Member).await.unwrap();

        let mut ids = Vec::new();
        for user_id in [10, 11, 12, 13, 14] {
            clock.advance(Duration::minutes(1));
            ids.push(workflow.submit(group_id, user_id, None).await.unwrap().id);
        }

        let outcome = workflow.bulk_approve(group_id, 1).await.unwrap();

        let approved: Vec<_> = outcome.approved.iter().map(|a| a.request.id).collect();
        assert_eq!(approved, vec![ids[0]]);
        let failed: Vec<_> = outcome.failed.iter().map(|f| f.id).collect();
        assert_eq!(failed, ids[1..].to_vec());
        assert!(outcome
            .failed
            .iter()
            .all(|f| f.error == GroupError::CapacityExceeded));

        let pending = workflow.list_pending(group_id, 1).await.unwrap();
        assert_eq!(pending.len(), 4);
    }

    #[tokio::test]
    async fn test_bulk_approve_orders_by_request_time_not_id() {
        let (workflow, clock, _, group_id) = setup(2).await;
        let t0 = Utc::now() + Duration::hours(3);

        clock.set(t0);
        let latest = workflow.submit(group_id, 10, None).await.unwrap();
        clock.set(t0 - Duration::hours(2));
        let earliest = workflow.submit(group_id, 11, None).await.unwrap();
        clock.set(t0 - Duration::hours(1));
        let middle = workflow.submit(group_id, 12, None).await.unwrap();
        assert!(latest.id < earliest.id);

        let outcome = workflow.bulk_approve(group_id, 1).await.unwrap();

        let approved: Vec<_> = outcome.approved.iter().map(|a| a.request.id).collect();
        assert_eq!(approved, vec![earliest.id]);
        let failed: Vec<_> = outcome.failed.iter().map(|f| f.id).collect();
        assert_eq!(failed, vec![middle.id, latest.id]);
    }

    #[tokio::test]
    async fn test_bulk_approve_requires_governor() {
        let (workflow, _, _, group_id) = setup(0).await;
        workflow.store.admit(group_id, 2, Role::Member).await.unwrap();
        workflow.submit(group_id, 5, None).await.unwrap();

        let err = workflow.bulk_approve(group_id, 2).await.unwrap_err();
        assert_eq!(err, GroupError::InsufficientRole);
        assert_eq!(workflow.list_pending(group_id, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_reject_counts() {
        let (workflow, _, _, group_id) = setup(0).await;
        for user_id in 10..13 {
            workflow.submit(group_id, user_id, None).await.unwrap();
        }

        let outcome = workflow.bulk_reject(group_id, 1).await.unwrap();
        assert_eq!(outcome.rejected, 3);
        assert!(workflow.list_pending(group_id, 1).await.unwrap().is_empty());

        let outcome = workflow.bulk_reject(group_id, 1).await.unwrap();
        assert_eq!(outcome.rejected, 0);
    }
}

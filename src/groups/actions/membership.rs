use crate::groups::{
    Admission, AdmissionSource, BulkFailure, BulkOutcome, GroupRepository, Membership,
    MembershipRepository, Role,
};
use crate::{GovernanceContext, GroupError, GroupEvent};

/// Admits, removes and re-roles group members.
///
/// Every admission in the crate goes through [`MembershipStore::admit_with`],
/// which hands the whole check-and-insert to
/// [`MembershipRepository::admit`] so the capacity ceiling is enforced
/// inside one storage transaction.
///
/// The store does not authorize callers. Governance entry points run the
/// [`RoleGuard`](super::RoleGuard) first.
#[derive(Clone)]
pub struct MembershipStore<G, M>
where
    G: GroupRepository,
    M: MembershipRepository,
{
    group_repo: G,
    membership_repo: M,
    ctx: GovernanceContext,
}

impl<G, M> MembershipStore<G, M>
where
    G: GroupRepository,
    M: MembershipRepository,
{
    pub fn new(group_repo: G, membership_repo: M) -> Self {
        Self::with_context(group_repo, membership_repo, GovernanceContext::default())
    }

    pub fn with_context(group_repo: G, membership_repo: M, ctx: GovernanceContext) -> Self {
        Self {
            group_repo,
            membership_repo,
            ctx,
        }
    }

    /// Adds `user_id` to the group directly.
    ///
    /// # Returns
    ///
    /// - `Ok(membership)` - The user is now an active member
    /// - `Err(GroupError::CannotAssignOwner)` - `role` was `Owner`
    /// - `Err(GroupError::AlreadyMember)` - The user is already active
    /// - `Err(GroupError::CapacityExceeded)` - The group is full
    /// - `Err(GroupError::GroupNotFound)` - No such group
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "admit_member", skip(self), err)
    )]
    pub async fn admit(
        &self,
        group_id: i64,
        user_id: i64,
        role: Role,
    ) -> Result<Membership, GroupError> {
        if role == Role::Owner {
            return Err(GroupError::CannotAssignOwner);
        }

        self.admit_with(AdmissionSource::Direct, group_id, user_id, role)
            .await
    }

    /// Admits a user on the strength of `source`, which the repository
    /// re-validates inside the admission transaction.
    pub(crate) async fn admit_with(
        &self,
        source: AdmissionSource,
        group_id: i64,
        user_id: i64,
        role: Role,
    ) -> Result<Membership, GroupError> {
        let admission = Admission {
            group_id,
            user_id,
            role,
            source,
            at: self.ctx.clock.now(),
        };

        let membership = match self.membership_repo.admit(admission).await {
            Ok(membership) => membership,
            Err(e) => {
                log::info!(
                    target: "groupgate",
                    "msg=\"admission refused\", group_id={group_id}, user_id={user_id}, source={source:?}, error_kind={}",
                    e.kind()
                );
                return Err(e);
            }
        };

        log::info!(
            target: "groupgate",
            "msg=\"member admitted\", group_id={group_id}, user_id={user_id}, role={role}, source={source:?}"
        );

        self.ctx
            .events
            .dispatch(GroupEvent::MemberAdmitted {
                group_id,
                user_id,
                role,
                at: membership.joined_at,
            })
            .await;

        Ok(membership)
    }

    /// Marks a member removed. The owner cannot be removed.
    ///
    /// # Returns
    ///
    /// - `Ok(membership)` - The membership, now with status `removed`
    /// - `Err(GroupError::MemberNotFound)` - Target is not an active member
    /// - `Err(GroupError::CannotRemoveOwner)` - Target is the group owner
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "remove_member", skip(self), err)
    )]
    pub async fn remove(
        &self,
        group_id: i64,
        user_id: i64,
        removed_by: i64,
    ) -> Result<Membership, GroupError> {
        let target = self.active_member(group_id, user_id).await?;
        if target.is_owner() {
            return Err(GroupError::CannotRemoveOwner);
        }

        let now = self.ctx.clock.now();
        let membership = self
            .membership_repo
            .mark_removed(group_id, user_id, now)
            .await?;

        log::info!(
            target: "groupgate",
            "msg=\"member removed\", group_id={group_id}, user_id={user_id}, removed_by={removed_by}"
        );

        self.ctx
            .events
            .dispatch(GroupEvent::MemberRemoved {
                group_id,
                user_id,
                removed_by,
                at: now,
            })
            .await;

        Ok(membership)
    }

    /// Changes a member's role.
    ///
    /// Ownership cannot be granted here, and the owner's own role is fixed.
    /// Setting the role a member already has is a no-op.
    ///
    /// # Returns
    ///
    /// - `Ok(membership)` - The updated membership
    /// - `Err(GroupError::CannotAssignOwner)` - `role` was `Owner`
    /// - `Err(GroupError::MemberNotFound)` - Target is not an active member
    /// - `Err(GroupError::CannotChangeOwnerRole)` - Target is the group owner
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "change_member_role", skip(self), err)
    )]
    pub async fn change_role(
        &self,
        group_id: i64,
        user_id: i64,
        role: Role,
        changed_by: i64,
    ) -> Result<Membership, GroupError> {
        if role == Role::Owner {
            return Err(GroupError::CannotAssignOwner);
        }

        let target = self.active_member(group_id, user_id).await?;
        if target.is_owner() {
            return Err(GroupError::CannotChangeOwnerRole);
        }
        if target.role == role {
            return Ok(target);
        }

        let now = self.ctx.clock.now();
        let membership = self
            .membership_repo
            .update_role(group_id, user_id, role, now)
            .await?;

        log::info!(
            target: "groupgate",
            "msg=\"member role changed\", group_id={group_id}, user_id={user_id}, from={}, to={role}, changed_by={changed_by}",
            target.role
        );

        self.ctx
            .events
            .dispatch(GroupEvent::MemberRoleChanged {
                group_id,
                user_id,
                role,
                changed_by,
                at: now,
            })
            .await;

        Ok(membership)
    }

    /// Removes each listed member independently.
    ///
    /// A failure for one user (for example the owner) is reported in
    /// `failed` and does not stop the others.
    pub async fn bulk_remove(
        &self,
        group_id: i64,
        user_ids: &[i64],
        removed_by: i64,
    ) -> BulkOutcome<Membership> {
        let mut outcome = BulkOutcome::default();
        for &user_id in user_ids {
            match self.remove(group_id, user_id, removed_by).await {
                Ok(membership) => outcome.succeeded.push(membership),
                Err(e) => outcome.failed.push(BulkFailure::new(user_id, e)),
            }
        }

        log::info!(
            target: "groupgate",
            "msg=\"bulk remove finished\", group_id={group_id}, removed={}, failed={}",
            outcome.succeeded.len(),
            outcome.failed.len()
        );

        outcome
    }

    /// Applies each `(user_id, role)` change independently.
    pub async fn bulk_change_role(
        &self,
        group_id: i64,
        changes: &[(i64, Role)],
        changed_by: i64,
    ) -> BulkOutcome<Membership> {
        let mut outcome = BulkOutcome::default();
        for &(user_id, role) in changes {
            match self.change_role(group_id, user_id, role, changed_by).await {
                Ok(membership) => outcome.succeeded.push(membership),
                Err(e) => outcome.failed.push(BulkFailure::new(user_id, e)),
            }
        }

        log::info!(
            target: "groupgate",
            "msg=\"bulk role change finished\", group_id={group_id}, changed={}, failed={}",
            outcome.succeeded.len(),
            outcome.failed.len()
        );

        outcome
    }

    /// Active members of the group, oldest first.
    pub async fn list_members(&self, group_id: i64) -> Result<Vec<Membership>, GroupError> {
        self.ensure_group(group_id).await?;
        self.membership_repo.list_active(group_id).await
    }

    pub async fn count_members(&self, group_id: i64) -> Result<u32, GroupError> {
        self.membership_repo.count_active(group_id).await
    }

    async fn active_member(&self, group_id: i64, user_id: i64) -> Result<Membership, GroupError> {
        self.membership_repo
            .find_active(group_id, user_id)
            .await?
            .ok_or(GroupError::MemberNotFound)
    }

    async fn ensure_group(&self, group_id: i64) -> Result<(), GroupError> {
        self.group_repo
            .find_by_id(group_id)
            .await?
            .map(|_| ())
            .ok_or(GroupError::GroupNotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::groups::{
        CreateGroup, GroupVisibility, MockDatabase, MockGroupRepository, MockMembershipRepository,
    };
    use crate::{EventDispatcher, Listener};

    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Listener for Recorder {
        async fn handle(&self, event: &GroupEvent) {
            self.0.lock().unwrap().push(event.name());
        }
    }

    async fn setup(
        max_members: u32,
    ) -> (
        MembershipStore<MockGroupRepository, MockMembershipRepository>,
        i64,
        Arc<Mutex<Vec<&'static str>>>,
    ) {
        let db = MockDatabase::new();
        let group = db
            .groups()
            .create(
                CreateGroup {
                    name: "Compilers".to_owned(),
                    owner_id: 1,
                    max_members,
                    visibility: GroupVisibility::Public,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let names = Arc::new(Mutex::new(Vec::new()));
        let events = EventDispatcher::with_listeners(|registry| {
            registry.listen(Recorder(names.clone()));
        });
        let store = MembershipStore::with_context(
            db.groups(),
            db.memberships(),
            GovernanceContext::new().with_events(events),
        );

        (store, group.id, names)
    }

    #[tokio::test]
    async fn test_admit_and_capacity() {
        let (store, group_id, names) = setup(2).await;

        let membership = store.admit(group_id, 2, Role::Member).await.unwrap();
        assert!(membership.is_active());

        let err = store.admit(group_id, 3, Role::Member).await.unwrap_err();
        assert_eq!(err, GroupError::CapacityExceeded);
        assert_eq!(store.count_members(group_id).await.unwrap(), 2);
        assert_eq!(*names.lock().unwrap(), vec!["group.member.admitted"]);
    }

    #[tokio::test]
    async fn test_admit_refuses_owner_role() {
        let (store, group_id, _) = setup(0).await;

        let err = store.admit(group_id, 2, Role::Owner).await.unwrap_err();
        assert_eq!(err, GroupError::CannotAssignOwner);
    }

    #[tokio::test]
    async fn test_remove_owner_is_refused() {
        let (store, group_id, _) = setup(0).await;

        let err = store.remove(group_id, 1, 1).await.unwrap_err();
        assert_eq!(err, GroupError::CannotRemoveOwner);
        assert_eq!(store.count_members(group_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_frees_a_slot() {
        let (store, group_id, _) = setup(2).await;
        store.admit(group_id, 2, Role::Member).await.unwrap();

        let removed = store.remove(group_id, 2, 1).await.unwrap();
        assert!(!removed.is_active());

        store.admit(group_id, 3, Role::Member).await.unwrap();
        assert_eq!(store.count_members(group_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_change_role_guards() {
        let (store, group_id, _) = setup(0).await;
        store.admit(group_id, 2, Role::Member).await.unwrap();

        let err = store
            .change_role(group_id, 2, Role::Owner, 1)
            .await
            .unwrap_err();
        assert_eq!(err, GroupError::CannotAssignOwner);

        let err = store
            .change_role(group_id, 1, Role::Admin, 1)
            .await
            .unwrap_err();
        assert_eq!(err, GroupError::CannotChangeOwnerRole);

        let err = store
            .change_role(group_id, 42, Role::Admin, 1)
            .await
            .unwrap_err();
        assert_eq!(err, GroupError::MemberNotFound);

        let promoted = store.change_role(group_id, 2, Role::Admin, 1).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_bulk_remove_partial_success() {
        let (store, group_id, _) = setup(0).await;
        store.admit(group_id, 2, Role::Member).await.unwrap();
        store.admit(group_id, 3, Role::Member).await.unwrap();

        let outcome = store.bulk_remove(group_id, &[2, 1, 3], 1).await;

        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].id, 1);
        assert_eq!(outcome.failed[0].error, GroupError::CannotRemoveOwner);
        assert_eq!(store.count_members(group_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bulk_change_role_partial_success() {
        let (store, group_id, names) = setup(0).await;
        store.admit(group_id, 2, Role::Member).await.unwrap();

        let outcome = store
            .bulk_change_role(group_id, &[(1, Role::Member), (2, Role::Admin)], 1)
            .await;

        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.succeeded[0].role, Role::Admin);
        assert_eq!(outcome.failed[0].error, GroupError::CannotChangeOwnerRole);
        assert!(names
            .lock()
            .unwrap()
            .contains(&"group.member.role_changed"));
    }

    #[tokio::test]
    async fn test_list_members_unknown_group() {
        let (store, _, _) = setup(0).await;

        let err = store.list_members(999).await.unwrap_err();
        assert_eq!(err, GroupError::GroupNotFound);
    }
}

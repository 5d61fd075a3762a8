#![allow(clippy::significant_drop_tightening)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Role;
use super::repository::{
    Admission, AdmissionSource, CreateGroup, CreateInvitationLink, CreateJoinRequest,
    GroupRepository, GroupSettings, InvitationLinkRepository, JoinRequestRepository,
    MembershipRepository,
};
use super::types::{
    Group, GroupStatus, InvitationLink, JoinRequest, JoinRequestStatus, Membership,
    MembershipStatus,
};
use crate::GroupError;

#[derive(Default)]
struct MockState {
    groups: BTreeMap<i64, Group>,
    memberships: BTreeMap<(i64, i64), Membership>,
    links: BTreeMap<i64, InvitationLink>,
    requests: BTreeMap<i64, JoinRequest>,
    next_group_id: i64,
    next_link_id: i64,
    next_request_id: i64,
}

impl MockState {
    fn active_count(&self, group_id: i64) -> u32 {
        let count = self
            .memberships
            .values()
            .filter(|m| m.group_id == group_id && m.is_active())
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn is_active_member(&self, group_id: i64, user_id: i64) -> bool {
        self.memberships
            .get(&(group_id, user_id))
            .is_some_and(Membership::is_active)
    }

    fn check_source(&self, admission: &Admission) -> Result<(), GroupError> {
        match admission.source {
            AdmissionSource::Direct => Ok(()),
            AdmissionSource::InvitationLink { link_id } => {
                let link = self
                    .links
                    .get(&link_id)
                    .filter(|l| l.group_id == admission.group_id)
                    .ok_or(GroupError::InvalidToken)?;
                if link.is_expired_at(admission.at) {
                    return Err(GroupError::TokenExpired);
                }
                if link.revoked {
                    return Err(GroupError::TokenRevoked);
                }
                Ok(())
            }
            AdmissionSource::JoinRequest { request_id, .. } => {
                let request = self
                    .requests
                    .get(&request_id)
                    .filter(|r| r.group_id == admission.group_id && r.user_id == admission.user_id)
                    .ok_or(GroupError::RequestNotFound)?;
                if !request.is_pending() {
                    return Err(GroupError::RequestNotPending);
                }
                Ok(())
            }
        }
    }
}

/// In-memory storage shared by the mock repositories.
///
/// A single mutex guards all tables, so every composite repository operation
/// is atomic, matching the transactional guarantees of the SQL backends.
///
/// # Example
///
/// ```rust,ignore
/// let db = MockDatabase::new();
/// let facade = GroupAdminFacade::new(
///     db.groups(),
///     db.memberships(),
///     db.invitation_links(),
///     db.join_requests(),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockDatabase {
    state: Arc<Mutex<MockState>>,
    unavailable: Arc<AtomicBool>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> MockGroupRepository {
        MockGroupRepository { db: self.clone() }
    }

    pub fn memberships(&self) -> MockMembershipRepository {
        MockMembershipRepository { db: self.clone() }
    }

    pub fn invitation_links(&self) -> MockInvitationLinkRepository {
        MockInvitationLinkRepository { db: self.clone() }
    }

    pub fn join_requests(&self) -> MockJoinRequestRepository {
        MockJoinRequestRepository { db: self.clone() }
    }

    /// Simulates an unreachable database: every call fails with
    /// `GroupError::DatabaseError` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, GroupError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GroupError::DatabaseError("database unavailable".into()));
        }
        self.state
            .lock()
            .map_err(|_| GroupError::Internal("lock poisoned".into()))
    }
}

#[derive(Clone)]
pub struct MockGroupRepository {
    db: MockDatabase,
}

#[async_trait]
impl GroupRepository for MockGroupRepository {
    async fn create(&self, data: CreateGroup, at: DateTime<Utc>) -> Result<Group, GroupError> {
        let mut state = self.db.lock()?;
        state.next_group_id += 1;
        let id = state.next_group_id;

        let group = Group {
            id,
            name: data.name,
            owner_id: data.owner_id,
            max_members: data.max_members,
            visibility: data.visibility,
            status: GroupStatus::Active,
            created_at: at,
            updated_at: at,
        };
        state.groups.insert(id, group.clone());
        state.memberships.insert(
            (id, data.owner_id),
            Membership {
                group_id: id,
                user_id: data.owner_id,
                role: Role::Owner,
                status: MembershipStatus::Active,
                joined_at: at,
                updated_at: at,
            },
        );

        Ok(group)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Group>, GroupError> {
        let state = self.db.lock()?;
        Ok(state.groups.get(&id).cloned())
    }

    async fn update_settings(
        &self,
        id: i64,
        settings: &GroupSettings,
        at: DateTime<Utc>,
    ) -> Result<Group, GroupError> {
        let mut state = self.db.lock()?;
        let group = state.groups.get_mut(&id).ok_or(GroupError::GroupNotFound)?;

        if let Some(max_members) = settings.max_members {
            group.max_members = max_members;
        }
        if let Some(visibility) = settings.visibility {
            group.visibility = visibility;
        }
        if let Some(status) = settings.status {
            group.status = status;
        }
        group.updated_at = at;

        Ok(group.clone())
    }
}

#[derive(Clone)]
pub struct MockMembershipRepository {
    db: MockDatabase,
}

#[async_trait]
impl MembershipRepository for MockMembershipRepository {
    async fn admit(&self, admission: Admission) -> Result<Membership, GroupError> {
        let mut state = self.db.lock()?;

        let group = state
            .groups
            .get(&admission.group_id)
            .cloned()
            .ok_or(GroupError::GroupNotFound)?;

        state.check_source(&admission)?;

        if state.is_active_member(admission.group_id, admission.user_id) {
            return Err(GroupError::AlreadyMember);
        }
        if !group.has_room_for(state.active_count(admission.group_id)) {
            return Err(GroupError::CapacityExceeded);
        }

        let membership = Membership {
            group_id: admission.group_id,
            user_id: admission.user_id,
            role: admission.role,
            status: MembershipStatus::Active,
            joined_at: admission.at,
            updated_at: admission.at,
        };
        state.memberships.insert(
            (admission.group_id, admission.user_id),
            membership.clone(),
        );

        if let AdmissionSource::JoinRequest {
            request_id,
            processed_by,
        } = admission.source
        {
            if let Some(request) = state.requests.get_mut(&request_id) {
                request.status = JoinRequestStatus::Approved;
                request.processed_by = Some(processed_by);
                request.processed_at = Some(admission.at);
            }
        }

        Ok(membership)
    }

    async fn find_active(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<Membership>, GroupError> {
        let state = self.db.lock()?;
        Ok(state
            .memberships
            .get(&(group_id, user_id))
            .filter(|m| m.is_active())
            .cloned())
    }

    async fn list_active(&self, group_id: i64) -> Result<Vec<Membership>, GroupError> {
        let state = self.db.lock()?;
        let mut members: Vec<_> = state
            .memberships
            .values()
            .filter(|m| m.group_id == group_id && m.is_active())
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    async fn count_active(&self, group_id: i64) -> Result<u32, GroupError> {
        let state = self.db.lock()?;
        Ok(state.active_count(group_id))
    }

    async fn update_role(
        &self,
        group_id: i64,
        user_id: i64,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Membership, GroupError> {
        let mut state = self.db.lock()?;
        let membership = state
            .memberships
            .get_mut(&(group_id, user_id))
            .filter(|m| m.is_active())
            .ok_or(GroupError::MemberNotFound)?;

        membership.role = role;
        membership.updated_at = at;

        Ok(membership.clone())
    }

    async fn mark_removed(
        &self,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Membership, GroupError> {
        let mut state = self.db.lock()?;
        let membership = state
            .memberships
            .get_mut(&(group_id, user_id))
            .filter(|m| m.is_active())
            .ok_or(GroupError::MemberNotFound)?;

        membership.status = MembershipStatus::Removed;
        membership.updated_at = at;

        Ok(membership.clone())
    }
}

#[derive(Clone)]
pub struct MockInvitationLinkRepository {
    db: MockDatabase,
}

#[async_trait]
impl InvitationLinkRepository for MockInvitationLinkRepository {
    async fn replace_active(
        &self,
        data: CreateInvitationLink,
    ) -> Result<InvitationLink, GroupError> {
        let mut state = self.db.lock()?;
        if !state.groups.contains_key(&data.group_id) {
            return Err(GroupError::GroupNotFound);
        }

        for link in state
            .links
            .values_mut()
            .filter(|l| l.group_id == data.group_id)
        {
            link.revoked = true;
        }

        state.next_link_id += 1;
        let link = InvitationLink {
            id: state.next_link_id,
            group_id: data.group_id,
            token: data.token,
            created_by: data.created_by,
            created_at: data.created_at,
            expires_at: data.expires_at,
            revoked: false,
        };
        state.links.insert(link.id, link.clone());

        Ok(link)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<InvitationLink>, GroupError> {
        let state = self.db.lock()?;
        Ok(state.links.values().find(|l| l.token == token).cloned())
    }

    async fn find_active(
        &self,
        group_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<InvitationLink>, GroupError> {
        let state = self.db.lock()?;
        Ok(state
            .links
            .values()
            .find(|l| l.group_id == group_id && l.is_active_at(now))
            .cloned())
    }

    async fn revoke_all(&self, group_id: i64) -> Result<u64, GroupError> {
        let mut state = self.db.lock()?;
        let mut revoked = 0;
        for link in state
            .links
            .values_mut()
            .filter(|l| l.group_id == group_id && !l.revoked)
        {
            link.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[derive(Clone)]
pub struct MockJoinRequestRepository {
    db: MockDatabase,
}

#[async_trait]
impl JoinRequestRepository for MockJoinRequestRepository {
    async fn create_pending(&self, data: CreateJoinRequest) -> Result<JoinRequest, GroupError> {
        let mut state = self.db.lock()?;
        if !state.groups.contains_key(&data.group_id) {
            return Err(GroupError::GroupNotFound);
        }
        if state.is_active_member(data.group_id, data.user_id) {
            return Err(GroupError::AlreadyMember);
        }
        if state
            .requests
            .values()
            .any(|r| r.group_id == data.group_id && r.user_id == data.user_id && r.is_pending())
        {
            return Err(GroupError::DuplicatePending);
        }

        state.next_request_id += 1;
        let request = JoinRequest {
            id: state.next_request_id,
            group_id: data.group_id,
            user_id: data.user_id,
            message: data.message,
            status: JoinRequestStatus::Pending,
            requested_at: data.requested_at,
            processed_by: None,
            processed_at: None,
        };
        state.requests.insert(request.id, request.clone());

        Ok(request)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<JoinRequest>, GroupError> {
        let state = self.db.lock()?;
        Ok(state.requests.get(&id).cloned())
    }

    async fn list_pending(&self, group_id: i64) -> Result<Vec<JoinRequest>, GroupError> {
        let state = self.db.lock()?;
        let mut pending: Vec<_> = state
            .requests
            .values()
            .filter(|r| r.group_id == group_id && r.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.requested_at.cmp(&b.requested_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn reject(
        &self,
        id: i64,
        processed_by: i64,
        at: DateTime<Utc>,
    ) -> Result<JoinRequest, GroupError> {
        let mut state = self.db.lock()?;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or(GroupError::RequestNotFound)?;
        if !request.is_pending() {
            return Err(GroupError::RequestNotPending);
        }

        request.status = JoinRequestStatus::Rejected;
        request.processed_by = Some(processed_by);
        request.processed_at = Some(at);

        Ok(request.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::groups::GroupVisibility;

    async fn seed(db: &MockDatabase, max_members: u32) -> Group {
        db.groups()
            .create(
                CreateGroup {
                    name: "Linear Algebra".to_owned(),
                    owner_id: 1,
                    max_members,
                    visibility: GroupVisibility::Public,
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    fn direct(group_id: i64, user_id: i64) -> Admission {
        Admission {
            group_id,
            user_id,
            role: Role::Member,
            source: AdmissionSource::Direct,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_group_adds_owner() {
        let db = MockDatabase::new();
        let group = seed(&db, 0).await;

        let owner = db
            .memberships()
            .find_active(group.id, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.role, Role::Owner);
        assert_eq!(db.memberships().count_active(group.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_admit_respects_capacity() {
        let db = MockDatabase::new();
        let group = seed(&db, 2).await;
        let members = db.memberships();

        members.admit(direct(group.id, 2)).await.unwrap();
        let err = members.admit(direct(group.id, 3)).await.unwrap_err();

        assert_eq!(err, GroupError::CapacityExceeded);
        assert_eq!(members.count_active(group.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_admit_refuses_active_member() {
        let db = MockDatabase::new();
        let group = seed(&db, 0).await;

        let err = db.memberships().admit(direct(group.id, 1)).await.unwrap_err();
        assert_eq!(err, GroupError::AlreadyMember);
    }

    #[tokio::test]
    async fn test_removed_member_can_be_readmitted() {
        let db = MockDatabase::new();
        let group = seed(&db, 0).await;
        let members = db.memberships();

        members.admit(direct(group.id, 2)).await.unwrap();
        members.mark_removed(group.id, 2, Utc::now()).await.unwrap();
        assert!(members.find_active(group.id, 2).await.unwrap().is_none());

        let again = members.admit(direct(group.id, 2)).await.unwrap();
        assert!(again.is_active());
    }

    #[tokio::test]
    async fn test_replace_active_revokes_previous() {
        let db = MockDatabase::new();
        let group = seed(&db, 0).await;
        let links = db.invitation_links();
        let now = Utc::now();

        let first = links
            .replace_active(CreateInvitationLink {
                group_id: group.id,
                token: "first".to_owned(),
                created_by: 1,
                created_at: now,
                expires_at: now + Duration::hours(48),
            })
            .await
            .unwrap();
        let second = links
            .replace_active(CreateInvitationLink {
                group_id: group.id,
                token: "second".to_owned(),
                created_by: 1,
                created_at: now,
                expires_at: now + Duration::hours(48),
            })
            .await
            .unwrap();

        let first = links.find_by_token(&first.token).await.unwrap().unwrap();
        assert!(first.revoked);

        let active = links.find_active(group.id, now).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
    }

    #[tokio::test]
    async fn test_reject_only_once() {
        let db = MockDatabase::new();
        let group = seed(&db, 0).await;
        let requests = db.join_requests();

        let request = requests
            .create_pending(CreateJoinRequest {
                group_id: group.id,
                user_id: 5,
                message: None,
                requested_at: Utc::now(),
            })
            .await
            .unwrap();

        requests.reject(request.id, 1, Utc::now()).await.unwrap();
        let err = requests.reject(request.id, 1, Utc::now()).await.unwrap_err();
        assert_eq!(err, GroupError::RequestNotPending);
    }

    #[tokio::test]
    async fn test_unavailable_database() {
        let db = MockDatabase::new();
        db.set_unavailable(true);

        let err = db.groups().find_by_id(1).await.unwrap_err();
        assert!(err.is_internal());
    }
}

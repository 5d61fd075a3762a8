//! End-to-end governance scenarios driven through the facade.
//!
//! These tests use the in-memory repositories - no database required.
//! Run with: `cargo test --features mocks --test e2e_governance`

#![cfg(feature = "mocks")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use groupgate::groups::{
    CreateGroup, GroupAdminFacade, GroupRepository, GroupVisibility, INTERNAL_ERROR_MESSAGE,
    JoinRequestRepository, JoinRequestStatus, MembershipRepository, MembershipStore, MockDatabase,
    MockGroupRepository, MockInvitationLinkRepository, MockJoinRequestRepository,
    MockMembershipRepository, Role,
};
use groupgate::{Clock, GovernanceContext, ManualClock};

type Facade = GroupAdminFacade<
    MockGroupRepository,
    MockMembershipRepository,
    MockInvitationLinkRepository,
    MockJoinRequestRepository,
>;

const OWNER: i64 = 1;

struct Fixture {
    db: MockDatabase,
    clock: Arc<ManualClock>,
    facade: Arc<Facade>,
    group_id: i64,
}

impl Fixture {
    async fn new(max_members: u32) -> Self {
        let db = MockDatabase::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let ctx = GovernanceContext::new().with_clock(clock.clone());

        let group = db
            .groups()
            .create(
                CreateGroup {
                    name: "Linear Algebra".to_owned(),
                    owner_id: OWNER,
                    max_members,
                    visibility: GroupVisibility::Public,
                },
                clock.now(),
            )
            .await
            .unwrap();

        let facade = GroupAdminFacade::with_context(
            db.groups(),
            db.memberships(),
            db.invitation_links(),
            db.join_requests(),
            ctx,
        );

        Self {
            db,
            clock,
            facade: Arc::new(facade),
            group_id: group.id,
        }
    }

    async fn add_member(&self, user_id: i64, role: Role) {
        MembershipStore::new(self.db.groups(), self.db.memberships())
            .admit(self.group_id, user_id, role)
            .await
            .unwrap();
    }

    async fn active_count(&self) -> u32 {
        self.db
            .memberships()
            .count_active(self.group_id)
            .await
            .unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemptions_for_last_slot() {
    let fx = Fixture::new(2).await;

    let link = fx
        .facade
        .issue_or_fetch_link(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();

    let first = {
        let facade = Arc::clone(&fx.facade);
        let token = link.token.clone();
        tokio::spawn(async move { facade.redeem_link(&token, 10).await })
    };
    let second = {
        let facade = Arc::clone(&fx.facade);
        let token = link.token.clone();
        tokio::spawn(async move { facade.redeem_link(&token, 11).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.success).count(), 1);
    let loser = results.iter().find(|r| !r.success).unwrap();
    assert_eq!(loser.error_kind, Some("CAPACITY_EXCEEDED"));
    assert_eq!(fx.active_count().await, 2);
}

#[tokio::test]
async fn test_regenerated_link_revokes_previous_token() {
    let fx = Fixture::new(10).await;

    let original = fx
        .facade
        .issue_or_fetch_link(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();
    assert_eq!(original.expires_at, fx.clock.now() + Duration::hours(48));

    fx.clock.advance(Duration::minutes(10));
    let replacement = fx
        .facade
        .regenerate_link(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();
    assert_ne!(replacement.token, original.token);

    fx.clock.advance(Duration::minutes(10));
    let stale = fx.facade.redeem_link(&original.token, 20).await;
    assert!(!stale.success);
    assert_eq!(stale.error_kind, Some("TOKEN_REVOKED"));

    let fresh = fx.facade.redeem_link(&replacement.token, 20).await;
    assert!(fresh.success);
}

#[tokio::test]
async fn test_link_is_multi_use_until_it_expires() {
    let fx = Fixture::new(0).await;

    let link = fx
        .facade
        .issue_or_fetch_link(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();

    assert!(fx.facade.redeem_link(&link.token, 30).await.success);
    assert!(fx.facade.redeem_link(&link.token, 31).await.success);

    fx.clock.advance(Duration::hours(48) + Duration::seconds(1));
    let late = fx.facade.redeem_link(&link.token, 32).await;
    assert_eq!(late.error_kind, Some("TOKEN_EXPIRED"));
}

#[tokio::test]
async fn test_expired_and_revoked_link_reports_expiry() {
    let fx = Fixture::new(10).await;

    let link = fx
        .facade
        .issue_or_fetch_link(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();
    fx.clock.advance(Duration::hours(49));
    assert!(fx.facade.revoke_link(fx.group_id, OWNER).await.success);

    let response = fx.facade.redeem_link(&link.token, 40).await;
    assert_eq!(response.error_kind, Some("TOKEN_EXPIRED"));
}

#[tokio::test]
async fn test_second_pending_request_is_refused() {
    let fx = Fixture::new(10).await;

    let first = fx
        .facade
        .submit_join_request(fx.group_id, 50, Some("I'm in section B".to_owned()))
        .await;
    assert!(first.success);

    let second = fx.facade.submit_join_request(fx.group_id, 50, None).await;
    assert!(!second.success);
    assert_eq!(second.error_kind, Some("DUPLICATE_PENDING"));

    let pending = fx
        .facade
        .list_pending_requests(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_bulk_approve_admits_oldest_until_full() {
    let fx = Fixture::new(3).await;

    let mut request_ids = Vec::new();
    for user_id in 60..65 {
        fx.clock.advance(Duration::minutes(1));
        let request = fx
            .facade
            .submit_join_request(fx.group_id, user_id, None)
            .await
            .into_result()
            .unwrap();
        request_ids.push(request.id);
    }

    let outcome = fx
        .facade
        .bulk_approve(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();

    let approved: Vec<_> = outcome.approved.iter().map(|a| a.request.id).collect();
    assert_eq!(approved, request_ids[..2]);

    let failed: Vec<_> = outcome.failed.iter().map(|f| f.id).collect();
    assert_eq!(failed, request_ids[2..]);
    assert!(
        outcome
            .failed
            .iter()
            .all(|f| f.error_kind == "CAPACITY_EXCEEDED")
    );

    assert_eq!(fx.active_count().await, 3);
    let still_pending = fx.db.join_requests();
    for id in &request_ids[2..] {
        let request = still_pending.find_by_id(*id).await.unwrap().unwrap();
        assert_eq!(request.status, JoinRequestStatus::Pending);
    }
}

#[tokio::test]
async fn test_bulk_approve_picks_earliest_request_time() {
    let fx = Fixture::new(2).await;
    let start = fx.clock.now();

    // submitted in the reverse of their timestamps
    let mut submitted = Vec::new();
    for (user_id, offset) in [(120, 30), (121, 20), (122, 10)] {
        fx.clock.set(start + Duration::minutes(offset));
        let request = fx
            .facade
            .submit_join_request(fx.group_id, user_id, None)
            .await
            .into_result()
            .unwrap();
        submitted.push(request.id);
    }

    let outcome = fx
        .facade
        .bulk_approve(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();

    assert_eq!(outcome.approved.len(), 1);
    assert_eq!(outcome.approved[0].request.user_id, 122);
    let failed: Vec<_> = outcome.failed.iter().map(|f| f.id).collect();
    assert_eq!(failed, vec![submitted[1], submitted[0]]);
}

#[tokio::test]
async fn test_non_member_cannot_approve() {
    let fx = Fixture::new(10).await;

    let request = fx
        .facade
        .submit_join_request(fx.group_id, 70, None)
        .await
        .into_result()
        .unwrap();

    let response = fx.facade.approve_request(request.id, 999).await;
    assert!(!response.success);
    assert_eq!(response.error_kind, Some("NOT_MEMBER"));

    let pending = fx
        .facade
        .list_pending_requests(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(fx.active_count().await, 1);
}

#[tokio::test]
async fn test_plain_member_cannot_approve() {
    let fx = Fixture::new(10).await;
    fx.add_member(71, Role::Member).await;

    let request = fx
        .facade
        .submit_join_request(fx.group_id, 72, None)
        .await
        .into_result()
        .unwrap();

    let response = fx.facade.approve_request(request.id, 71).await;
    assert_eq!(response.error_kind, Some("INSUFFICIENT_ROLE"));
}

#[tokio::test]
async fn test_admin_cannot_remove_owner() {
    let fx = Fixture::new(10).await;
    fx.add_member(80, Role::Admin).await;

    let response = fx.facade.remove_member(fx.group_id, 80, OWNER).await;
    assert!(!response.success);
    assert_eq!(response.error_kind, Some("CANNOT_REMOVE_OWNER"));

    let owner = fx
        .db
        .memberships()
        .find_active(fx.group_id, OWNER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner.role, Role::Owner);
}

#[tokio::test]
async fn test_failed_approval_leaves_request_pending() {
    let fx = Fixture::new(2).await;

    let request = fx
        .facade
        .submit_join_request(fx.group_id, 90, None)
        .await
        .into_result()
        .unwrap();
    fx.add_member(91, Role::Member).await;

    let response = fx.facade.approve_request(request.id, OWNER).await;
    assert_eq!(response.error_kind, Some("CAPACITY_EXCEEDED"));

    let pending = fx
        .facade
        .list_pending_requests(fx.group_id, OWNER)
        .await
        .into_result()
        .unwrap();
    assert_eq!(pending[0].id, request.id);
    assert!(
        fx.db
            .memberships()
            .find_active(fx.group_id, 90)
            .await
            .unwrap()
            .is_none()
    );

    // a freed slot makes the same request approvable
    assert!(fx.facade.remove_member(fx.group_id, OWNER, 91).await.success);
    assert!(fx.facade.approve_request(request.id, OWNER).await.success);
}

#[tokio::test]
async fn test_role_changes_and_group_info() {
    let fx = Fixture::new(5).await;
    fx.add_member(100, Role::Member).await;
    fx.add_member(101, Role::Member).await;

    let promoted = fx
        .facade
        .change_member_role(fx.group_id, OWNER, 100, Role::Admin)
        .await
        .into_result()
        .unwrap();
    assert_eq!(promoted.role, Role::Admin);

    let refused = fx
        .facade
        .change_member_role(fx.group_id, 100, 101, Role::Owner)
        .await;
    assert_eq!(refused.error_kind, Some("CANNOT_ASSIGN_OWNER"));

    let info = fx
        .facade
        .get_group_info(fx.group_id)
        .await
        .into_result()
        .unwrap();
    assert_eq!(info.member_count, 3);
    assert_eq!(info.admin_count, 1);
    assert_eq!(info.open_slots, Some(2));
}

#[tokio::test]
async fn test_outage_surfaces_generic_internal_error() {
    let fx = Fixture::new(5).await;
    fx.db.set_unavailable(true);

    let response = fx.facade.submit_join_request(fx.group_id, 110, None).await;
    assert!(!response.success);
    assert_eq!(response.error_kind, Some("INTERNAL_ERROR"));
    assert_eq!(response.message, INTERNAL_ERROR_MESSAGE);

    fx.db.set_unavailable(false);
    assert!(
        fx.facade
            .submit_join_request(fx.group_id, 110, None)
            .await
            .success
    );
}

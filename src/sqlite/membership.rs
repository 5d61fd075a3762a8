//! `SQLite` implementation of [`MembershipRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::invitation::InvitationLinkRecord;
use super::join_request::JoinRequestRecord;
use super::{corrupt, db_error, lock_group};
use crate::GroupError;
use crate::groups::{
    Admission, AdmissionSource, InvitationLink, JoinRequest, Membership, MembershipRepository,
    MembershipStatus, Role,
};

/// `SQLite`-backed membership repository.
#[derive(Clone)]
pub struct SqliteMembershipRepository {
    pool: SqlitePool,
}

impl SqliteMembershipRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
pub(super) struct MembershipRecord {
    group_id: i64,
    user_id: i64,
    role: String,
    status: String,
    joined_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRecord> for Membership {
    type Error = GroupError;

    fn try_from(row: MembershipRecord) -> Result<Self, Self::Error> {
        Ok(Membership {
            group_id: row.group_id,
            user_id: row.user_id,
            role: Role::parse(&row.role).ok_or_else(|| corrupt("role", &row.role))?,
            status: MembershipStatus::parse(&row.status)
                .ok_or_else(|| corrupt("status", &row.status))?,
            joined_at: row.joined_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fetches the membership row for `(group_id, user_id)` whatever its status.
pub(super) async fn find_row(
    conn: &mut SqliteConnection,
    group_id: i64,
    user_id: i64,
) -> Result<Option<Membership>, GroupError> {
    let row: Option<MembershipRecord> = sqlx::query_as(
        "SELECT group_id, user_id, role, status, joined_at, updated_at FROM group_memberships WHERE group_id = ? AND user_id = ?",
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("find_membership"))?;

    row.map(Membership::try_from).transpose()
}

async fn count_active_in(conn: &mut SqliteConnection, group_id: i64) -> Result<u32, GroupError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM group_memberships WHERE group_id = ? AND status = 'active'",
    )
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("count_active_members"))?;

    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Re-validates the admission source under the group lock.
async fn check_source(conn: &mut SqliteConnection, admission: &Admission) -> Result<(), GroupError> {
    match admission.source {
        AdmissionSource::Direct => Ok(()),
        AdmissionSource::InvitationLink { link_id } => {
            let row: Option<InvitationLinkRecord> = sqlx::query_as(
                "SELECT id, group_id, token, created_by, created_at, expires_at, revoked FROM invitation_links WHERE id = ?",
            )
            .bind(link_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error("find_invitation_link_for_admission"))?;

            let link = InvitationLink::from(row.ok_or(GroupError::InvalidToken)?);
            if link.group_id != admission.group_id {
                return Err(GroupError::InvalidToken);
            }
            if link.is_expired_at(admission.at) {
                return Err(GroupError::TokenExpired);
            }
            if link.revoked {
                return Err(GroupError::TokenRevoked);
            }
            Ok(())
        }
        AdmissionSource::JoinRequest { request_id, .. } => {
            let row: Option<JoinRequestRecord> = sqlx::query_as(
                "SELECT id, group_id, user_id, message, status, requested_at, processed_by, processed_at FROM join_requests WHERE id = ?",
            )
            .bind(request_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error("find_join_request_for_admission"))?;

            let request = JoinRequest::try_from(row.ok_or(GroupError::RequestNotFound)?)?;
            if request.group_id != admission.group_id || request.user_id != admission.user_id {
                return Err(GroupError::RequestNotFound);
            }
            if !request.is_pending() {
                return Err(GroupError::RequestNotPending);
            }
            Ok(())
        }
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn admit(&self, admission: Admission) -> Result<Membership, GroupError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin_admit"))?;

        // dropping `tx` on any early return rolls everything back
        let group = lock_group(&mut tx, admission.group_id)
            .await?
            .ok_or(GroupError::GroupNotFound)?;

        check_source(&mut tx, &admission).await?;

        let existing = find_row(&mut tx, admission.group_id, admission.user_id).await?;
        if existing.as_ref().is_some_and(Membership::is_active) {
            return Err(GroupError::AlreadyMember);
        }

        let active = count_active_in(&mut tx, admission.group_id).await?;
        if !group.has_room_for(active) {
            return Err(GroupError::CapacityExceeded);
        }

        let sql = if existing.is_some() {
            r"
            UPDATE group_memberships
            SET role = ?, status = 'active', joined_at = ?, updated_at = ?
            WHERE group_id = ? AND user_id = ?
            RETURNING group_id, user_id, role, status, joined_at, updated_at
            "
        } else {
            r"
            INSERT INTO group_memberships (role, status, joined_at, updated_at, group_id, user_id)
            VALUES (?, 'active', ?, ?, ?, ?)
            RETURNING group_id, user_id, role, status, joined_at, updated_at
            "
        };

        let row: MembershipRecord = sqlx::query_as(sql)
            .bind(admission.role.as_str())
            .bind(admission.at)
            .bind(admission.at)
            .bind(admission.group_id)
            .bind(admission.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("admit_membership"))?;

        if let AdmissionSource::JoinRequest {
            request_id,
            processed_by,
        } = admission.source
        {
            let result = sqlx::query(
                r"
                UPDATE join_requests SET status = 'approved', processed_by = ?, processed_at = ?
                WHERE id = ? AND status = 'pending'
                ",
            )
            .bind(processed_by)
            .bind(admission.at)
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("approve_join_request"))?;

            if result.rows_affected() != 1 {
                return Err(GroupError::RequestNotPending);
            }
        }

        tx.commit().await.map_err(db_error("commit_admit"))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_active(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<Membership>, GroupError> {
        let row: Option<MembershipRecord> = sqlx::query_as(
            "SELECT group_id, user_id, role, status, joined_at, updated_at FROM group_memberships WHERE group_id = ? AND user_id = ? AND status = 'active'",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_active_membership"))?;

        row.map(Membership::try_from).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list_active(&self, group_id: i64) -> Result<Vec<Membership>, GroupError> {
        let rows: Vec<MembershipRecord> = sqlx::query_as(
            "SELECT group_id, user_id, role, status, joined_at, updated_at FROM group_memberships WHERE group_id = ? AND status = 'active'",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_active_memberships"))?;

        let mut members = rows
            .into_iter()
            .map(Membership::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));

        Ok(members)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn count_active(&self, group_id: i64) -> Result<u32, GroupError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("acquire_count_active"))?;

        count_active_in(&mut conn, group_id).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_role(
        &self,
        group_id: i64,
        user_id: i64,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<Membership, GroupError> {
        let row: Option<MembershipRecord> = sqlx::query_as(
            r"
            UPDATE group_memberships SET role = ?, updated_at = ?
            WHERE group_id = ? AND user_id = ? AND status = 'active'
            RETURNING group_id, user_id, role, status, joined_at, updated_at
            ",
        )
        .bind(role.as_str())
        .bind(at)
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update_membership_role"))?;

        row.ok_or(GroupError::MemberNotFound)?.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn mark_removed(
        &self,
        group_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Membership, GroupError> {
        let row: Option<MembershipRecord> = sqlx::query_as(
            r"
            UPDATE group_memberships SET status = 'removed', updated_at = ?
            WHERE group_id = ? AND user_id = ? AND status = 'active'
            RETURNING group_id, user_id, role, status, joined_at, updated_at
            ",
        )
        .bind(at)
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("remove_membership"))?;

        row.ok_or(GroupError::MemberNotFound)?.try_into()
    }
}

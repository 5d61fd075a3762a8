//! `SQLite` implementation of [`JoinRequestRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::membership::find_row;
use super::{corrupt, db_error, lock_group};
use crate::GroupError;
use crate::groups::{
    CreateJoinRequest, JoinRequest, JoinRequestRepository, JoinRequestStatus, Membership,
};

/// `SQLite`-backed join request repository.
#[derive(Clone)]
pub struct SqliteJoinRequestRepository {
    pool: SqlitePool,
}

impl SqliteJoinRequestRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
pub(super) struct JoinRequestRecord {
    id: i64,
    group_id: i64,
    user_id: i64,
    message: Option<String>,
    status: String,
    requested_at: DateTime<Utc>,
    processed_by: Option<i64>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JoinRequestRecord> for JoinRequest {
    type Error = GroupError;

    fn try_from(row: JoinRequestRecord) -> Result<Self, Self::Error> {
        Ok(JoinRequest {
            id: row.id,
            group_id: row.group_id,
            user_id: row.user_id,
            message: row.message,
            status: JoinRequestStatus::parse(&row.status)
                .ok_or_else(|| corrupt("status", &row.status))?,
            requested_at: row.requested_at,
            processed_by: row.processed_by,
            processed_at: row.processed_at,
        })
    }
}

#[async_trait]
impl JoinRequestRepository for SqliteJoinRequestRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create_pending(&self, data: CreateJoinRequest) -> Result<JoinRequest, GroupError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin_create_join_request"))?;

        lock_group(&mut tx, data.group_id)
            .await?
            .ok_or(GroupError::GroupNotFound)?;

        let membership = find_row(&mut tx, data.group_id, data.user_id).await?;
        if membership.as_ref().is_some_and(Membership::is_active) {
            return Err(GroupError::AlreadyMember);
        }

        let pending: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM join_requests WHERE group_id = ? AND user_id = ? AND status = 'pending')",
        )
        .bind(data.group_id)
        .bind(data.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("find_pending_join_request"))?;

        if pending {
            return Err(GroupError::DuplicatePending);
        }

        let row: JoinRequestRecord = sqlx::query_as(
            r"
            INSERT INTO join_requests (group_id, user_id, message, status, requested_at)
            VALUES (?, ?, ?, 'pending', ?)
            RETURNING id, group_id, user_id, message, status, requested_at, processed_by, processed_at
            ",
        )
        .bind(data.group_id)
        .bind(data.user_id)
        .bind(&data.message)
        .bind(data.requested_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                GroupError::DuplicatePending
            }
            _ => db_error("create_join_request")(e),
        })?;

        tx.commit()
            .await
            .map_err(db_error("commit_create_join_request"))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_id(&self, id: i64) -> Result<Option<JoinRequest>, GroupError> {
        let row: Option<JoinRequestRecord> = sqlx::query_as(
            "SELECT id, group_id, user_id, message, status, requested_at, processed_by, processed_at FROM join_requests WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_join_request_by_id"))?;

        row.map(JoinRequest::try_from).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list_pending(&self, group_id: i64) -> Result<Vec<JoinRequest>, GroupError> {
        let rows: Vec<JoinRequestRecord> = sqlx::query_as(
            "SELECT id, group_id, user_id, message, status, requested_at, processed_by, processed_at FROM join_requests WHERE group_id = ? AND status = 'pending'",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_pending_join_requests"))?;

        // timestamps are compared as values; their text form varies in precision
        let mut pending = rows
            .into_iter()
            .map(JoinRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        pending.sort_by(|a, b| a.requested_at.cmp(&b.requested_at).then(a.id.cmp(&b.id)));

        Ok(pending)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn reject(
        &self,
        id: i64,
        processed_by: i64,
        at: DateTime<Utc>,
    ) -> Result<JoinRequest, GroupError> {
        let row: Option<JoinRequestRecord> = sqlx::query_as(
            r"
            UPDATE join_requests SET status = 'rejected', processed_by = ?, processed_at = ?
            WHERE id = ? AND status = 'pending'
            RETURNING id, group_id, user_id, message, status, requested_at, processed_by, processed_at
            ",
        )
        .bind(processed_by)
        .bind(at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("reject_join_request"))?;

        match row {
            Some(row) => row.try_into(),
            None => match self.find_by_id(id).await? {
                Some(_) => Err(GroupError::RequestNotPending),
                None => Err(GroupError::RequestNotFound),
            },
        }
    }
}

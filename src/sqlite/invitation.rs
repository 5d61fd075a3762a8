//! `SQLite` implementation of [`InvitationLinkRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::{db_error, lock_group};
use crate::GroupError;
use crate::groups::{CreateInvitationLink, InvitationLink, InvitationLinkRepository};

/// `SQLite`-backed invitation link repository.
///
/// A partial unique index allows one unrevoked link per group, so a
/// replacement that skipped the revoke step would fail instead of leaving
/// two live links.
#[derive(Clone)]
pub struct SqliteInvitationLinkRepository {
    pool: SqlitePool,
}

impl SqliteInvitationLinkRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
pub(super) struct InvitationLinkRecord {
    id: i64,
    group_id: i64,
    token: String,
    created_by: i64,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

impl From<InvitationLinkRecord> for InvitationLink {
    fn from(row: InvitationLinkRecord) -> Self {
        InvitationLink {
            id: row.id,
            group_id: row.group_id,
            token: row.token,
            created_by: row.created_by,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked: row.revoked,
        }
    }
}

#[async_trait]
impl InvitationLinkRepository for SqliteInvitationLinkRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), err))]
    async fn replace_active(
        &self,
        data: CreateInvitationLink,
    ) -> Result<InvitationLink, GroupError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin_replace_invitation_link"))?;

        lock_group(&mut tx, data.group_id)
            .await?
            .ok_or(GroupError::GroupNotFound)?;

        sqlx::query("UPDATE invitation_links SET revoked = 1 WHERE group_id = ? AND revoked = 0")
            .bind(data.group_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("revoke_previous_invitation_links"))?;

        let row: InvitationLinkRecord = sqlx::query_as(
            r"
            INSERT INTO invitation_links (group_id, token, created_by, created_at, expires_at, revoked)
            VALUES (?, ?, ?, ?, ?, 0)
            RETURNING id, group_id, token, created_by, created_at, expires_at, revoked
            ",
        )
        .bind(data.group_id)
        .bind(&data.token)
        .bind(data.created_by)
        .bind(data.created_at)
        .bind(data.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("create_invitation_link"))?;

        tx.commit()
            .await
            .map_err(db_error("commit_replace_invitation_link"))?;

        Ok(row.into())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, token), err))]
    async fn find_by_token(&self, token: &str) -> Result<Option<InvitationLink>, GroupError> {
        let row: Option<InvitationLinkRecord> = sqlx::query_as(
            "SELECT id, group_id, token, created_by, created_at, expires_at, revoked FROM invitation_links WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_invitation_link_by_token"))?;

        Ok(row.map(Into::into))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_active(
        &self,
        group_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<InvitationLink>, GroupError> {
        let row: Option<InvitationLinkRecord> = sqlx::query_as(
            "SELECT id, group_id, token, created_by, created_at, expires_at, revoked FROM invitation_links WHERE group_id = ? AND revoked = 0",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_active_invitation_link"))?;

        Ok(row
            .map(InvitationLink::from)
            .filter(|link| link.is_active_at(now)))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn revoke_all(&self, group_id: i64) -> Result<u64, GroupError> {
        let result =
            sqlx::query("UPDATE invitation_links SET revoked = 1 WHERE group_id = ? AND revoked = 0")
                .bind(group_id)
                .execute(&self.pool)
                .await
                .map_err(db_error("revoke_invitation_links"))?;

        Ok(result.rows_affected())
    }
}

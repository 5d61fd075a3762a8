//! `SQLite` implementation of [`GroupRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use super::{corrupt, db_error};
use crate::GroupError;
use crate::groups::{
    CreateGroup, Group, GroupRepository, GroupSettings, GroupStatus, GroupVisibility, Role,
};

/// `SQLite`-backed group repository.
#[derive(Clone)]
pub struct SqliteGroupRepository {
    pool: SqlitePool,
}

impl SqliteGroupRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
pub(super) struct GroupRecord {
    id: i64,
    name: String,
    owner_id: i64,
    max_members: i64,
    visibility: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GroupRecord> for Group {
    type Error = GroupError;

    fn try_from(row: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Group {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            max_members: u32::try_from(row.max_members)
                .map_err(|_| corrupt("max_members", &row.max_members.to_string()))?,
            visibility: GroupVisibility::parse(&row.visibility)
                .ok_or_else(|| corrupt("visibility", &row.visibility))?,
            status: GroupStatus::parse(&row.status).ok_or_else(|| corrupt("status", &row.status))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl GroupRepository for SqliteGroupRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create(&self, data: CreateGroup, at: DateTime<Utc>) -> Result<Group, GroupError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin_create_group"))?;

        let row: GroupRecord = sqlx::query_as(
            r"
            INSERT INTO study_groups (name, owner_id, max_members, visibility, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, name, owner_id, max_members, visibility, status, created_at, updated_at
            ",
        )
        .bind(&data.name)
        .bind(data.owner_id)
        .bind(i64::from(data.max_members))
        .bind(data.visibility.as_str())
        .bind(at)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("create_group"))?;

        sqlx::query(
            r"
            INSERT INTO group_memberships (group_id, user_id, role, status, joined_at, updated_at)
            VALUES (?, ?, ?, 'active', ?, ?)
            ",
        )
        .bind(row.id)
        .bind(data.owner_id)
        .bind(Role::Owner.as_str())
        .bind(at)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("create_owner_membership"))?;

        tx.commit().await.map_err(db_error("commit_create_group"))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Group>, GroupError> {
        let row: Option<GroupRecord> = sqlx::query_as(
            "SELECT id, name, owner_id, max_members, visibility, status, created_at, updated_at FROM study_groups WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_group_by_id"))?;

        row.map(Group::try_from).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_settings(
        &self,
        id: i64,
        settings: &GroupSettings,
        at: DateTime<Utc>,
    ) -> Result<Group, GroupError> {
        let row: Option<GroupRecord> = sqlx::query_as(
            r"
            UPDATE study_groups SET
                max_members = COALESCE(?, max_members),
                visibility = COALESCE(?, visibility),
                status = COALESCE(?, status),
                updated_at = ?
            WHERE id = ?
            RETURNING id, name, owner_id, max_members, visibility, status, created_at, updated_at
            ",
        )
        .bind(settings.max_members.map(i64::from))
        .bind(settings.visibility.map(GroupVisibility::as_str))
        .bind(settings.status.map(GroupStatus::as_str))
        .bind(at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update_group_settings"))?;

        row.ok_or(GroupError::GroupNotFound)?.try_into()
    }
}

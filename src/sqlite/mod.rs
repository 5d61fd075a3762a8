//! `SQLite` database backend implementations.
//!
//! This module provides `SQLite`-backed implementations for all repository
//! traits. Enable the `sqlx_sqlite` feature to use them, and run
//! [`migrations::run`] once at startup.
//!
//! Every write that depends on the roster runs in one transaction whose
//! first statement is an update of the group row. That takes `SQLite`'s
//! write lock before anything is counted, so two admissions racing for the
//! last slot are serialized and the second sees the first.

mod group;
mod invitation;
mod join_request;
mod membership;
pub mod migrations;

pub use group::SqliteGroupRepository;
pub use invitation::SqliteInvitationLinkRepository;
pub use join_request::SqliteJoinRequestRepository;
pub use membership::SqliteMembershipRepository;
use sqlx::{SqliteConnection, SqlitePool};

use crate::GroupError;
use crate::groups::Group;

/// Creates all `SQLite` repository instances from a connection pool.
pub fn create_repositories(
    pool: SqlitePool,
) -> (
    SqliteGroupRepository,
    SqliteMembershipRepository,
    SqliteInvitationLinkRepository,
    SqliteJoinRequestRepository,
) {
    (
        SqliteGroupRepository::new(pool.clone()),
        SqliteMembershipRepository::new(pool.clone()),
        SqliteInvitationLinkRepository::new(pool.clone()),
        SqliteJoinRequestRepository::new(pool),
    )
}

/// Logs a driver error and converts it into [`GroupError::DatabaseError`].
pub(crate) fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> GroupError {
    move |e| {
        log::error!(
            target: "groupgate",
            "msg=\"database error\", operation=\"{operation}\", error=\"{e}\""
        );
        GroupError::DatabaseError(e.to_string())
    }
}

/// Error for a stored value that does not map onto a domain type.
pub(crate) fn corrupt(column: &str, value: &str) -> GroupError {
    log::error!(
        target: "groupgate",
        "msg=\"unexpected column value\", column=\"{column}\", value=\"{value}\""
    );
    GroupError::DatabaseError(format!("unexpected value {value:?} in column {column}"))
}

/// Locks the group row for the rest of the transaction.
///
/// Returns `None` when the group does not exist.
pub(crate) async fn lock_group(
    conn: &mut SqliteConnection,
    group_id: i64,
) -> Result<Option<Group>, GroupError> {
    let row: Option<group::GroupRecord> = sqlx::query_as(
        r"
        UPDATE study_groups SET roster_version = roster_version + 1
        WHERE id = ?
        RETURNING id, name, owner_id, max_members, visibility, status, created_at, updated_at
        ",
    )
    .bind(group_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("lock_group"))?;

    row.map(Group::try_from).transpose()
}

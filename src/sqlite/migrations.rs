//! Embedded database migrations for `SQLite`.
//!
//! The schema is embedded at compile time and applied programmatically, so
//! callers do not need the `sqlx` CLI.
//!
//! # Example
//!
//! ```rust,ignore
//! use groupgate::sqlite::migrations;
//! use sqlx::SqlitePool;
//!
//! async fn setup_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
//!     migrations::run(pool).await?;
//!     Ok(())
//! }
//! ```

use sqlx::{Executor, SqlitePool};

/// Group governance schema, in order.
const GROUP_MIGRATIONS: &[(&str, &str)] = &[
    (
        "20250301000001_create_study_groups_table",
        include_str!("../../migrations_sqlite/groups/20250301000001_create_study_groups_table.sql"),
    ),
    (
        "20250301000002_create_group_memberships_table",
        include_str!(
            "../../migrations_sqlite/groups/20250301000002_create_group_memberships_table.sql"
        ),
    ),
    (
        "20250301000003_create_invitation_links_table",
        include_str!(
            "../../migrations_sqlite/groups/20250301000003_create_invitation_links_table.sql"
        ),
    ),
    (
        "20250301000004_create_join_requests_table",
        include_str!(
            "../../migrations_sqlite/groups/20250301000004_create_join_requests_table.sql"
        ),
    ),
];

/// Runs all pending migrations.
///
/// Applied migrations are tracked in the `_groupgate_migrations` table, so
/// running this repeatedly is safe.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r"
        CREATE TABLE IF NOT EXISTS _groupgate_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .await?;

    run_migrations(pool, GROUP_MIGRATIONS).await
}

/// Names of the migrations already applied, in the order they ran.
pub async fn applied(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM _groupgate_migrations ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Runs a set of migrations against the database.
///
/// # Limitations
///
/// Statements are split on `;`, so migration files must not contain
/// semicolons inside string literals or trigger bodies.
async fn run_migrations(pool: &SqlitePool, migrations: &[(&str, &str)]) -> Result<(), sqlx::Error> {
    for (name, sql) in migrations {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _groupgate_migrations WHERE name = ?)")
                .bind(*name)
                .fetch_one(pool)
                .await?;

        if applied {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                (&mut *tx).execute(trimmed).await?;
            }
        }

        sqlx::query("INSERT INTO _groupgate_migrations (name) VALUES (?)")
            .bind(*name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!(target: "groupgate", "msg=\"migration applied\", name=\"{name}\"");
    }

    Ok(())
}

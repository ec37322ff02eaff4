//! Database operations for `projects`.
//!
//! Project CRUD beyond this lives in the account-management service; the
//! pipeline only needs to create projects (seeding, tests) and read the
//! tracked domain.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `projects` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    /// Stored normalized: no scheme, no leading `www.`.
    pub domain: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Creates a project and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_project(pool: &PgPool, name: &str, domain: &str) -> Result<ProjectRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ProjectRow>(
        "INSERT INTO projects (public_id, name, domain) \
         VALUES ($1, $2, $3) \
         RETURNING id, public_id, name, domain, active, created_at",
    )
    .bind(public_id)
    .bind(name)
    .bind(domain)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns the tracked domain for a project.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no project exists with the given `id`,
/// or [`DbError::Sqlx`] if the query fails.
pub async fn get_project_domain(pool: &PgPool, id: i64) -> Result<String, DbError> {
    let domain = sqlx::query_scalar::<_, String>("SELECT domain FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(domain)
}

//! Workflow CRUD operations.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{WorkflowRow, WORKFLOW_COLUMNS},
    DbError,
};

/// Insert a new workflow into the database.
///
/// `definition` must be a JSON object produced by serialising the domain
/// `WorkflowDefinition` type from the `engine` crate.
pub async fn create_workflow(
    pool: &PgPool,
    name: &str,
    definition: serde_json::Value,
) -> Result<WorkflowRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as::<_, WorkflowRow>(&format!(
        r#"
        INSERT INTO workflows (id, name, definition, is_active, version, created_at, updated_at)
        VALUES ($1, $2, $3, FALSE, 0, $4, $4)
        RETURNING {WORKFLOW_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(definition)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRow>(&format!(
        "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Return all workflows ordered by creation time (newest first).
pub async fn list_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
        "SELECT {WORKFLOW_COLUMNS} FROM workflows ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Overwrite the saved definition and bump the version.
///
/// With `expected_version` set the write only lands if the row is still at
/// that version; otherwise it is last-writer-wins.
///
/// # Errors
/// - [`DbError::NotFound`] if no such workflow exists.
/// - [`DbError::VersionConflict`] if the row moved past `expected_version`.
pub async fn update_definition(
    pool: &PgPool,
    id: Uuid,
    definition: serde_json::Value,
    expected_version: Option<i64>,
) -> Result<WorkflowRow, DbError> {
    let updated = sqlx::query_as::<_, WorkflowRow>(&format!(
        r#"
        UPDATE workflows
        SET definition = $1, version = version + 1, updated_at = $2
        WHERE id = $3 AND ($4::BIGINT IS NULL OR version = $4)
        RETURNING {WORKFLOW_COLUMNS}
        "#
    ))
    .bind(definition)
    .bind(Utc::now())
    .bind(id)
    .bind(expected_version)
    .fetch_optional(pool)
    .await?;

    match (updated, expected_version) {
        (Some(row), _) => Ok(row),
        (None, Some(expected)) => {
            // Either the row is gone or someone saved in between.
            let current = get_workflow(pool, id).await?;
            Err(DbError::VersionConflict {
                expected,
                actual: current.version,
            })
        }
        (None, None) => Err(DbError::NotFound),
    }
}

/// Permanently delete a workflow by its primary key.
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_workflow(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

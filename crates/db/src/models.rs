//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models: they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    /// Saved graph: `{ nodes, edges, entryNodeId }`.
    pub definition: serde_json::Value,
    pub is_active: bool,
    /// Bumped on every successful definition save.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns selected for every `WorkflowRow` query.
pub(crate) const WORKFLOW_COLUMNS: &str =
    "id, name, definition, is_active, version, created_at, updated_at";

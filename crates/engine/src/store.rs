//! The persistence collaborator.
//!
//! [`WorkflowStore`] is the seam between the graph model and wherever saved
//! workflows live. [`PgWorkflowStore`] goes through the `db` crate;
//! [`MemoryWorkflowStore`] keeps everything in process for tests and for
//! running the API without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use db::{models::WorkflowRow, repository::workflows as wf_repo, DbPool};

use crate::{models::WorkflowDefinition, EngineError};

/// A workflow record as the store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWorkflow {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub version: i64,
    pub definition: WorkflowDefinition,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Load/save contract for workflow records.
///
/// Saves are whole-document overwrites. Passing `expected_version` turns a
/// save into a compare-and-swap that fails with
/// [`EngineError::VersionConflict`] if someone saved in between.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Create a record holding an empty graph.
    async fn create(&self, name: &str) -> Result<StoredWorkflow, EngineError>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<StoredWorkflow>, EngineError>;

    async fn load(&self, id: Uuid) -> Result<StoredWorkflow, EngineError>;

    async fn save(
        &self,
        id: Uuid,
        definition: &WorkflowDefinition,
        expected_version: Option<i64>,
    ) -> Result<StoredWorkflow, EngineError>;

    async fn delete(&self, id: Uuid) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Store backed by the `workflows` table.
#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: DbPool,
}

impl PgWorkflowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn encode(definition: &WorkflowDefinition) -> Result<serde_json::Value, EngineError> {
    serde_json::to_value(definition).map_err(|e| EngineError::PersistenceFailure(e.to_string()))
}

fn decode(row: WorkflowRow) -> Result<StoredWorkflow, EngineError> {
    let definition = serde_json::from_value(row.definition).map_err(|e| {
        EngineError::PersistenceFailure(format!("stored definition of {} is malformed: {e}", row.id))
    })?;

    Ok(StoredWorkflow {
        id: row.id,
        name: row.name,
        is_active: row.is_active,
        version: row.version,
        definition,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    #[instrument(skip(self))]
    async fn create(&self, name: &str) -> Result<StoredWorkflow, EngineError> {
        let definition = encode(&WorkflowDefinition::default())?;
        let row = wf_repo::create_workflow(&self.pool, name, definition)
            .await
            .map_err(|e| EngineError::PersistenceFailure(e.to_string()))?;
        decode(row)
    }

    async fn list(&self) -> Result<Vec<StoredWorkflow>, EngineError> {
        wf_repo::list_workflows(&self.pool)
            .await
            .map_err(|e| EngineError::PersistenceFailure(e.to_string()))?
            .into_iter()
            .map(decode)
            .collect()
    }

    #[instrument(skip(self))]
    async fn load(&self, id: Uuid) -> Result<StoredWorkflow, EngineError> {
        let row = wf_repo::get_workflow(&self.pool, id)
            .await
            .map_err(|e| EngineError::from_db_error(id, e))?;
        decode(row)
    }

    #[instrument(skip(self, definition))]
    async fn save(
        &self,
        id: Uuid,
        definition: &WorkflowDefinition,
        expected_version: Option<i64>,
    ) -> Result<StoredWorkflow, EngineError> {
        let row = wf_repo::update_definition(&self.pool, id, encode(definition)?, expected_version)
            .await
            .map_err(|e| EngineError::from_db_error(id, e))?;
        debug!(version = row.version, "workflow definition saved");
        decode(row)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
        wf_repo::delete_workflow(&self.pool, id)
            .await
            .map_err(|e| EngineError::from_db_error(id, e))
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store with the same versioning rules as Postgres.
#[derive(Default)]
pub struct MemoryWorkflowStore {
    records: RwLock<HashMap<Uuid, StoredWorkflow>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn create(&self, name: &str) -> Result<StoredWorkflow, EngineError> {
        let now = Utc::now();
        let record = StoredWorkflow {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            is_active: false,
            version: 0,
            definition: WorkflowDefinition::default(),
            created_at: now,
            updated_at: now,
        };
        self.records.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<StoredWorkflow>, EngineError> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn load(&self, id: Uuid) -> Result<StoredWorkflow, EngineError> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(EngineError::WorkflowNotFound(id))
    }

    async fn save(
        &self,
        id: Uuid,
        definition: &WorkflowDefinition,
        expected_version: Option<i64>,
    ) -> Result<StoredWorkflow, EngineError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(EngineError::WorkflowNotFound(id))?;

        if let Some(expected) = expected_version {
            if record.version != expected {
                return Err(EngineError::VersionConflict {
                    expected,
                    actual: record.version,
                });
            }
        }

        record.definition = definition.clone();
        record.version += 1;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
        self.records
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::WorkflowNotFound(id))
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Edge;

    #[tokio::test]
    async fn save_bumps_version_and_replaces_definition() {
        let store = MemoryWorkflowStore::new();
        let created = store.create("Onboarding").await.unwrap();
        assert_eq!(created.version, 0);

        let definition = WorkflowDefinition {
            nodes: vec![],
            edges: vec![],
            entry_node_id: None,
        };
        let saved = store.save(created.id, &definition, Some(0)).await.unwrap();
        assert_eq!(saved.version, 1);
        assert_eq!(store.load(created.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let store = MemoryWorkflowStore::new();
        let created = store.create("Onboarding").await.unwrap();
        let definition = WorkflowDefinition::default();

        store.save(created.id, &definition, Some(0)).await.unwrap();
        let err = store.save(created.id, &definition, Some(0)).await.unwrap_err();
        assert_eq!(err, EngineError::VersionConflict { expected: 0, actual: 1 });

        // Unversioned saves are last-writer-wins.
        assert!(store.save(created.id, &definition, None).await.is_ok());
    }

    #[tokio::test]
    async fn missing_workflow_is_reported() {
        let store = MemoryWorkflowStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.load(id).await.unwrap_err(), EngineError::WorkflowNotFound(id));
        assert_eq!(store.delete(id).await.unwrap_err(), EngineError::WorkflowNotFound(id));
    }

    #[tokio::test]
    async fn stored_definition_round_trips_through_json() {
        let store = MemoryWorkflowStore::new();
        let created = store.create("Menu").await.unwrap();
        let definition = WorkflowDefinition {
            nodes: vec![],
            edges: vec![Edge {
                id: "e".into(),
                source: "a".into(),
                source_handle: None,
                target: "b".into(),
                target_handle: None,
            }],
            entry_node_id: Some("b".into()),
        };
        store.save(created.id, &definition, None).await.unwrap();

        let loaded = store.load(created.id).await.unwrap();
        let json = serde_json::to_value(&loaded).unwrap();
        assert_eq!(json["definition"]["entryNodeId"], "b");
        assert_eq!(json["isActive"], false);
    }
}

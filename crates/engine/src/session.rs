//! One authoring session over one workflow.
//!
//! `EditorSession` owns the in-memory graph while an author edits it:
//! 1. Loads the saved definition from a [`WorkflowStore`].
//! 2. Applies editor commands, tracking whether there are unsaved edits.
//! 3. Saves the whole graph back with the version it was loaded at.
//!
//! A failed save leaves the graph and the dirty flag exactly as they were,
//! so the author can retry without redoing any work.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    command::{CommandOutcome, EditorCommand},
    layout::{apply_layout, LayoutConfig},
    models::WorkflowGraph,
    store::WorkflowStore,
    transfer::{export_graph, import_str, ExportDocument, ImportMode, ImportReport},
    validation::validate_graph,
    EngineError,
};

pub struct EditorSession {
    workflow_id: Uuid,
    name: String,
    is_active: bool,
    /// Version of the record the graph was loaded from / last saved as.
    version: i64,
    graph: WorkflowGraph,
    dirty: bool,
    store: Arc<dyn WorkflowStore>,
}

impl EditorSession {
    /// Load a workflow and start editing it.
    ///
    /// # Errors
    /// Persistence errors from the store, or a structural error if the saved
    /// definition does not form a valid graph.
    #[instrument(skip(store))]
    pub async fn open(store: Arc<dyn WorkflowStore>, workflow_id: Uuid) -> Result<Self, EngineError> {
        let record = store.load(workflow_id).await?;
        let graph = WorkflowGraph::from_definition(record.definition)?;
        info!(
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            version = record.version,
            "editor session opened"
        );

        Ok(Self {
            workflow_id,
            name: record.name,
            is_active: record.is_active,
            version: record.version,
            graph,
            dirty: false,
            store,
        })
    }

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Whether there are edits since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply one editor command.
    pub fn apply(&mut self, command: EditorCommand) -> Result<CommandOutcome, EngineError> {
        let name = command.name();
        match command.apply(&mut self.graph) {
            Ok(outcome) => {
                self.dirty |= outcome.changed_graph();
                Ok(outcome)
            }
            Err(err) => {
                warn!(workflow_id = %self.workflow_id, command = name, error = %err, "command rejected");
                Err(err)
            }
        }
    }

    /// Persist the whole graph, guarded by the version it was loaded at.
    /// Returns the new version.
    ///
    /// # Errors
    /// - A structural error if the graph is somehow invalid (nothing is sent).
    /// - [`EngineError::VersionConflict`] if another session saved first.
    /// - [`EngineError::PersistenceFailure`] for store failures.
    #[instrument(skip(self), fields(workflow_id = %self.workflow_id, version = self.version))]
    pub async fn save(&mut self) -> Result<i64, EngineError> {
        validate_graph(&self.graph)?;
        let definition = self.graph.to_definition();

        match self
            .store
            .save(self.workflow_id, &definition, Some(self.version))
            .await
        {
            Ok(record) => {
                self.version = record.version;
                self.dirty = false;
                info!(new_version = record.version, "workflow saved");
                Ok(record.version)
            }
            Err(err) => {
                warn!(error = %err, "save failed, keeping unsaved edits");
                Err(err)
            }
        }
    }

    /// Snapshot the current graph into an export document.
    pub fn export(&self) -> ExportDocument {
        export_graph(&self.graph, &self.workflow_id.to_string(), &self.name)
    }

    /// Import an export document into this session's graph.
    pub fn import(&mut self, json: &str, mode: ImportMode) -> Result<ImportReport, EngineError> {
        let report = import_str(&mut self.graph, json, mode)?;
        self.dirty = true;
        Ok(report)
    }

    /// Re-arrange every node.
    pub fn auto_layout(&mut self, config: &LayoutConfig) {
        apply_layout(&mut self.graph, config);
        self.dirty = true;
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Position, WorkflowDefinition},
        store::{MemoryWorkflowStore, StoredWorkflow},
    };
    use async_trait::async_trait;
    use serde_json::json;

    /// Loads from an inner store but refuses every save.
    struct FailingSaves(MemoryWorkflowStore);

    #[async_trait]
    impl WorkflowStore for FailingSaves {
        async fn create(&self, name: &str) -> Result<StoredWorkflow, EngineError> {
            self.0.create(name).await
        }
        async fn list(&self) -> Result<Vec<StoredWorkflow>, EngineError> {
            self.0.list().await
        }
        async fn load(&self, id: Uuid) -> Result<StoredWorkflow, EngineError> {
            self.0.load(id).await
        }
        async fn save(
            &self,
            _id: Uuid,
            _definition: &WorkflowDefinition,
            _expected_version: Option<i64>,
        ) -> Result<StoredWorkflow, EngineError> {
            Err(EngineError::PersistenceFailure("connection reset".into()))
        }
        async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
            self.0.delete(id).await
        }
    }

    fn add(type_tag: &str) -> EditorCommand {
        EditorCommand::AddNode {
            type_tag: type_tag.into(),
            label: None,
            position: Position::default(),
        }
    }

    #[tokio::test]
    async fn edits_save_and_reload() {
        let store = Arc::new(MemoryWorkflowStore::new());
        let record = store.create("Welcome").await.unwrap();

        let mut session = EditorSession::open(store.clone(), record.id).await.unwrap();
        let CommandOutcome::NodeAdded(text) = session.apply(add("message.text")).unwrap() else {
            panic!("expected a node");
        };
        session
            .apply(EditorCommand::SetEntryNode { id: Some(text.id.clone()) })
            .unwrap();
        assert!(session.is_dirty());

        assert_eq!(session.save().await.unwrap(), 1);
        assert!(!session.is_dirty());

        let reopened = EditorSession::open(store, record.id).await.unwrap();
        assert_eq!(reopened.graph(), session.graph());
        assert_eq!(reopened.graph().entry_node_id(), Some(text.id.as_str()));
    }

    #[tokio::test]
    async fn failed_save_keeps_unsaved_edits() {
        let inner = MemoryWorkflowStore::new();
        let record = inner.create("Welcome").await.unwrap();
        let store: Arc<dyn WorkflowStore> = Arc::new(FailingSaves(inner));

        let mut session = EditorSession::open(store, record.id).await.unwrap();
        session.apply(add("quickReply")).unwrap();
        let before = session.graph().clone();

        let err = session.save().await.unwrap_err();
        assert!(err.is_persistence());
        assert!(session.is_dirty());
        assert_eq!(session.version(), 0);
        assert_eq!(session.graph(), &before);
    }

    #[tokio::test]
    async fn concurrent_sessions_conflict() {
        let store = Arc::new(MemoryWorkflowStore::new());
        let record = store.create("Shared").await.unwrap();

        let mut first = EditorSession::open(store.clone(), record.id).await.unwrap();
        let mut second = EditorSession::open(store, record.id).await.unwrap();

        first.apply(add("message.text")).unwrap();
        second.apply(add("message.media")).unwrap();

        first.save().await.unwrap();
        assert_eq!(
            second.save().await.unwrap_err(),
            EngineError::VersionConflict { expected: 0, actual: 1 }
        );
    }

    #[tokio::test]
    async fn rejected_command_does_not_dirty_session() {
        let store = Arc::new(MemoryWorkflowStore::new());
        let record = store.create("Welcome").await.unwrap();
        let mut session = EditorSession::open(store, record.id).await.unwrap();

        let err = session
            .apply(EditorCommand::UpdateNodeConfig {
                id: "missing".into(),
                patch: json!({ "body": "hi" }),
            })
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownNode("missing".into()));
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn export_then_import_into_fresh_session() {
        let store = Arc::new(MemoryWorkflowStore::new());
        let source = store.create("Source").await.unwrap();
        let target = store.create("Target").await.unwrap();

        let mut session = EditorSession::open(store.clone(), source.id).await.unwrap();
        session.apply(add("firstMessageTrigger")).unwrap();
        session.apply(add("listMessage")).unwrap();
        let json = serde_json::to_string(&session.export()).unwrap();

        let mut other = EditorSession::open(store, target.id).await.unwrap();
        let report = other.import(&json, ImportMode::Replace).unwrap();
        assert_eq!(report.nodes_imported, 2);
        assert!(report.remapped_node_ids.is_empty());
        assert_eq!(other.graph(), session.graph());
        assert!(other.is_dirty());
    }
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use engine::{
    Edge, EditorCommand, EditorSession, NodeRecord, StoredWorkflow, WorkflowDefinition,
    WorkflowGraph,
};
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::SavedGraph;
use crate::{error::ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
}

/// Body of a definition save.
///
/// `entryNodeId` distinguishes three cases: a node id sets the entry node,
/// an explicit `null` clears it, and an absent key keeps the stored entry
/// node as long as the new definition still holds it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDefinitionRequest {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, deserialize_with = "present")]
    pub entry_node_id: Option<Option<String>>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Wraps any present value (including `null`) in `Some`; an absent key
/// falls back to `None` through `#[serde(default)]`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandBatch {
    pub commands: Vec<EditorCommand>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<StoredWorkflow>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<StoredWorkflow>, ApiError> {
    Ok(Json(state.store.load(id).await?))
}

#[instrument(skip(state, payload), fields(name = %payload.name))]
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<StoredWorkflow>), ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("workflow name must not be empty".into()));
    }
    let record = state.store.create(name).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Overwrite the stored graph. The definition must form a valid graph.
#[instrument(skip(state, payload))]
pub async fn save_definition(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<SaveDefinitionRequest>,
) -> Result<Json<StoredWorkflow>, ApiError> {
    let SaveDefinitionRequest {
        nodes,
        edges,
        entry_node_id,
        expected_version,
    } = payload;
    let keep_stored_entry = entry_node_id.is_none();

    let mut graph = WorkflowGraph::from_definition(WorkflowDefinition {
        nodes,
        edges,
        entry_node_id: entry_node_id.flatten(),
    })?;

    if keep_stored_entry {
        let stored = state.store.load(id).await?;
        if let Some(previous) = stored.definition.entry_node_id {
            if let Err(err) = graph.set_entry_node(Some(&previous)) {
                debug!(entry_node_id = %previous, error = %err, "stored entry node dropped");
            }
        }
    }

    let record = state
        .store
        .save(id, &graph.to_definition(), expected_version)
        .await?;
    Ok(Json(record))
}

/// Apply a batch of editor commands in order and save the result.
/// The first rejected command aborts the batch and nothing is saved.
#[instrument(skip(state, batch), fields(commands = batch.commands.len()))]
pub async fn apply_commands(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(batch): Json<CommandBatch>,
) -> Result<Json<SavedGraph>, ApiError> {
    let mut session = EditorSession::open(state.store.clone(), id).await?;
    for command in batch.commands {
        session.apply(command)?;
    }
    if session.is_dirty() {
        session.save().await?;
    }
    Ok(Json(SavedGraph::from_session(&session)))
}

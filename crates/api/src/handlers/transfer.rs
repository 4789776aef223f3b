use axum::{
    extract::{Path, Query, State},
    Json,
};
use engine::{EditorSession, ExportDocument, ImportMode, ImportReport};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::SavedGraph;
use crate::{error::ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ImportParams {
    #[serde(default)]
    pub mode: ImportMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub report: ImportReport,
    #[serde(flatten)]
    pub saved: SavedGraph,
}

pub async fn export(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ExportDocument>, ApiError> {
    let session = EditorSession::open(state.store.clone(), id).await?;
    Ok(Json(session.export()))
}

/// Import an export document (raw JSON body) and persist the result.
#[instrument(skip(state, body), fields(mode = ?params.mode))]
pub async fn import(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Result<Json<ImportResponse>, ApiError> {
    let mut session = EditorSession::open(state.store.clone(), id).await?;
    let report = session.import(&body, params.mode)?;
    session.save().await?;
    info!(
        nodes = report.nodes_imported,
        edges = report.edges_imported,
        remapped = report.remapped_node_ids.len(),
        "workflow imported"
    );

    Ok(Json(ImportResponse {
        report,
        saved: SavedGraph::from_session(&session),
    }))
}

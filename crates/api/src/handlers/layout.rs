use axum::{
    extract::{Path, State},
    Json,
};
use engine::{EditorSession, LayoutConfig, LayoutDirection};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::SavedGraph;
use crate::{error::ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct LayoutRequest {
    #[serde(default)]
    pub direction: LayoutDirection,
}

#[instrument(skip(state))]
pub async fn auto_layout(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<LayoutRequest>,
) -> Result<Json<SavedGraph>, ApiError> {
    let mut session = EditorSession::open(state.store.clone(), id).await?;
    session.auto_layout(&LayoutConfig::with_direction(request.direction));
    session.save().await?;
    Ok(Json(SavedGraph::from_session(&session)))
}

pub mod catalog;
pub mod layout;
pub mod transfer;
pub mod workflows;

use engine::{EditorSession, WorkflowDefinition};
use serde::Serialize;

/// Response body for every endpoint that persists a graph.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGraph {
    pub version: i64,
    pub definition: WorkflowDefinition,
}

impl SavedGraph {
    pub(crate) fn from_session(session: &EditorSession) -> Self {
        Self {
            version: session.version(),
            definition: session.graph().to_definition(),
        }
    }
}

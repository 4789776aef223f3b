//! `engine` crate: the workflow graph model, its mutation protocol,
//! validation, auto-layout, export/import and the editor session.

pub mod command;
pub mod error;
pub mod graph;
pub mod layout;
pub mod models;
pub mod session;
pub mod store;
pub mod transfer;
pub mod validation;

pub use command::{CommandOutcome, EditorCommand};
pub use error::EngineError;
pub use layout::{apply_layout, compute_layout, LayoutConfig, LayoutDirection};
pub use models::{Edge, Node, NodeRecord, Position, WorkflowDefinition, WorkflowGraph};
pub use session::EditorSession;
pub use store::{MemoryWorkflowStore, PgWorkflowStore, StoredWorkflow, WorkflowStore};
pub use transfer::{export_graph, import_str, ExportDocument, ImportMode, ImportReport};
pub use validation::validate_graph;

//! `nodes` crate: the node catalog and typed node configuration.
//!
//! Every node placed on a workflow canvas carries a type tag. The catalog
//! maps that tag to its kind, output arity and config shape; the graph model
//! in the `engine` crate consults it on every mutation.

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{lookup, CatalogEntry, ConfigShape, NodeKind, OutputArity, OutputSlot};
pub use config::NodeConfig;
pub use error::NodeError;

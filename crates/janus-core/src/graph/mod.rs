//! Node-and-edge graph engine.
//!
//! This module provides:
//! - The editable in-memory graph (arena nodes plus derived topology)
//! - Flat-to-graph import with exhaustive violation reporting
//! - Graph-to-flat export in topological order
//! - Cycle detection and shape diagnostics

mod export;
mod import;
mod types;

pub use export::{diagnose_shapes, ExportOptions, ShapeIssue};
pub use import::{import_bytes, import_file, import_reader};
pub use types::{
    EdgeInfo, Graph, Node, NodeId, NodeKind, TensorOrigin, TensorRef, DEFAULT_OPSET,
};

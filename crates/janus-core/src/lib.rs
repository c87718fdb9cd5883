//! Core engine for the Janus ONNX model editor.
//!
//! This crate provides:
//! - A flat, name-referenced graph model (JSON serializable)
//! - Edge reconstruction from tensor names (import)
//! - A stable-id node/edge graph for interactive structural editing
//! - Conversion back to the flat form in topological order (export)
//! - Layered automatic layout with barycenter crossing reduction

pub mod dtype;
pub mod error;
pub mod flat;
pub mod graph;
pub mod layout;
pub mod schema;
pub mod value;

pub use dtype::{DType, Dim};
pub use error::{Error, ImportViolation, ImportWarning, Result};
pub use flat::{FlatGraph, FlatNode, FlatTensor, FlatValue, ProducerInfo, TensorIndex};
pub use graph::{
    diagnose_shapes, import_bytes, import_file, import_reader, EdgeInfo, ExportOptions, Graph,
    Node, NodeId, NodeKind, ShapeIssue, TensorOrigin, TensorRef,
};
pub use layout::{LayeredBarycenter, LayoutBackend, LayoutOptions, Orientation, Position};
pub use schema::{all_schemas, schema_for, AttrKind, AttrSchema, OpSchema};
pub use value::{AttrValue, Attribute, TensorData, TensorValues};

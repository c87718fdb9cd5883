//! Error types for janus-core.

use thiserror::Error;

use crate::graph::NodeId;

/// Result type for janus-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in janus-core.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more structural violations found while importing a flat graph.
    #[error("import failed with {} violation(s):\n{}", violations.len(), list_violations(violations))]
    Import { violations: Vec<ImportViolation> },

    /// The derived edge set contains a cycle, so no valid node order exists.
    #[error("cycle detected through nodes: {}", nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    /// A required input port resolves to no edge, no tensor name, and no
    /// inline data.
    #[error("node '{node}' is missing required input {port}")]
    MissingRequiredInput { node: String, port: usize },

    /// Node not found.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Invalid mutation (e.g., connecting to an occupied input port).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// A single structural violation found while importing a flat graph.
///
/// Import collects every violation it finds before failing, so a user can
/// fix the whole batch in one editing pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportViolation {
    /// More than one producer claims the same tensor name.
    #[error("tensor '{tensor}' has multiple producers: {}", producers.join(", "))]
    AmbiguousProducer {
        tensor: String,
        producers: Vec<String>,
    },

    /// A consumed tensor name is produced nowhere.
    #[error("tensor '{tensor}' consumed by '{consumer}' is never produced")]
    DanglingReference { tensor: String, consumer: String },
}

impl ImportViolation {
    /// The tensor name this violation is about.
    pub fn tensor(&self) -> &str {
        match self {
            ImportViolation::AmbiguousProducer { tensor, .. } => tensor,
            ImportViolation::DanglingReference { tensor, .. } => tensor,
        }
    }
}

/// A non-fatal issue recorded on a node during import.
///
/// Editors must still load malformed graphs so the user can repair them,
/// so these attach to the node instead of failing the import.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportWarning {
    /// An attribute value does not match the kind the operator schema declares.
    #[error("attribute '{attribute}' expected {expected}, found {found}")]
    AttributeTypeMismatch {
        attribute: String,
        expected: String,
        found: String,
    },
}

fn list_violations(violations: &[ImportViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

//! Tensor element types and shape dimensions.

use serde::{Deserialize, Serialize};

/// Element type of a tensor.
///
/// The closed set of types the editor can create and display. Models that
/// use other ONNX element types can still be loaded; their tensors simply
/// carry no dtype tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Float32,
    Float64,
    Int32,
    Int64,
    Str,
}

impl DType {
    /// All supported element types, in the order editors should list them.
    pub const ALL: [DType; 5] = [
        DType::Float32,
        DType::Float64,
        DType::Int32,
        DType::Int64,
        DType::Str,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Str => "str",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dimension of a tensor shape: a fixed extent or a named symbolic size.
///
/// Serializes untagged, so a JSON shape reads naturally as `[1, "batch", 224]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    Fixed(u64),
    Sym(String),
}

impl std::fmt::Display for Dim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{}", n),
            Dim::Sym(name) => f.write_str(name),
        }
    }
}

/// Render a shape as `[1, batch, 224]` for logs and summaries.
pub fn format_shape(shape: &[Dim]) -> String {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    format!("[{}]", dims.join(", "))
}

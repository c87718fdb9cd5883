//! The serialized flat-graph model.
//!
//! A flat graph is an operator list plus declared graph inputs and outputs.
//! It carries no edges; dependencies are implicit in shared tensor names.
//! Deserialization is deliberately lenient (every list and metadata field
//! defaults) so partially written files still load for repair.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dtype::{DType, Dim};
use crate::error::Result;
use crate::value::{Attribute, TensorData};

/// Model-level metadata preserved across load and save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerInfo {
    pub producer_name: String,
    pub producer_version: String,
    pub ir_version: i64,
    pub model_version: i64,
}

/// A declared graph input or output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatTensor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<Dim>>,
}

impl FlatTensor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: None,
            shape: None,
        }
    }

    pub fn with_type(name: impl Into<String>, dtype: DType, shape: Vec<Dim>) -> Self {
        Self {
            name: name.into(),
            dtype: Some(dtype),
            shape: Some(shape),
        }
    }
}

/// A tensor slot on a flat node: a name plus optional type, shape, and
/// inline initializer data. Name `""` marks an intentionally absent
/// optional slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<Dim>>,
    /// Inline initializer: a constant fed directly into this slot without
    /// a producing node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TensorData>,
}

impl FlatValue {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: None,
            shape: None,
            data: None,
        }
    }

    /// An intentionally absent optional slot.
    pub fn absent() -> Self {
        Self::named("")
    }

    pub fn is_absent(&self) -> bool {
        self.name.is_empty()
    }
}

/// One operator entry in the flat node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatNode {
    pub name: String,
    pub op_type: String,
    #[serde(default)]
    pub inputs: Vec<FlatValue>,
    #[serde(default)]
    pub outputs: Vec<FlatValue>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl FlatNode {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Display name for this entry. The flat format allows unnamed nodes;
    /// those get a stable name derived from the operator type and the
    /// entry's position in the node list.
    pub fn display_name(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("{}_{}", self.op_type, index)
        } else {
            self.name.clone()
        }
    }
}

/// The flat, name-referenced serialized form of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatGraph {
    pub name: String,
    pub opset: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc_string: String,
    pub producer: ProducerInfo,
    pub inputs: Vec<FlatTensor>,
    pub outputs: Vec<FlatTensor>,
    pub nodes: Vec<FlatNode>,
}

impl FlatGraph {
    /// Parse a flat graph from an in-memory JSON buffer.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Parse a flat graph from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load a flat graph from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_slice(&bytes)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Serialize to pretty-printed JSON via a writer.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Write the flat graph to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_vec()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{AttrValue, TensorValues};

    #[test]
    fn test_empty_object_parses() {
        let flat = FlatGraph::from_slice(b"{}").unwrap();
        assert!(flat.name.is_empty());
        assert_eq!(flat.opset, 0);
        assert!(flat.nodes.is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let mut node = FlatNode::new("relu_0", "Relu");
        node.inputs.push(FlatValue::named("x"));
        node.outputs.push(FlatValue::named("y"));
        node.attributes
            .push(Attribute::new("axis", AttrValue::Int(-1)));

        let flat = FlatGraph {
            name: "tiny".to_string(),
            opset: 17,
            doc_string: "a tiny model".to_string(),
            producer: ProducerInfo {
                producer_name: "janus".to_string(),
                producer_version: "0.1.0".to_string(),
                ir_version: 8,
                model_version: 1,
            },
            inputs: vec![FlatTensor::with_type(
                "x",
                DType::Float32,
                vec![Dim::Fixed(1), Dim::Sym("N".to_string())],
            )],
            outputs: vec![FlatTensor::new("y")],
            nodes: vec![node],
        };

        let bytes = flat.to_vec().unwrap();
        let back = FlatGraph::from_slice(&bytes).unwrap();
        assert_eq!(back, flat);
    }

    #[test]
    fn test_inline_data_round_trip() {
        let mut node = FlatNode::new("add_0", "Add");
        node.inputs.push(FlatValue::named("x"));
        node.inputs.push(FlatValue {
            name: "bias".to_string(),
            dtype: Some(DType::Float32),
            shape: Some(vec![Dim::Fixed(2)]),
            data: Some(TensorData::new(
                vec![2],
                TensorValues::Float32(vec![0.5, -0.5]),
            )),
        });
        node.outputs.push(FlatValue::named("y"));

        let flat = FlatGraph {
            nodes: vec![node],
            ..Default::default()
        };
        let back = FlatGraph::from_slice(&flat.to_vec().unwrap()).unwrap();
        assert_eq!(back.nodes[0].inputs[1].data, flat.nodes[0].inputs[1].data);
    }

    #[test]
    fn test_absent_slot() {
        let slot = FlatValue::absent();
        assert!(slot.is_absent());
        assert!(!FlatValue::named("x").is_absent());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let flat = FlatGraph {
            name: "saved".to_string(),
            opset: 13,
            ..Default::default()
        };
        flat.save(&path).unwrap();

        let back = FlatGraph::load(&path).unwrap();
        assert_eq!(back, flat);
    }
}

//! Typed attribute values and embedded tensor payloads.
//!
//! Attribute values form a closed tagged sum so every consumer can match
//! exhaustively. Tensor payloads keep their elements in the native numeric
//! type; a round trip through the flat format must not alter a single bit.

use serde::{Deserialize, Serialize};

use crate::dtype::DType;

/// Element storage for an embedded tensor, one variant per element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorValues {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Str(Vec<String>),
}

impl TensorValues {
    pub fn dtype(&self) -> DType {
        match self {
            TensorValues::Float32(_) => DType::Float32,
            TensorValues::Float64(_) => DType::Float64,
            TensorValues::Int32(_) => DType::Int32,
            TensorValues::Int64(_) => DType::Int64,
            TensorValues::Str(_) => DType::Str,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorValues::Float32(v) => v.len(),
            TensorValues::Float64(v) => v.len(),
            TensorValues::Int32(v) => v.len(),
            TensorValues::Int64(v) => v.len(),
            TensorValues::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An embedded tensor: a shape plus its elements in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    pub shape: Vec<u64>,
    pub values: TensorValues,
}

impl TensorData {
    pub fn new(shape: Vec<u64>, values: TensorValues) -> Self {
        Self { shape, values }
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Number of elements the shape declares (product of all dimensions).
    pub fn element_count(&self) -> u64 {
        self.shape.iter().product()
    }
}

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    Tensor(TensorData),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Variant name for diagnostics ("int", "float", "str", "tensor", "list").
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Str(_) => "str",
            AttrValue::Tensor(_) => "tensor",
            AttrValue::List(_) => "list",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorData> {
        match self {
            AttrValue::Tensor(v) => Some(v),
            _ => None,
        }
    }
}

/// A named attribute on an operator node. Attribute lists preserve
/// declaration order, which the flat format treats as significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttrValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Look up an attribute by name in an ordered attribute list.
pub fn find_attr<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a AttrValue> {
    attributes.iter().find(|a| a.name == name).map(|a| &a.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_dtype_and_count() {
        let t = TensorData::new(vec![2, 3], TensorValues::Float32(vec![0.0; 6]));
        assert_eq!(t.dtype(), DType::Float32);
        assert_eq!(t.element_count(), 6);
        assert_eq!(t.values.len(), 6);
    }

    #[test]
    fn test_scalar_tensor_element_count() {
        // Rank-0 tensors have an empty shape and exactly one element.
        let t = TensorData::new(vec![], TensorValues::Int64(vec![7]));
        assert_eq!(t.element_count(), 1);
    }

    #[test]
    fn test_find_attr() {
        let attrs = vec![
            Attribute::new("axis", AttrValue::Int(1)),
            Attribute::new("mode", AttrValue::Str("constant".to_string())),
        ];
        assert_eq!(find_attr(&attrs, "axis").and_then(AttrValue::as_int), Some(1));
        assert_eq!(
            find_attr(&attrs, "mode").and_then(AttrValue::as_str),
            Some("constant")
        );
        assert!(find_attr(&attrs, "missing").is_none());
    }

    #[test]
    fn test_attr_value_kind_names() {
        assert_eq!(AttrValue::Int(0).kind_name(), "int");
        assert_eq!(AttrValue::List(vec![]).kind_name(), "list");
    }

    #[test]
    fn test_float_values_survive_json() {
        let t = TensorData::new(
            vec![3],
            TensorValues::Float32(vec![0.1, -2.5e-8, 3.4e38]),
        );
        let json = serde_json::to_string(&t).unwrap();
        let back: TensorData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}

//! Built-in schemas for the common ONNX operator set.
//!
//! The table drives two checks: import-time attribute kind warnings and
//! export-time required-input validation. It is deliberately permissive;
//! operators not listed here (custom domains, rarely used ops) pass through
//! with no checks at all, since an editor must load arbitrary models.

use crate::value::AttrValue;

/// Expected value kind of an operator attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Int,
    Float,
    Str,
    Tensor,
    Ints,
    Floats,
    Strs,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::Int => "int",
            AttrKind::Float => "float",
            AttrKind::Str => "str",
            AttrKind::Tensor => "tensor",
            AttrKind::Ints => "ints",
            AttrKind::Floats => "floats",
            AttrKind::Strs => "strs",
        }
    }

    /// Whether a concrete attribute value has this kind. List kinds accept
    /// the empty list, since the element type is then unobservable.
    pub fn matches(&self, value: &AttrValue) -> bool {
        match (self, value) {
            (AttrKind::Int, AttrValue::Int(_)) => true,
            (AttrKind::Float, AttrValue::Float(_)) => true,
            (AttrKind::Str, AttrValue::Str(_)) => true,
            (AttrKind::Tensor, AttrValue::Tensor(_)) => true,
            (AttrKind::Ints, AttrValue::List(items)) => {
                items.iter().all(|v| matches!(v, AttrValue::Int(_)))
            }
            (AttrKind::Floats, AttrValue::List(items)) => {
                items.iter().all(|v| matches!(v, AttrValue::Float(_)))
            }
            (AttrKind::Strs, AttrValue::List(items)) => {
                items.iter().all(|v| matches!(v, AttrValue::Str(_)))
            }
            _ => false,
        }
    }
}

/// Declared attribute of a built-in operator.
#[derive(Debug, Clone, Copy)]
pub struct AttrSchema {
    pub name: &'static str,
    pub kind: AttrKind,
    pub required: bool,
}

/// Port and attribute contract of a built-in operator.
#[derive(Debug, Clone, Copy)]
pub struct OpSchema {
    pub op_type: &'static str,
    /// Opset version this operator signature first appeared in.
    pub since_opset: i64,
    pub min_inputs: usize,
    pub max_inputs: usize,
    /// Minimum number of declared outputs.
    pub outputs: usize,
    pub attrs: &'static [AttrSchema],
}

impl OpSchema {
    /// Look up a declared attribute by name.
    pub fn attr(&self, name: &str) -> Option<&'static AttrSchema> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

/// Look up the built-in schema for an operator type, if one exists.
pub fn schema_for(op_type: &str) -> Option<&'static OpSchema> {
    SCHEMAS.iter().find(|s| s.op_type == op_type)
}

/// All built-in operator schemas, in the order editors should list them.
pub fn all_schemas() -> &'static [OpSchema] {
    SCHEMAS
}

const fn attr(name: &'static str, kind: AttrKind, required: bool) -> AttrSchema {
    AttrSchema {
        name,
        kind,
        required,
    }
}

const fn op(
    op_type: &'static str,
    since_opset: i64,
    min_inputs: usize,
    max_inputs: usize,
    outputs: usize,
    attrs: &'static [AttrSchema],
) -> OpSchema {
    OpSchema {
        op_type,
        since_opset,
        min_inputs,
        max_inputs,
        outputs,
        attrs,
    }
}

const VARIADIC: usize = usize::MAX;

static SCHEMAS: &[OpSchema] = &[
    op("Add", 7, 2, 2, 1, &[]),
    op("Mul", 7, 2, 2, 1, &[]),
    op(
        "Conv",
        1,
        2,
        3,
        1,
        &[
            attr("auto_pad", AttrKind::Str, false),
            attr("dilations", AttrKind::Ints, false),
            attr("group", AttrKind::Int, false),
            attr("kernel_shape", AttrKind::Ints, false),
            attr("pads", AttrKind::Ints, false),
            attr("strides", AttrKind::Ints, false),
        ],
    ),
    op(
        "Gemm",
        7,
        2,
        3,
        1,
        &[
            attr("alpha", AttrKind::Float, false),
            attr("beta", AttrKind::Float, false),
            attr("transA", AttrKind::Int, false),
            attr("transB", AttrKind::Int, false),
        ],
    ),
    op("MatMul", 1, 2, 2, 1, &[]),
    op("Relu", 6, 1, 1, 1, &[]),
    op("Sigmoid", 6, 1, 1, 1, &[]),
    op("Softmax", 13, 1, 1, 1, &[attr("axis", AttrKind::Int, false)]),
    op(
        "Concat",
        4,
        1,
        VARIADIC,
        1,
        &[attr("axis", AttrKind::Int, true)],
    ),
    op(
        "Reshape",
        5,
        2,
        2,
        1,
        &[attr("allowzero", AttrKind::Int, false)],
    ),
    op(
        "Transpose",
        1,
        1,
        1,
        1,
        &[attr("perm", AttrKind::Ints, false)],
    ),
    op("Flatten", 1, 1, 1, 1, &[attr("axis", AttrKind::Int, false)]),
    op("Squeeze", 13, 1, 2, 1, &[]),
    op(
        "Unsqueeze",
        13,
        1,
        2,
        1,
        &[attr("axes", AttrKind::Ints, false)],
    ),
    op(
        "MaxPool",
        1,
        1,
        1,
        1,
        &[
            attr("auto_pad", AttrKind::Str, false),
            attr("ceil_mode", AttrKind::Int, false),
            attr("dilations", AttrKind::Ints, false),
            attr("kernel_shape", AttrKind::Ints, true),
            attr("pads", AttrKind::Ints, false),
            attr("strides", AttrKind::Ints, false),
        ],
    ),
    op(
        "AveragePool",
        1,
        1,
        1,
        1,
        &[
            attr("auto_pad", AttrKind::Str, false),
            attr("ceil_mode", AttrKind::Int, false),
            attr("count_include_pad", AttrKind::Int, false),
            attr("kernel_shape", AttrKind::Ints, true),
            attr("pads", AttrKind::Ints, false),
            attr("strides", AttrKind::Ints, false),
        ],
    ),
    op(
        "BatchNormalization",
        7,
        5,
        5,
        1,
        &[
            attr("epsilon", AttrKind::Float, false),
            attr("momentum", AttrKind::Float, false),
        ],
    ),
    op("Clip", 11, 1, 3, 1, &[]),
    op("Pad", 11, 2, 4, 1, &[attr("mode", AttrKind::Str, false)]),
    op(
        "Split",
        13,
        1,
        2,
        1,
        &[
            attr("axis", AttrKind::Int, false),
            attr("num_outputs", AttrKind::Int, false),
        ],
    ),
    op(
        "ReduceMean",
        1,
        1,
        2,
        1,
        &[
            attr("axes", AttrKind::Ints, false),
            attr("keepdims", AttrKind::Int, false),
        ],
    ),
    op(
        "Resize",
        10,
        1,
        4,
        1,
        &[
            attr("coordinate_transformation_mode", AttrKind::Str, false),
            attr("mode", AttrKind::Str, false),
            attr("nearest_mode", AttrKind::Str, false),
        ],
    ),
    // Constant-kind operators carry their value as an attribute and expose
    // zero input ports in the editor, so min_inputs is 0 here even where
    // the upstream operator definition takes an input.
    op(
        "Constant",
        1,
        0,
        0,
        1,
        &[attr("value", AttrKind::Tensor, true)],
    ),
    op(
        "ConstantOfShape",
        9,
        0,
        1,
        1,
        &[attr("value", AttrKind::Tensor, false)],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttrValue;

    #[test]
    fn test_lookup_known_and_unknown() {
        let conv = schema_for("Conv").unwrap();
        assert_eq!(conv.min_inputs, 2);
        assert_eq!(conv.max_inputs, 3);
        assert!(conv.attr("kernel_shape").is_some());
        assert!(schema_for("MyCustomOp").is_none());
    }

    #[test]
    fn test_table_has_no_duplicates() {
        for (i, schema) in all_schemas().iter().enumerate() {
            let first = all_schemas()
                .iter()
                .position(|s| s.op_type == schema.op_type);
            assert_eq!(first, Some(i), "duplicate entry for {}", schema.op_type);
        }
    }

    #[test]
    fn test_attr_kind_matches() {
        assert!(AttrKind::Int.matches(&AttrValue::Int(3)));
        assert!(!AttrKind::Int.matches(&AttrValue::Float(3.0)));
        assert!(AttrKind::Ints.matches(&AttrValue::List(vec![
            AttrValue::Int(1),
            AttrValue::Int(2)
        ])));
        assert!(!AttrKind::Ints.matches(&AttrValue::List(vec![
            AttrValue::Int(1),
            AttrValue::Str("x".to_string())
        ])));
        // Empty lists are accepted by every list kind.
        assert!(AttrKind::Floats.matches(&AttrValue::List(vec![])));
    }

    #[test]
    fn test_constant_takes_no_inputs() {
        let constant = schema_for("Constant").unwrap();
        assert_eq!(constant.min_inputs, 0);
        assert_eq!(constant.max_inputs, 0);
        assert!(constant.attr("value").unwrap().required);
    }
}

//! Internal graph to flat graph conversion.
//!
//! Export walks the derived edges to resolve every input port back to a
//! tensor name, emits operators in topological order, and re-wraps
//! constant-kind nodes into the embedded-value form the flat format
//! expects. The graph itself is never mutated and stays editable whatever
//! the outcome.

use rustc_hash::FxHashSet;

use crate::dtype::{DType, Dim, format_shape};
use crate::error::{Error, Result};
use crate::flat::{FlatGraph, FlatNode, FlatTensor, FlatValue, SiteRef, TensorIndex};
use crate::graph::types::{Graph, Node, NodeKind};
use crate::schema::schema_for;

/// Options controlling export behavior.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Keep shape diagnostics quiet. On by default; mid-edit graphs
    /// routinely carry locally inconsistent shapes.
    pub non_verbose: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { non_verbose: true }
    }
}

impl ExportOptions {
    /// Log every shape diagnostic instead of a single debug summary.
    pub fn verbose() -> Self {
        Self { non_verbose: false }
    }
}

impl Graph {
    /// Convert back into the flat, name-referenced form.
    ///
    /// Fails if the derived edges contain a cycle, or if a known operator
    /// is missing a required input. Shape diagnostics never fail the
    /// export; they are logged and the flat graph is returned regardless.
    pub fn export(&self, options: &ExportOptions) -> Result<FlatGraph> {
        if let Some(nodes) = self.detect_cycles() {
            return Err(Error::CycleDetected { nodes });
        }

        let mut flat = FlatGraph {
            name: self.name().to_string(),
            opset: self.opset(),
            doc_string: self.doc_string().to_string(),
            producer: self.producer().clone(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            nodes: Vec::new(),
        };

        for node in self.inputs() {
            if let Some(slot) = node.outputs.first() {
                flat.inputs.push(FlatTensor {
                    name: slot.name.clone(),
                    dtype: slot.dtype,
                    shape: slot.shape.clone(),
                });
            }
        }
        for node in self.outputs() {
            if let Some(slot) = node.inputs.first() {
                flat.outputs.push(FlatTensor {
                    name: slot.name.clone(),
                    dtype: slot.dtype,
                    shape: slot.shape.clone(),
                });
            }
        }

        // The flat node list must be topologically sorted.
        for id in self.topological_order()? {
            let Some(node) = self.node(id) else { continue };
            if node.kind != NodeKind::Operator {
                continue;
            }
            flat.nodes.push(emit_operator(self, node)?);
        }

        let issues = diagnose_shapes(&flat);
        if !issues.is_empty() {
            if options.non_verbose {
                tracing::debug!("export produced {} shape diagnostics", issues.len());
            } else {
                for issue in &issues {
                    tracing::warn!("{}", issue);
                }
            }
        }

        tracing::debug!("exported '{}': {} nodes", flat.name, flat.nodes.len());
        Ok(flat)
    }
}

fn emit_operator(graph: &Graph, node: &Node) -> Result<FlatNode> {
    let op_type = node.op_type.clone().unwrap_or_default();
    let mut flat_node = FlatNode::new(node.name.as_str(), op_type);

    // Constant-kind nodes re-emit as zero-input entries; their value rides
    // in the attribute list.
    if !node.is_constant_kind() {
        for port in 0..node.inputs.len() {
            flat_node.inputs.push(resolve_input_port(graph, node, port));
        }
    }
    check_required_inputs(node, &flat_node.inputs)?;

    for slot in &node.outputs {
        flat_node.outputs.push(FlatValue {
            name: slot.name.clone(),
            dtype: slot.dtype,
            shape: slot.shape.clone(),
            data: slot.data.clone(),
        });
    }
    flat_node.attributes = node.attributes.clone();
    Ok(flat_node)
}

/// Resolve one input port to a flat tensor slot.
///
/// A connected port takes its name, dtype, and shape from the producing
/// node's output slot. A disconnected port re-emits what it recorded: an
/// absent marker, an inline initializer, or an unbound variable (name and
/// declared type, no value).
fn resolve_input_port(graph: &Graph, node: &Node, port: usize) -> FlatValue {
    if let Some((src, edge)) = graph.incoming_edge(node.id, port) {
        if let Some(slot) = graph.node(src).and_then(|n| n.outputs.get(edge.src_port)) {
            return FlatValue {
                name: slot.name.clone(),
                dtype: slot.dtype,
                shape: slot.shape.clone(),
                data: None,
            };
        }
        return FlatValue::named(edge.tensor);
    }

    let slot = &node.inputs[port];
    if slot.is_absent() {
        return FlatValue::absent();
    }
    if let Some(data) = &slot.data {
        return FlatValue {
            name: slot.name.clone(),
            dtype: slot.dtype.or(Some(data.dtype())),
            shape: slot
                .shape
                .clone()
                .or_else(|| Some(data.shape.iter().map(|&d| Dim::Fixed(d)).collect())),
            data: Some(data.clone()),
        };
    }
    FlatValue {
        name: slot.name.clone(),
        dtype: slot.dtype,
        shape: slot.shape.clone(),
        data: None,
    }
}

/// Ports below a known operator's required-input count must resolve to
/// an edge, a named ref, or inline data. Unknown operators pass.
fn check_required_inputs(node: &Node, resolved: &[FlatValue]) -> Result<()> {
    if node.is_constant_kind() {
        return Ok(());
    }
    let Some(schema) = node.op_type.as_deref().and_then(schema_for) else {
        return Ok(());
    };
    for port in 0..schema.min_inputs {
        let satisfied = resolved
            .get(port)
            .map(|value| !value.name.is_empty() || value.data.is_some())
            .unwrap_or(false);
        if !satisfied {
            return Err(Error::MissingRequiredInput {
                node: node.name.clone(),
                port,
            });
        }
    }
    Ok(())
}

/// A dtype or shape disagreement between a producer and one of its
/// consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeIssue {
    pub tensor: String,
    pub detail: String,
}

impl std::fmt::Display for ShapeIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tensor '{}': {}", self.tensor, self.detail)
    }
}

/// Best-effort shape diagnostics over a flat graph: re-index it and flag
/// dtype or shape disagreements between each tensor's producer and its
/// consumers. Advisory only; never a reason to reject a graph.
pub fn diagnose_shapes(flat: &FlatGraph) -> Vec<ShapeIssue> {
    let index = TensorIndex::build(flat);
    let mut issues = Vec::new();

    // Walk names in producer declaration order for stable output.
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut names: Vec<&str> = Vec::new();
    for input in &flat.inputs {
        if !input.name.is_empty() && seen.insert(&input.name) {
            names.push(&input.name);
        }
    }
    for node in &flat.nodes {
        for value in &node.outputs {
            if !value.name.is_empty() && seen.insert(&value.name) {
                names.push(&value.name);
            }
        }
    }

    for name in names {
        let Some(sites) = index.get(name) else { continue };
        if sites.producers.len() != 1 {
            continue;
        }
        let Some((p_dtype, p_shape)) = producer_decl(flat, sites.producers[0]) else {
            continue;
        };
        for consumer in &sites.consumers {
            let Some((c_dtype, c_shape)) = consumer_decl(flat, *consumer) else {
                continue;
            };
            if let (Some(p), Some(c)) = (p_dtype, c_dtype) {
                if p != c {
                    issues.push(ShapeIssue {
                        tensor: name.to_string(),
                        detail: format!(
                            "produced as {} but consumed by '{}' as {}",
                            p,
                            consumer.describe(flat),
                            c
                        ),
                    });
                }
            }
            if let (Some(p), Some(c)) = (p_shape, c_shape) {
                if !shapes_compatible(p, c) {
                    issues.push(ShapeIssue {
                        tensor: name.to_string(),
                        detail: format!(
                            "produced with shape {} but consumed by '{}' with shape {}",
                            format_shape(p),
                            consumer.describe(flat),
                            format_shape(c)
                        ),
                    });
                }
            }
        }
    }
    issues
}

/// Rank must agree and fixed dimensions must be equal; a symbolic
/// dimension on either side matches anything.
fn shapes_compatible(produced: &[Dim], consumed: &[Dim]) -> bool {
    produced.len() == consumed.len()
        && produced.iter().zip(consumed).all(|(p, c)| match (p, c) {
            (Dim::Fixed(a), Dim::Fixed(b)) => a == b,
            _ => true,
        })
}

fn producer_decl(flat: &FlatGraph, site: SiteRef) -> Option<(Option<DType>, Option<&[Dim]>)> {
    match site {
        SiteRef::GraphInput { index } => flat
            .inputs
            .get(index)
            .map(|t| (t.dtype, t.shape.as_deref())),
        SiteRef::Node { node, port } => flat
            .nodes
            .get(node)
            .and_then(|n| n.outputs.get(port))
            .map(|v| (v.dtype, v.shape.as_deref())),
        SiteRef::GraphOutput { .. } => None,
    }
}

fn consumer_decl(flat: &FlatGraph, site: SiteRef) -> Option<(Option<DType>, Option<&[Dim]>)> {
    match site {
        SiteRef::GraphOutput { index } => flat
            .outputs
            .get(index)
            .map(|t| (t.dtype, t.shape.as_deref())),
        SiteRef::Node { node, port } => flat
            .nodes
            .get(node)
            .and_then(|n| n.inputs.get(port))
            .map(|v| (v.dtype, v.shape.as_deref())),
        SiteRef::GraphInput { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{TensorOrigin, TensorRef};
    use crate::value::{AttrValue, Attribute, TensorData, TensorValues};

    fn flat_node(name: &str, op_type: &str, inputs: &[&str], outputs: &[&str]) -> FlatNode {
        let mut node = FlatNode::new(name, op_type);
        for input in inputs {
            node.inputs.push(FlatValue::named(*input));
        }
        for output in outputs {
            node.outputs.push(FlatValue::named(*output));
        }
        node
    }

    fn chain_graph() -> FlatGraph {
        FlatGraph {
            name: "chain".to_string(),
            opset: 17,
            inputs: vec![FlatTensor::with_type(
                "x",
                DType::Float32,
                vec![Dim::Fixed(1), Dim::Fixed(4)],
            )],
            outputs: vec![FlatTensor::new("y")],
            nodes: vec![flat_node("relu_0", "Relu", &["x"], &["y"])],
            ..Default::default()
        }
    }

    #[test]
    fn test_export_preserves_structure() {
        let graph = Graph::from_flat(&chain_graph()).unwrap();
        let flat = graph.export(&ExportOptions::default()).unwrap();

        assert_eq!(flat.name, "chain");
        assert_eq!(flat.opset, 17);
        assert_eq!(flat.inputs[0].name, "x");
        assert_eq!(flat.inputs[0].dtype, Some(DType::Float32));
        assert_eq!(flat.outputs[0].name, "y");
        assert_eq!(flat.nodes.len(), 1);
        assert_eq!(flat.nodes[0].op_type, "Relu");
        assert_eq!(flat.nodes[0].inputs[0].name, "x");
        assert_eq!(flat.nodes[0].outputs[0].name, "y");
    }

    #[test]
    fn test_export_orders_nodes_topologically() {
        // Declared consumer-first; export must re-order.
        let flat_in = FlatGraph {
            inputs: vec![FlatTensor::new("x")],
            outputs: vec![FlatTensor::new("y")],
            nodes: vec![
                flat_node("late", "Relu", &["t"], &["y"]),
                flat_node("early", "Relu", &["x"], &["t"]),
            ],
            ..Default::default()
        };
        let graph = Graph::from_flat(&flat_in).unwrap();
        let flat_out = graph.export(&ExportOptions::default()).unwrap();

        let names: Vec<&str> = flat_out.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn test_edge_resolution_uses_producer_declaration() {
        // The producer declares a dtype its consumer omits; the exported
        // consumer entry picks up the producer's declaration.
        let mut producer = flat_node("producer", "Relu", &["x"], &[]);
        producer.outputs.push(FlatValue {
            name: "t".to_string(),
            dtype: Some(DType::Int64),
            shape: Some(vec![Dim::Fixed(2)]),
            data: None,
        });
        let consumer = flat_node("consumer", "Relu", &["t"], &["y"]);

        let flat_in = FlatGraph {
            inputs: vec![FlatTensor::new("x")],
            outputs: vec![FlatTensor::new("y")],
            nodes: vec![producer, consumer],
            ..Default::default()
        };
        let graph = Graph::from_flat(&flat_in).unwrap();
        let flat_out = graph.export(&ExportOptions::default()).unwrap();

        let consumer_out = &flat_out.nodes[1];
        assert_eq!(consumer_out.inputs[0].name, "t");
        assert_eq!(consumer_out.inputs[0].dtype, Some(DType::Int64));
        assert_eq!(
            consumer_out.inputs[0].shape,
            Some(vec![Dim::Fixed(2)])
        );
    }

    #[test]
    fn test_export_cycle_fails_but_graph_stays_editable() {
        let flat_in = FlatGraph {
            nodes: vec![
                flat_node("a", "Relu", &["tb"], &["ta"]),
                flat_node("b", "Relu", &["ta"], &["tb"]),
            ],
            ..Default::default()
        };
        let mut graph = Graph::from_flat(&flat_in).unwrap();

        let err = graph.export(&ExportOptions::default()).unwrap_err();
        match err {
            Error::CycleDetected { nodes } => {
                assert_eq!(nodes, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected CycleDetected, got {}", other),
        }

        // Break the cycle and export again.
        let b = graph.nodes_by_name("b")[0].id;
        graph.disconnect(b, 0).unwrap();
        assert!(graph.export(&ExportOptions::default()).is_ok());
    }

    #[test]
    fn test_disconnected_port_exports_as_unbound() {
        let graph_in = Graph::from_flat(&chain_graph()).unwrap();
        let mut graph = graph_in;
        let relu = graph.nodes_by_name("relu_0")[0].id;
        graph.disconnect(relu, 0).unwrap();

        let flat = graph.export(&ExportOptions::default()).unwrap();
        let entry = &flat.nodes[0].inputs[0];
        assert_eq!(entry.name, "x");
        assert!(entry.data.is_none());
    }

    #[test]
    fn test_missing_required_input() {
        let mut graph = Graph::new();
        graph.add_operator("conv_0", "Conv");

        let err = graph.export(&ExportOptions::default()).unwrap_err();
        match err {
            Error::MissingRequiredInput { node, port } => {
                assert_eq!(node, "conv_0");
                assert_eq!(port, 0);
            }
            other => panic!("expected MissingRequiredInput, got {}", other),
        }
    }

    #[test]
    fn test_unknown_operator_exports_bare() {
        let mut graph = Graph::new();
        let id = graph.add_operator("mystery", "FrobnicateV2");
        graph
            .add_output_port(id, TensorRef::new("out", TensorOrigin::Unbound))
            .unwrap();

        let flat = graph.export(&ExportOptions::default()).unwrap();
        assert_eq!(flat.nodes[0].op_type, "FrobnicateV2");
        assert!(flat.nodes[0].inputs.is_empty());
    }

    #[test]
    fn test_constant_rewrapped_as_zero_input_entry() {
        let tensor = TensorData::new(vec![2], TensorValues::Float32(vec![1.5, 2.5]));
        let mut constant = FlatNode::new("weight", "Constant");
        constant.outputs.push(FlatValue::named("w"));
        constant
            .attributes
            .push(Attribute::new("value", AttrValue::Tensor(tensor.clone())));

        let flat_in = FlatGraph {
            inputs: vec![FlatTensor::new("x")],
            outputs: vec![FlatTensor::new("y")],
            nodes: vec![constant, flat_node("add_0", "Add", &["x", "w"], &["y"])],
            ..Default::default()
        };
        let graph = Graph::from_flat(&flat_in).unwrap();
        let flat_out = graph.export(&ExportOptions::default()).unwrap();

        let weight = flat_out
            .nodes
            .iter()
            .find(|n| n.name == "weight")
            .unwrap();
        assert!(weight.inputs.is_empty());
        assert_eq!(
            weight.attributes[0].value,
            AttrValue::Tensor(tensor)
        );
    }

    #[test]
    fn test_inline_initializer_round_trips() {
        let mut add = FlatNode::new("add_0", "Add");
        add.inputs.push(FlatValue::named("x"));
        add.inputs.push(FlatValue {
            name: "bias".to_string(),
            dtype: None,
            shape: None,
            data: Some(TensorData::new(vec![1], TensorValues::Float32(vec![0.5]))),
        });
        add.outputs.push(FlatValue::named("y"));

        let flat_in = FlatGraph {
            inputs: vec![FlatTensor::new("x")],
            outputs: vec![FlatTensor::new("y")],
            nodes: vec![add],
            ..Default::default()
        };
        let graph = Graph::from_flat(&flat_in).unwrap();
        let flat_out = graph.export(&ExportOptions::default()).unwrap();

        let bias = &flat_out.nodes[0].inputs[1];
        assert_eq!(bias.name, "bias");
        assert_eq!(bias.dtype, Some(DType::Float32));
        assert_eq!(bias.shape, Some(vec![Dim::Fixed(1)]));
        assert!(bias.data.is_some());
    }

    #[test]
    fn test_absent_optional_survives_export() {
        let mut clip = FlatNode::new("clip_0", "Clip");
        clip.inputs.push(FlatValue::named("x"));
        clip.inputs.push(FlatValue::absent());
        clip.inputs.push(FlatValue::absent());
        clip.outputs.push(FlatValue::named("y"));

        let flat_in = FlatGraph {
            inputs: vec![FlatTensor::new("x")],
            outputs: vec![FlatTensor::new("y")],
            nodes: vec![clip],
            ..Default::default()
        };
        let graph = Graph::from_flat(&flat_in).unwrap();
        let flat_out = graph.export(&ExportOptions::default()).unwrap();

        assert_eq!(flat_out.nodes[0].inputs.len(), 3);
        assert!(flat_out.nodes[0].inputs[1].is_absent());
        assert!(flat_out.nodes[0].inputs[2].is_absent());
    }

    #[test]
    fn test_diagnose_shapes_flags_disagreement() {
        let mut producer = FlatNode::new("producer", "Relu");
        producer.inputs.push(FlatValue::named("x"));
        producer.outputs.push(FlatValue {
            name: "t".to_string(),
            dtype: Some(DType::Float32),
            shape: Some(vec![Dim::Fixed(1), Dim::Fixed(3)]),
            data: None,
        });
        let mut consumer = FlatNode::new("consumer", "Relu");
        consumer.inputs.push(FlatValue {
            name: "t".to_string(),
            dtype: Some(DType::Int64),
            shape: Some(vec![Dim::Fixed(3)]),
            data: None,
        });
        consumer.outputs.push(FlatValue::named("y"));

        let flat = FlatGraph {
            inputs: vec![FlatTensor::new("x")],
            outputs: vec![FlatTensor::new("y")],
            nodes: vec![producer, consumer],
            ..Default::default()
        };

        let issues = diagnose_shapes(&flat);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.tensor == "t"));
        assert!(issues[0].detail.contains("float32"));
        assert!(issues[1].detail.contains("[1, 3]"));
    }

    #[test]
    fn test_diagnose_shapes_quiet_on_agreement() {
        assert!(diagnose_shapes(&chain_graph()).is_empty());
    }

    #[test]
    fn test_symbolic_dim_matches_any_size() {
        let mut relu = flat_node("relu_0", "Relu", &[], &["y"]);
        relu.inputs.push(FlatValue {
            name: "x".to_string(),
            dtype: None,
            shape: Some(vec![Dim::Sym("batch".to_string()), Dim::Fixed(4)]),
            data: None,
        });

        let flat = FlatGraph {
            inputs: vec![FlatTensor::with_type(
                "x",
                DType::Float32,
                vec![Dim::Fixed(32), Dim::Fixed(4)],
            )],
            outputs: vec![FlatTensor::new("y")],
            nodes: vec![relu],
            ..Default::default()
        };
        assert!(diagnose_shapes(&flat).is_empty());

        assert!(!shapes_compatible(
            &[Dim::Fixed(1), Dim::Fixed(3)],
            &[Dim::Fixed(3)]
        ));
    }
}

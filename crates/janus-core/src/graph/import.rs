//! Flat graph to internal graph conversion.
//!
//! The flat format has no edges; every dependency is implicit in a shared
//! tensor name. Import reconstructs explicit edges through the tensor
//! index, handling the special cases exactly: graph-boundary names,
//! constant-kind operators, inline initializers, fan-out, and the
//! forbidden multi-producer fan-in.

use std::io::Read;
use std::path::Path;

use rustc_hash::FxHashSet;

use crate::error::{Error, ImportViolation, ImportWarning, Result};
use crate::flat::{FlatGraph, FlatNode, FlatValue, SiteRef, TensorIndex};
use crate::graph::types::{Graph, Node, NodeId, NodeKind, TensorOrigin, TensorRef};
use crate::schema::schema_for;
use crate::value::{AttrValue, Attribute, find_attr};

/// Import a flat graph from a JSON file.
pub fn import_file(path: impl AsRef<Path>) -> Result<Graph> {
    Graph::from_flat(&FlatGraph::load(path)?)
}

/// Import a flat graph from an in-memory buffer.
pub fn import_bytes(bytes: &[u8]) -> Result<Graph> {
    Graph::from_flat(&FlatGraph::from_slice(bytes)?)
}

/// Import a flat graph from a reader.
pub fn import_reader<R: Read>(reader: R) -> Result<Graph> {
    Graph::from_flat(&FlatGraph::from_reader(reader)?)
}

impl Graph {
    /// Convert a flat graph into an internal node/edge graph.
    ///
    /// Every structural violation is collected before failing, so one
    /// import attempt reports everything a user has to fix. Cycles are
    /// tolerated here; they are an export-time concern, since graphs are
    /// routinely invalid mid-edit.
    pub fn from_flat(flat: &FlatGraph) -> Result<Self> {
        Importer::new(flat).run()
    }
}

fn constant_kind(op_type: &str) -> bool {
    matches!(op_type, "Constant" | "ConstantOfShape")
}

fn tensor_ref(value: &FlatValue, origin: TensorOrigin) -> TensorRef {
    TensorRef {
        name: value.name.clone(),
        dtype: value.dtype,
        shape: value.shape.clone(),
        origin,
        data: value.data.clone(),
    }
}

/// How a consumed tensor name resolves against the index.
enum Resolution {
    /// Exactly one producer site.
    Unique(SiteRef),
    /// More than one producer; reported once per name by the fan-in scan.
    Ambiguous,
    /// No producer site at all.
    Missing,
}

struct Importer<'a> {
    flat: &'a FlatGraph,
    index: TensorIndex,
    graph: Graph,
    /// Internal ids of declared inputs, outputs, and node entries,
    /// by declaration position.
    input_ids: Vec<NodeId>,
    output_ids: Vec<NodeId>,
    op_ids: Vec<NodeId>,
    violations: Vec<ImportViolation>,
}

impl<'a> Importer<'a> {
    fn new(flat: &'a FlatGraph) -> Self {
        Self {
            flat,
            index: TensorIndex::build(flat),
            graph: Graph::new(),
            input_ids: Vec::new(),
            output_ids: Vec::new(),
            op_ids: Vec::new(),
            violations: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Graph> {
        self.graph.set_name(self.flat.name.as_str());
        self.graph.set_opset(self.flat.opset);
        self.graph.set_doc_string(self.flat.doc_string.as_str());
        self.graph.set_producer(self.flat.producer.clone());

        self.create_boundary_nodes();
        self.create_operator_nodes();
        self.check_fan_in();
        self.synthesize_edges();

        if !self.violations.is_empty() {
            return Err(Error::Import {
                violations: self.violations,
            });
        }

        tracing::debug!(
            "imported '{}': {} nodes, {} edges",
            self.graph.name(),
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Ok(self.graph)
    }

    fn create_boundary_nodes(&mut self) {
        let flat = self.flat;
        for input in &flat.inputs {
            let id = self
                .graph
                .add_input(input.name.as_str(), input.dtype, input.shape.clone());
            self.input_ids.push(id);
        }
        for output in &flat.outputs {
            let id = self
                .graph
                .add_output(output.name.as_str(), output.dtype, output.shape.clone());
            self.output_ids.push(id);
        }
    }

    fn create_operator_nodes(&mut self) {
        let flat = self.flat;
        for (index, flat_node) in flat.nodes.iter().enumerate() {
            let id = self.create_operator(index, flat_node);
            self.op_ids.push(id);
        }
    }

    fn create_operator(&mut self, index: usize, flat_node: &FlatNode) -> NodeId {
        let is_constant = constant_kind(&flat_node.op_type);
        let mut node = Node::new(
            NodeKind::Operator,
            flat_node.display_name(index),
            Some(flat_node.op_type.clone()),
        );

        // Constant-kind nodes expose zero input ports; their declared
        // inputs (if any) are dropped, and their value lives in the
        // attribute list.
        if !is_constant {
            for value in &flat_node.inputs {
                node.inputs.push(tensor_ref(value, TensorOrigin::Unbound));
            }
        }
        for value in &flat_node.outputs {
            let origin = if is_constant {
                TensorOrigin::Constant
            } else {
                TensorOrigin::Unbound
            };
            let mut slot = tensor_ref(value, origin);
            if is_constant {
                // The value lands in the attribute list, not on the slot.
                slot.data = None;
            }
            node.outputs.push(slot);
        }

        node.attributes = flat_node.attributes.clone();
        if is_constant && find_attr(&node.attributes, "value").is_none() {
            // Some writers inline the constant on the output slot instead
            // of the value attribute; hoist it so both spellings land in
            // the same place.
            if let Some(data) = flat_node.outputs.first().and_then(|v| v.data.clone()) {
                node.attributes
                    .push(Attribute::new("value", AttrValue::Tensor(data)));
            }
        }
        node.warnings = check_attributes(flat_node, &node.attributes);

        self.graph.insert_node(node)
    }

    /// Report every tensor name claimed by more than one producer, in
    /// producer declaration order, once per name.
    fn check_fan_in(&mut self) {
        let flat = self.flat;
        let mut seen: FxHashSet<&str> = FxHashSet::default();

        let mut check = |importer: &mut Self, name: &'a str| {
            if name.is_empty() || !seen.insert(name) {
                return;
            }
            if let Some(sites) = importer.index.get(name) {
                if sites.producers.len() > 1 {
                    let producers = sites
                        .producers
                        .iter()
                        .map(|site| site.describe(flat))
                        .collect();
                    importer.violations.push(ImportViolation::AmbiguousProducer {
                        tensor: name.to_string(),
                        producers,
                    });
                }
            }
        };

        for input in &flat.inputs {
            check(self, &input.name);
        }
        for flat_node in &flat.nodes {
            for value in &flat_node.outputs {
                check(self, &value.name);
            }
        }
    }

    /// Create one edge per (producer, consumer) pair. Fan-out is always
    /// valid; a missing producer is a violation unless the port carries
    /// inline data or the slot is intentionally absent.
    fn synthesize_edges(&mut self) {
        let flat = self.flat;

        for (position, output) in flat.outputs.iter().enumerate() {
            if output.name.is_empty() {
                continue;
            }
            match self.resolve(&output.name) {
                Resolution::Unique(site) => {
                    self.wire(site, self.output_ids[position], 0, &output.name);
                }
                Resolution::Ambiguous => {}
                Resolution::Missing => {
                    self.violations.push(ImportViolation::DanglingReference {
                        tensor: output.name.clone(),
                        consumer: "graph output declaration".to_string(),
                    });
                }
            }
        }

        for (position, flat_node) in flat.nodes.iter().enumerate() {
            if constant_kind(&flat_node.op_type) {
                continue;
            }
            let consumer_id = self.op_ids[position];
            for (port, value) in flat_node.inputs.iter().enumerate() {
                if value.name.is_empty() {
                    continue;
                }
                match self.resolve(&value.name) {
                    Resolution::Unique(site) => {
                        let origin = self.producer_origin(site);
                        self.wire(site, consumer_id, port, &value.name);
                        self.set_input_origin(consumer_id, port, origin);
                    }
                    Resolution::Ambiguous => {}
                    Resolution::Missing if value.data.is_some() => {
                        // Inline initializer: the port is constant-fed and
                        // needs no producing node.
                        self.set_input_origin(consumer_id, port, TensorOrigin::Constant);
                    }
                    Resolution::Missing => {
                        self.violations.push(ImportViolation::DanglingReference {
                            tensor: value.name.clone(),
                            consumer: flat_node.display_name(position),
                        });
                    }
                }
            }
        }
    }

    fn resolve(&self, name: &str) -> Resolution {
        match self.index.get(name) {
            Some(sites) if sites.producers.len() == 1 => Resolution::Unique(sites.producers[0]),
            Some(sites) if !sites.producers.is_empty() => Resolution::Ambiguous,
            _ => Resolution::Missing,
        }
    }

    fn producer_endpoint(&self, site: SiteRef) -> Option<(NodeId, usize)> {
        match site {
            SiteRef::GraphInput { index } => Some((self.input_ids[index], 0)),
            SiteRef::Node { node, port } => Some((self.op_ids[node], port)),
            SiteRef::GraphOutput { .. } => None,
        }
    }

    fn producer_origin(&self, site: SiteRef) -> TensorOrigin {
        match site {
            SiteRef::GraphInput { .. } => TensorOrigin::Input,
            SiteRef::Node { node, .. } if constant_kind(&self.flat.nodes[node].op_type) => {
                TensorOrigin::Constant
            }
            _ => TensorOrigin::Unbound,
        }
    }

    fn wire(&mut self, producer: SiteRef, dst: NodeId, dst_port: usize, tensor: &str) {
        if let Some((src, src_port)) = self.producer_endpoint(producer) {
            self.graph
                .add_edge_internal(src, src_port, dst, dst_port, tensor.to_string());
        }
    }

    fn set_input_origin(&mut self, id: NodeId, port: usize, origin: TensorOrigin) {
        if let Some(node) = self.graph.node_mut(id) {
            if let Some(slot) = node.inputs.get_mut(port) {
                slot.origin = origin;
            }
        }
    }
}

/// Check an imported node's attributes against its operator schema.
/// Unknown operators and undeclared attributes pass without comment.
fn check_attributes(flat_node: &FlatNode, attributes: &[Attribute]) -> Vec<ImportWarning> {
    let Some(schema) = schema_for(&flat_node.op_type) else {
        return Vec::new();
    };

    let mut warnings = Vec::new();
    for attribute in attributes {
        if let Some(decl) = schema.attr(&attribute.name) {
            if !decl.kind.matches(&attribute.value) {
                warnings.push(ImportWarning::AttributeTypeMismatch {
                    attribute: attribute.name.clone(),
                    expected: decl.kind.as_str().to_string(),
                    found: attribute.value.kind_name().to_string(),
                });
            }
        }
    }
    warnings
}

//! Types for the internal node/edge graph.
//!
//! Nodes live in an id-keyed arena; adjacency lives in a petgraph
//! `StableDiGraph` so removals never shift the indices of surviving nodes.
//! All mutation goes through `Graph` methods, and every successful mutation
//! bumps the revision counter callers use to detect stale snapshots.

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use rustc_hash::FxHashMap;

use crate::dtype::{DType, Dim};
use crate::error::{Error, ImportWarning, Result};
use crate::flat::ProducerInfo;
use crate::value::{AttrValue, Attribute, TensorData, find_attr};

/// Opset version assigned to newly created graphs.
pub const DEFAULT_OPSET: i64 = 17;

/// Unique identifier for a node within a graph.
///
/// Ids are stable for the life of the graph: layout recomputation, renames,
/// and other non-structural edits never change them, and removing a node
/// never renumbers the others.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// Kind of node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Declared graph input boundary.
    Input,
    /// Declared graph output boundary.
    Output,
    /// An operator from the flat node list.
    Operator,
}

/// Where a tensor reference was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorOrigin {
    /// A declared graph input.
    Input,
    /// A declared graph output.
    Output,
    /// A constant value (Constant-kind node output or inline initializer).
    Constant,
    /// A plain variable tensor, bound only by whatever edge feeds it.
    #[default]
    Unbound,
}

/// A named tensor slot on a node. Name `""` denotes an intentionally
/// absent optional tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorRef {
    pub name: String,
    pub dtype: Option<DType>,
    pub shape: Option<Vec<Dim>>,
    pub origin: TensorOrigin,
    /// Inline initializer carried by this slot, if any.
    pub data: Option<TensorData>,
}

impl TensorRef {
    pub fn new(name: impl Into<String>, origin: TensorOrigin) -> Self {
        Self {
            name: name.into(),
            dtype: None,
            shape: None,
            origin,
            data: None,
        }
    }

    /// An intentionally absent optional tensor.
    pub fn absent() -> Self {
        Self::new("", TensorOrigin::Unbound)
    }

    pub fn is_absent(&self) -> bool {
        self.name.is_empty()
    }
}

/// A node in the internal graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique identifier, assigned by the graph.
    pub id: NodeId,
    pub kind: NodeKind,
    /// Display name. Renaming never changes the id.
    pub name: String,
    /// Operator type, present only on Operator nodes.
    pub op_type: Option<String>,
    /// Ordered input slots.
    pub inputs: Vec<TensorRef>,
    /// Ordered output slots. Output order is semantic and must survive
    /// conversion unchanged.
    pub outputs: Vec<TensorRef>,
    /// Ordered attribute list.
    pub attributes: Vec<Attribute>,
    /// Non-fatal issues recorded when this node was imported.
    pub warnings: Vec<ImportWarning>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, name: String, op_type: Option<String>) -> Self {
        Self {
            id: NodeId::new(0), // assigned on insert
            kind,
            name,
            op_type,
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Whether this node embeds its produced value as an attribute and
    /// exposes zero input ports (Constant / ConstantOfShape).
    pub fn is_constant_kind(&self) -> bool {
        matches!(
            self.op_type.as_deref(),
            Some("Constant" | "ConstantOfShape")
        )
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        find_attr(&self.attributes, name)
    }
}

/// A derived dependency edge. Never persisted in the flat format; the
/// importer reconstructs edges from shared tensor names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeInfo {
    /// Tensor name the edge carries.
    pub tensor: String,
    /// Output port on the producing node.
    pub src_port: usize,
    /// Input port on the consuming node.
    pub dst_port: usize,
}

/// The internal node/edge graph used for interactive editing.
pub struct Graph {
    name: String,
    opset: i64,
    doc_string: String,
    producer: ProducerInfo,
    /// Node arena, keyed by stable id.
    nodes: FxHashMap<NodeId, Node>,
    /// Adjacency: edges go from producer to consumer.
    topology: StableDiGraph<NodeId, EdgeInfo>,
    /// Node id to petgraph index mapping.
    node_indices: FxHashMap<NodeId, NodeIndex>,
    /// Next node id to assign.
    next_id: usize,
    /// Bumped on every successful mutation; callers compare revisions to
    /// detect that a snapshot went stale.
    revision: u64,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            name: "graph".to_string(),
            opset: DEFAULT_OPSET,
            doc_string: String::new(),
            producer: ProducerInfo::default(),
            nodes: FxHashMap::default(),
            topology: StableDiGraph::new(),
            node_indices: FxHashMap::default(),
            next_id: 0,
            revision: 0,
        }
    }

    // ---- metadata ----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.revision += 1;
    }

    pub fn opset(&self) -> i64 {
        self.opset
    }

    pub fn set_opset(&mut self, opset: i64) {
        self.opset = opset;
        self.revision += 1;
    }

    pub fn doc_string(&self) -> &str {
        &self.doc_string
    }

    pub fn set_doc_string(&mut self, doc_string: impl Into<String>) {
        self.doc_string = doc_string.into();
        self.revision += 1;
    }

    pub fn producer(&self) -> &ProducerInfo {
        &self.producer
    }

    pub fn set_producer(&mut self, producer: ProducerInfo) {
        self.producer = producer;
        self.revision += 1;
    }

    /// Current revision. Any successful mutation makes this larger.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ---- structural mutation ----

    /// Add an Input node. Its single output slot carries the declared name.
    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        dtype: Option<DType>,
        shape: Option<Vec<Dim>>,
    ) -> NodeId {
        let name = name.into();
        let mut node = Node::new(NodeKind::Input, name.clone(), None);
        node.outputs.push(TensorRef {
            name,
            dtype,
            shape,
            origin: TensorOrigin::Input,
            data: None,
        });
        self.insert_node(node)
    }

    /// Add an Output node. Its single input slot carries the declared name.
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        dtype: Option<DType>,
        shape: Option<Vec<Dim>>,
    ) -> NodeId {
        let name = name.into();
        let mut node = Node::new(NodeKind::Output, name.clone(), None);
        node.inputs.push(TensorRef {
            name,
            dtype,
            shape,
            origin: TensorOrigin::Output,
            data: None,
        });
        self.insert_node(node)
    }

    /// Add an Operator node with no ports. Callers shape it afterwards via
    /// `add_input_port` / `add_output_port`.
    pub fn add_operator(&mut self, name: impl Into<String>, op_type: impl Into<String>) -> NodeId {
        self.insert_node(Node::new(
            NodeKind::Operator,
            name.into(),
            Some(op_type.into()),
        ))
    }

    /// Remove a node and detach all of its incident edges.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let node = self.nodes.remove(&id).ok_or(Error::NodeNotFound(id))?;
        if let Some(idx) = self.node_indices.remove(&id) {
            self.topology.remove_node(idx);
        }
        self.revision += 1;
        Ok(node)
    }

    /// Wire `src`'s output port to `dst`'s input port.
    ///
    /// The edge carries the producer's output tensor name, and the
    /// consumer's input slot is renamed to match. An input port accepts at
    /// most one edge; connecting to an occupied port is an error.
    pub fn connect(
        &mut self,
        src: NodeId,
        src_port: usize,
        dst: NodeId,
        dst_port: usize,
    ) -> Result<()> {
        let src_node = self.nodes.get(&src).ok_or(Error::NodeNotFound(src))?;
        let dst_node = self.nodes.get(&dst).ok_or(Error::NodeNotFound(dst))?;

        if src_port >= src_node.outputs.len() {
            return Err(Error::InvalidOperation(format!(
                "node '{}' has no output port {}",
                src_node.name, src_port
            )));
        }
        if dst_port >= dst_node.inputs.len() {
            return Err(Error::InvalidOperation(format!(
                "node '{}' has no input port {}",
                dst_node.name, dst_port
            )));
        }
        if self.incoming_edge(dst, dst_port).is_some() {
            return Err(Error::InvalidOperation(format!(
                "input port {} of node '{}' is already connected",
                dst_port, dst_node.name
            )));
        }

        let tensor = src_node.outputs[src_port].name.clone();
        self.add_edge_internal(src, src_port, dst, dst_port, tensor.clone());
        if let Some(node) = self.nodes.get_mut(&dst) {
            node.inputs[dst_port].name = tensor;
        }
        self.revision += 1;
        Ok(())
    }

    /// Remove the edge feeding `dst`'s input port, if any.
    ///
    /// The input slot keeps its tensor name, so a disconnected port still
    /// exports as an unbound variable.
    pub fn disconnect(&mut self, dst: NodeId, dst_port: usize) -> Result<()> {
        let dst_node = self.nodes.get(&dst).ok_or(Error::NodeNotFound(dst))?;
        let dst_idx = self.node_indices[&dst];
        let edge = self
            .topology
            .edges_directed(dst_idx, Direction::Incoming)
            .find(|e| e.weight().dst_port == dst_port)
            .map(|e| e.id());

        match edge {
            Some(edge_id) => {
                self.topology.remove_edge(edge_id);
                self.revision += 1;
                Ok(())
            }
            None => Err(Error::InvalidOperation(format!(
                "input port {} of node '{}' is not connected",
                dst_port, dst_node.name
            ))),
        }
    }

    /// Rename a node's display name. The id is unaffected.
    pub fn set_display_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.name = name.into();
        self.revision += 1;
        Ok(())
    }

    /// Append an input slot to a node, returning the new port index.
    pub fn add_input_port(&mut self, id: NodeId, tensor: TensorRef) -> Result<usize> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.inputs.push(tensor);
        let port = node.inputs.len() - 1;
        self.revision += 1;
        Ok(port)
    }

    /// Append an output slot to a node, returning the new port index.
    pub fn add_output_port(&mut self, id: NodeId, tensor: TensorRef) -> Result<usize> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.outputs.push(tensor);
        let port = node.outputs.len() - 1;
        self.revision += 1;
        Ok(port)
    }

    /// Replace the tensor reference of an existing input port.
    pub fn set_input_ref(&mut self, id: NodeId, port: usize, tensor: TensorRef) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        if port >= node.inputs.len() {
            return Err(Error::InvalidOperation(format!(
                "node '{}' has no input port {}",
                node.name, port
            )));
        }
        node.inputs[port] = tensor;
        self.revision += 1;
        Ok(())
    }

    /// Replace the tensor reference of an existing output port.
    pub fn set_output_ref(&mut self, id: NodeId, port: usize, tensor: TensorRef) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        if port >= node.outputs.len() {
            return Err(Error::InvalidOperation(format!(
                "node '{}' has no output port {}",
                node.name, port
            )));
        }
        node.outputs[port] = tensor;
        self.revision += 1;
        Ok(())
    }

    /// Set or overwrite one attribute, preserving the position of an
    /// existing entry.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: AttrValue,
    ) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        let name = name.into();
        match node.attributes.iter().position(|a| a.name == name) {
            Some(i) => node.attributes[i].value = value,
            None => node.attributes.push(Attribute::new(name, value)),
        }
        self.revision += 1;
        Ok(())
    }

    /// Replace a node's whole attribute list.
    pub fn set_attributes(&mut self, id: NodeId, attributes: Vec<Attribute>) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.attributes = attributes;
        self.revision += 1;
        Ok(())
    }

    // ---- queries ----

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// All node ids in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_ids()
            .into_iter()
            .filter_map(move |id| self.nodes.get(&id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.topology.edge_count()
    }

    /// All nodes whose display name matches.
    pub fn nodes_by_name(&self, name: &str) -> Vec<&Node> {
        self.nodes().filter(|n| n.name == name).collect()
    }

    /// All Operator nodes of the given operator type.
    pub fn operators_by_type(&self, op_type: &str) -> Vec<&Node> {
        self.nodes()
            .filter(|n| n.op_type.as_deref() == Some(op_type))
            .collect()
    }

    /// All Input nodes, in ascending id order.
    pub fn inputs(&self) -> Vec<&Node> {
        self.nodes_of_kind(NodeKind::Input)
    }

    /// All Output nodes, in ascending id order.
    pub fn outputs(&self) -> Vec<&Node> {
        self.nodes_of_kind(NodeKind::Output)
    }

    /// All Operator nodes, in ascending id order.
    pub fn operators(&self) -> Vec<&Node> {
        self.nodes_of_kind(NodeKind::Operator)
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.nodes().filter(|n| n.kind == kind).collect()
    }

    // ---- edges ----

    pub(crate) fn add_edge_internal(
        &mut self,
        src: NodeId,
        src_port: usize,
        dst: NodeId,
        dst_port: usize,
        tensor: String,
    ) {
        let (src_idx, dst_idx) = (self.node_indices[&src], self.node_indices[&dst]);
        self.topology.add_edge(
            src_idx,
            dst_idx,
            EdgeInfo {
                tensor,
                src_port,
                dst_port,
            },
        );
    }

    /// The edge feeding a node's input port, as (producer id, edge info).
    pub fn incoming_edge(&self, dst: NodeId, dst_port: usize) -> Option<(NodeId, EdgeInfo)> {
        let idx = self.node_indices.get(&dst)?;
        self.topology
            .edges_directed(*idx, Direction::Incoming)
            .find(|e| e.weight().dst_port == dst_port)
            .map(|e| (self.topology[e.source()], e.weight().clone()))
    }

    /// All edges feeding a node, as (producer id, edge info) pairs.
    pub fn in_edges(&self, id: NodeId) -> Vec<(NodeId, EdgeInfo)> {
        match self.node_indices.get(&id) {
            Some(&idx) => self
                .topology
                .edges_directed(idx, Direction::Incoming)
                .map(|e| (self.topology[e.source()], e.weight().clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The derived edge list as (from, to) pairs, sorted for determinism.
    /// With `reverse` set, pairs are flipped to (to, from).
    pub fn dependency_edges(&self, reverse: bool) -> Vec<(NodeId, NodeId)> {
        let mut edges: Vec<(NodeId, NodeId)> = self
            .topology
            .edge_references()
            .map(|e| {
                let src = self.topology[e.source()];
                let dst = self.topology[e.target()];
                if reverse { (dst, src) } else { (src, dst) }
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    // ---- algorithms ----

    /// Find a cycle in the derived edges, returning the display names of
    /// the participating nodes (sorted). `None` means the graph is a DAG.
    pub fn detect_cycles(&self) -> Option<Vec<String>> {
        use petgraph::algo::kosaraju_scc;

        // kosaraju_scc reports self-loops as singleton components, so they
        // need a separate scan.
        for edge in self.topology.edge_references() {
            if edge.source() == edge.target() {
                let id = self.topology[edge.source()];
                return Some(vec![self.node_label(id)]);
            }
        }

        for scc in kosaraju_scc(&self.topology) {
            if scc.len() > 1 {
                let mut names: Vec<String> = scc
                    .iter()
                    .map(|&idx| self.node_label(self.topology[idx]))
                    .collect();
                names.sort();
                return Some(names);
            }
        }
        None
    }

    /// Node ids in topological order over the derived edges.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        use petgraph::algo::toposort;

        toposort(&self.topology, None)
            .map(|order| order.into_iter().map(|idx| self.topology[idx]).collect())
            .map_err(|cycle| {
                let id = self.topology[cycle.node_id()];
                Error::CycleDetected {
                    nodes: vec![self.node_label(id)],
                }
            })
    }

    fn node_label(&self, id: NodeId) -> String {
        self.nodes
            .get(&id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub(crate) fn insert_node(&mut self, mut node: Node) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        node.id = id;

        let idx = self.topology.add_node(id);
        self.node_indices.insert(id, idx);
        self.nodes.insert(id, node);
        self.revision += 1;
        id
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

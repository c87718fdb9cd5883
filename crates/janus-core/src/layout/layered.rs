//! Layered, Sugiyama-style placement with barycenter crossing reduction.
//!
//! Each weakly-connected component is layered by longest path from its
//! roots, ordered within layers by a bounded barycenter pass, then tiled
//! next to the previous component. Everything iterates in ascending
//! NodeId order, so a fixed graph always produces the same coordinates.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::{Graph, NodeId};
use crate::layout::types::{LayoutBackend, LayoutOptions, Orientation, Position};

/// The default backend: longest-path layering plus bounded barycenter
/// ordering.
#[derive(Debug, Clone, Default)]
pub struct LayeredBarycenter {
    pub options: LayoutOptions,
}

impl LayeredBarycenter {
    pub fn new(options: LayoutOptions) -> Self {
        Self { options }
    }

    /// Plain layered placement: layers keep declaration order, no
    /// barycenter passes.
    pub fn without_crossing_reduction() -> Self {
        Self {
            options: LayoutOptions {
                ordering_passes: 0,
                ..LayoutOptions::default()
            },
        }
    }
}

impl LayoutBackend for LayeredBarycenter {
    fn name(&self) -> &'static str {
        "layered-barycenter"
    }

    fn compute(&self, graph: &Graph) -> FxHashMap<NodeId, Position> {
        let mut positions = FxHashMap::default();
        if graph.is_empty() {
            return positions;
        }

        let mut offset = 0.0;
        for component in components(graph) {
            let layers = assign_layers(graph, &component);
            let mut ordered = order_by_layer(&component, &layers);
            reduce_crossings(graph, &mut ordered, self.options.ordering_passes);
            let width = place_component(&self.options, &ordered, offset, &mut positions);
            offset += width + self.options.component_margin;
        }

        center(&mut positions);
        positions
    }
}

impl Graph {
    /// Compute a position for every node with the default backend.
    pub fn auto_layout(&self) -> FxHashMap<NodeId, Position> {
        self.auto_layout_with(&LayeredBarycenter::default())
    }

    /// Compute a position for every node with an explicit backend.
    ///
    /// Layout never fails: cyclic or disconnected graphs degrade to a
    /// best-effort placement.
    pub fn auto_layout_with(&self, backend: &dyn LayoutBackend) -> FxHashMap<NodeId, Position> {
        tracing::debug!("computing layout with '{}'", backend.name());
        backend.compute(self)
    }
}

/// Weakly-connected components, each sorted ascending, in ascending
/// smallest-member order.
fn components(graph: &Graph) -> Vec<Vec<NodeId>> {
    let mut undirected: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    for (u, v) in graph.dependency_edges(false) {
        undirected.entry(u).or_default().push(v);
        undirected.entry(v).or_default().push(u);
    }

    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut components = Vec::new();
    for root in graph.node_ids() {
        if !seen.insert(root) {
            continue;
        }
        let mut members = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            members.push(id);
            if let Some(neighbors) = undirected.get(&id) {
                for &next in neighbors {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }
    components
}

/// Longest-path layering over one component, single Kahn pass.
///
/// Nodes the pass never reaches (cycles) stay at layer 0.
fn assign_layers(graph: &Graph, component: &[NodeId]) -> FxHashMap<NodeId, usize> {
    let members: FxHashSet<NodeId> = component.iter().copied().collect();
    let mut successors: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    let mut indegree: FxHashMap<NodeId, usize> =
        component.iter().map(|&id| (id, 0)).collect();
    for (u, v) in graph.dependency_edges(false) {
        if members.contains(&u) && members.contains(&v) {
            successors.entry(u).or_default().push(v);
            *indegree.entry(v).or_default() += 1;
        }
    }

    let mut layers: FxHashMap<NodeId, usize> = component.iter().map(|&id| (id, 0)).collect();
    let mut queue: VecDeque<NodeId> = component
        .iter()
        .copied()
        .filter(|id| indegree[id] == 0)
        .collect();
    while let Some(id) = queue.pop_front() {
        let layer = layers[&id];
        let Some(next) = successors.get(&id) else { continue };
        for &v in next {
            let entry = layers.entry(v).or_insert(0);
            *entry = (*entry).max(layer + 1);
            if let Some(remaining) = indegree.get_mut(&v) {
                *remaining -= 1;
                if *remaining == 0 {
                    queue.push_back(v);
                }
            }
        }
    }
    layers
}

fn order_by_layer(component: &[NodeId], layers: &FxHashMap<NodeId, usize>) -> Vec<Vec<NodeId>> {
    let depth = component
        .iter()
        .map(|id| layers[id])
        .max()
        .map_or(0, |d| d + 1);
    let mut ordered = vec![Vec::new(); depth];
    for &id in component {
        ordered[layers[&id]].push(id);
    }
    ordered
}

/// Forward-then-backward barycenter sweeps, up to `passes` iterations,
/// stopping early once an entire pass changes nothing.
fn reduce_crossings(graph: &Graph, ordered: &mut [Vec<NodeId>], passes: usize) {
    if ordered.len() < 2 || passes == 0 {
        return;
    }

    let mut predecessors: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    let mut successors: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    for (u, v) in graph.dependency_edges(false) {
        predecessors.entry(v).or_default().push(u);
        successors.entry(u).or_default().push(v);
    }

    for _ in 0..passes {
        let mut changed = false;
        for i in 1..ordered.len() {
            let (fixed, rest) = ordered.split_at_mut(i);
            changed |= reorder(&mut rest[0], &fixed[i - 1], &predecessors);
        }
        for i in (0..ordered.len() - 1).rev() {
            let (rest, fixed) = ordered.split_at_mut(i + 1);
            changed |= reorder(&mut rest[i], &fixed[0], &successors);
        }
        if !changed {
            break;
        }
    }
}

/// Reorder one layer by the mean position of each node's neighbors in the
/// reference layer. Nodes with no neighbors there keep their current
/// position as the key, so a stable sort leaves them in place.
fn reorder(
    layer: &mut Vec<NodeId>,
    reference: &[NodeId],
    neighbors: &FxHashMap<NodeId, Vec<NodeId>>,
) -> bool {
    let index: FxHashMap<NodeId, usize> = reference
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();

    let mut keyed: Vec<(f64, NodeId)> = layer
        .iter()
        .enumerate()
        .map(|(current, &id)| {
            let adjacent: Vec<usize> = neighbors
                .get(&id)
                .into_iter()
                .flatten()
                .filter_map(|n| index.get(n).copied())
                .collect();
            let key = if adjacent.is_empty() {
                current as f64
            } else {
                adjacent.iter().sum::<usize>() as f64 / adjacent.len() as f64
            };
            (key, id)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let reordered: Vec<NodeId> = keyed.into_iter().map(|(_, id)| id).collect();
    if reordered == *layer {
        false
    } else {
        *layer = reordered;
        true
    }
}

/// Place one component at the given cross-axis offset. Returns the
/// component's cross-axis extent.
fn place_component(
    options: &LayoutOptions,
    ordered: &[Vec<NodeId>],
    offset: f64,
    positions: &mut FxHashMap<NodeId, Position>,
) -> f64 {
    let mut width = 0.0_f64;
    for (layer, nodes) in ordered.iter().enumerate() {
        let along = layer as f64 * options.layer_spacing;
        for (ordinal, &id) in nodes.iter().enumerate() {
            let across = offset + ordinal as f64 * options.node_spacing;
            let position = match options.orientation {
                Orientation::Vertical => Position::new(across, along),
                Orientation::Horizontal => Position::new(along, across),
            };
            positions.insert(id, position);
        }
        width = width.max(nodes.len().saturating_sub(1) as f64 * options.node_spacing);
    }
    width
}

fn center(positions: &mut FxHashMap<NodeId, Position>) {
    if positions.is_empty() {
        return;
    }
    let n = positions.len() as f64;
    let (sum_x, sum_y) = positions
        .values()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (mean_x, mean_y) = (sum_x / n, sum_y / n);
    for position in positions.values_mut() {
        position.x -= mean_x;
        position.y -= mean_y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat::{FlatGraph, FlatNode, FlatTensor, FlatValue};
    use crate::graph::{TensorOrigin, TensorRef};

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

    fn link(graph: &mut Graph, src: NodeId, dst: NodeId) {
        let tensor = format!("{}_{}", src, dst);
        let src_port = graph
            .add_output_port(src, TensorRef::new(tensor, TensorOrigin::Unbound))
            .unwrap();
        let dst_port = graph
            .add_input_port(dst, TensorRef::new("", TensorOrigin::Unbound))
            .unwrap();
        graph.connect(src, src_port, dst, dst_port).unwrap();
    }

    fn diamond() -> Graph {
        // input -> b, input -> c, b -> d, c -> d, d -> output
        let flat = FlatGraph {
            inputs: vec![FlatTensor::new("a")],
            outputs: vec![FlatTensor::new("td")],
            nodes: vec![
                flat_node("b", "Relu", &["a"], &["tb"]),
                flat_node("c", "Relu", &["a"], &["tc"]),
                flat_node("d", "Add", &["tb", "tc"], &["td"]),
            ],
            ..Default::default()
        };
        Graph::from_flat(&flat).unwrap()
    }

    #[test]
    fn test_empty_graph_empty_map() {
        assert!(Graph::new().auto_layout().is_empty());
    }

    #[test]
    fn test_diamond_layers() {
        let graph = diamond();
        let positions = graph.auto_layout();
        assert_eq!(positions.len(), 5);

        let at = |name: &str| {
            let id = graph.nodes_by_name(name)[0].id;
            positions[&id]
        };
        let input = at("a");
        let b = at("b");
        let c = at("c");
        let d = at("d");
        let output = at("td");

        // One layer per rank, 120 apart.
        assert!(input.y < b.y);
        assert_eq!(b.y, c.y);
        assert!(c.y < d.y);
        assert!(d.y < output.y);
        assert_eq!(b.y - input.y, 120.0);
        assert_eq!(output.y - d.y, 120.0);

        // Siblings spread along x.
        assert_ne!(b.x, c.x);
        assert_eq!((b.x - c.x).abs(), 240.0);
    }

    #[test]
    fn test_layering_invariant() {
        let graph = diamond();
        let positions = graph.auto_layout();
        for (u, v) in graph.dependency_edges(false) {
            assert!(
                positions[&u].y < positions[&v].y,
                "edge {} -> {} violates layering",
                u,
                v
            );
        }
    }

    #[test]
    fn test_layout_is_idempotent() {
        let graph = diamond();
        assert_eq!(graph.auto_layout(), graph.auto_layout());
    }

    #[test]
    fn test_layout_is_centered() {
        let positions = diamond().auto_layout();
        let sum_x: f64 = positions.values().map(|p| p.x).sum();
        let sum_y: f64 = positions.values().map(|p| p.y).sum();
        assert!(sum_x.abs() < 1e-6);
        assert!(sum_y.abs() < 1e-6);
    }

    #[test]
    fn test_edgeless_nodes_share_a_layer() {
        let mut graph = Graph::new();
        let ids: Vec<NodeId> = (0..3)
            .map(|i| graph.add_operator(format!("n{i}"), "Relu"))
            .collect();

        let positions = graph.auto_layout();
        assert_eq!(positions[&ids[0]].y, positions[&ids[1]].y);
        assert_eq!(positions[&ids[1]].y, positions[&ids[2]].y);
        // Declaration order left to right, one component tile apart.
        assert_eq!(positions[&ids[1]].x - positions[&ids[0]].x, 240.0);
        assert_eq!(positions[&ids[2]].x - positions[&ids[1]].x, 240.0);
    }

    #[test]
    fn test_disconnected_components_tile_without_overlap() {
        let mut graph = Graph::new();
        let n: Vec<NodeId> = (0..5)
            .map(|i| graph.add_operator(format!("n{i}"), "Relu"))
            .collect();
        link(&mut graph, n[0], n[1]);
        link(&mut graph, n[2], n[3]);
        link(&mut graph, n[3], n[4]);

        let positions = graph.auto_layout();

        // Both chains are single columns; the second sits one margin over.
        assert_eq!(positions[&n[0]].x, positions[&n[1]].x);
        assert_eq!(positions[&n[2]].x, positions[&n[3]].x);
        assert_eq!(positions[&n[3]].x, positions[&n[4]].x);
        assert_eq!(positions[&n[2]].x - positions[&n[0]].x, 240.0);

        for (u, v) in graph.dependency_edges(false) {
            assert!(positions[&u].y < positions[&v].y);
        }
    }

    #[test]
    fn test_cycle_degrades_to_layer_zero() {
        let mut graph = Graph::new();
        let a = graph.add_operator("a", "Relu");
        let b = graph.add_operator("b", "Relu");
        link(&mut graph, a, b);
        link(&mut graph, b, a);

        let positions = graph.auto_layout();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[&a].y, positions[&b].y);
        assert_ne!(positions[&a].x, positions[&b].x);
    }

    #[test]
    fn test_barycenter_uncrosses_edges() {
        // r0 feeds both children, r1 feeds only c0; the barycenter pull
        // moves c1 (fed by the leftmost root alone) to the left.
        let mut graph = Graph::new();
        let r0 = graph.add_operator("r0", "Relu");
        let r1 = graph.add_operator("r1", "Relu");
        let c0 = graph.add_operator("c0", "Relu");
        let c1 = graph.add_operator("c1", "Relu");
        link(&mut graph, r0, c1);
        link(&mut graph, r1, c0);
        link(&mut graph, r0, c0);

        let plain = graph.auto_layout_with(&LayeredBarycenter::without_crossing_reduction());
        assert!(plain[&c0].x < plain[&c1].x);

        let reduced = graph.auto_layout();
        assert!(reduced[&c1].x < reduced[&c0].x);
    }

    #[test]
    fn test_horizontal_orientation_swaps_axes() {
        let mut graph = Graph::new();
        let a = graph.add_operator("a", "Relu");
        let b = graph.add_operator("b", "Relu");
        link(&mut graph, a, b);

        let backend = LayeredBarycenter::new(LayoutOptions {
            orientation: Orientation::Horizontal,
            ..LayoutOptions::default()
        });
        let positions = graph.auto_layout_with(&backend);
        assert_eq!(positions[&b].x - positions[&a].x, 120.0);
        assert_eq!(positions[&a].y, positions[&b].y);
    }
}

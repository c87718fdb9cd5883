//! Name-to-site index over a flat graph.
//!
//! The flat format carries no adjacency; every dependency is implicit in a
//! shared tensor name. The index records, for each name, every site that
//! produces it and every site that consumes it, in one pass. It makes no
//! validity judgements; the importer decides what counts as a violation.

use rustc_hash::FxHashMap;

use crate::flat::FlatGraph;

/// A site in a flat graph that produces or consumes a tensor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteRef {
    /// A declared graph input (implicit producer of its name).
    GraphInput { index: usize },
    /// A declared graph output (implicit consumer of its name).
    GraphOutput { index: usize },
    /// A port on an entry in the node list.
    Node { node: usize, port: usize },
}

impl SiteRef {
    /// User-facing label for this site, for violation messages.
    pub fn describe(&self, flat: &FlatGraph) -> String {
        match self {
            SiteRef::GraphInput { .. } => "graph input declaration".to_string(),
            SiteRef::GraphOutput { .. } => "graph output declaration".to_string(),
            SiteRef::Node { node, .. } => flat.nodes[*node].display_name(*node),
        }
    }
}

/// Producers and consumers recorded for one tensor name.
#[derive(Debug, Clone, Default)]
pub struct TensorSites {
    pub producers: Vec<SiteRef>,
    pub consumers: Vec<SiteRef>,
}

/// Index of every tensor name in a flat graph to the sites that touch it.
///
/// Empty names are never indexed; `""` marks an intentionally absent
/// optional slot, not a tensor.
#[derive(Debug, Default)]
pub struct TensorIndex {
    entries: FxHashMap<String, TensorSites>,
}

impl TensorIndex {
    /// Build the index in one pass over the declarations and node ports.
    pub fn build(flat: &FlatGraph) -> Self {
        let mut index = TensorIndex::default();

        for (i, input) in flat.inputs.iter().enumerate() {
            index.record_producer(&input.name, SiteRef::GraphInput { index: i });
        }
        for (i, output) in flat.outputs.iter().enumerate() {
            index.record_consumer(&output.name, SiteRef::GraphOutput { index: i });
        }
        for (n, node) in flat.nodes.iter().enumerate() {
            for (p, value) in node.inputs.iter().enumerate() {
                index.record_consumer(&value.name, SiteRef::Node { node: n, port: p });
            }
            for (p, value) in node.outputs.iter().enumerate() {
                index.record_producer(&value.name, SiteRef::Node { node: n, port: p });
            }
        }

        index
    }

    fn record_producer(&mut self, name: &str, site: SiteRef) {
        if name.is_empty() {
            return;
        }
        self.entries
            .entry(name.to_string())
            .or_default()
            .producers
            .push(site);
    }

    fn record_consumer(&mut self, name: &str, site: SiteRef) {
        if name.is_empty() {
            return;
        }
        self.entries
            .entry(name.to_string())
            .or_default()
            .consumers
            .push(site);
    }

    /// Sites recorded for a tensor name, if any.
    pub fn get(&self, name: &str) -> Option<&TensorSites> {
        self.entries.get(name)
    }

    /// Number of distinct tensor names seen.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Layout configuration and position types.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::graph::{Graph, NodeId};

/// A node's position in layout space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Which axis layers advance along.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    /// Layers flow top to bottom; inputs sit at the top.
    #[default]
    Vertical,
    /// Layers flow left to right; inputs sit at the left.
    Horizontal,
}

/// Configuration for the layered layout backend.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Axis layers advance along.
    pub orientation: Orientation,

    /// Distance between neighboring nodes within a layer.
    pub node_spacing: f64,

    /// Distance between consecutive layers.
    pub layer_spacing: f64,

    /// Gap between disconnected components along the in-layer axis.
    pub component_margin: f64,

    /// Barycenter ordering iteration budget. Zero skips crossing
    /// reduction entirely and keeps declaration order within each layer.
    pub ordering_passes: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Vertical,
            node_spacing: 240.0,
            layer_spacing: 120.0,
            component_margin: 240.0,
            ordering_passes: 4,
        }
    }
}

/// A pluggable layout strategy.
///
/// Backends are pure: they read the graph and return a coordinate per
/// node without touching the graph itself. Layout never fails; malformed
/// graphs degrade to a best-effort placement.
pub trait LayoutBackend {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Compute a position for every node in the graph.
    fn compute(&self, graph: &Graph) -> FxHashMap<NodeId, Position>;
}

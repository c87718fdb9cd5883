//! The flat, name-referenced graph format.
//!
//! This module provides:
//! - The serde model for the flat format (operator list + declarations)
//! - File and buffer I/O
//! - The tensor index used to reconstruct adjacency from shared names

mod index;
mod model;

pub use index::{SiteRef, TensorIndex, TensorSites};
pub use model::{FlatGraph, FlatNode, FlatTensor, FlatValue, ProducerInfo};

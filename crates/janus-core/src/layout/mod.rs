//! Automatic 2-D node placement.
//!
//! This module provides:
//! - The `LayoutBackend` trait for pluggable placement strategies
//! - The layered barycenter backend used by default
//! - Spacing and orientation configuration

mod layered;
mod types;

pub use layered::LayeredBarycenter;
pub use types::{LayoutBackend, LayoutOptions, Orientation, Position};

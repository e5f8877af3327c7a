//! Core data structures and traits for surfmerge
//!
//! This crate provides the fundamental types shared by the loading,
//! simplification and merge stages: points, the indexed triangle surface,
//! axis-aligned bounding boxes and the common error type.

pub mod point;
pub mod mesh;
pub mod traits;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};

/// Per-face label used to track provenance through simplification and merging
pub type Tag = i32;

/// Tag assigned to faces that carry no other label
pub const DEFAULT_TAG: Tag = 0;

// Type aliases for easier imports
pub type Point = Point3d;
pub type Mesh = TriangleMesh;

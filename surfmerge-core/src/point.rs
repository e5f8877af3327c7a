//! Point types and related functionality

use nalgebra::{Point3, Vector3};

/// A 3D point with double precision coordinates
pub type Point3d = Point3<f64>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// A triangle as three indices into a vertex array
pub type Face = [usize; 3];

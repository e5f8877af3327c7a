//! Bounding volumes and the traits that produce them

use crate::{mesh::TriangleMesh, point::*};
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box given by its min and max corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3d,
    pub max: Point3d,
}

impl Aabb {
    pub fn new(min: Point3d, max: Point3d) -> Self {
        Self { min, max }
    }

    /// Box containing every point, or `None` for an empty iterator
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3d>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut aabb = Self::new(first, first);
        for p in iter {
            aabb.grow(p);
        }
        Some(aabb)
    }

    /// Extend the box so it contains `p`
    pub fn grow(&mut self, p: &Point3d) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn extent(&self) -> Vector3d {
        self.max - self.min
    }

    /// Length of the box diagonal
    pub fn diagonal_length(&self) -> f64 {
        self.extent().norm()
    }
}

/// Trait for objects with a spatial extent
pub trait Bounded {
    /// Get the bounding box of the object, `None` if it has no vertices
    fn bounding_box(&self) -> Option<Aabb>;
}

impl Bounded for TriangleMesh {
    fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(&self.vertices)
    }
}

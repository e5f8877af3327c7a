//! Spatial index over a triangle surface
//!
//! An R*-tree of triangle envelopes answering closest-distance queries
//! against the surface as it was when the index was built.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use surfmerge_core::{Aabb, Bounded, Point3d, TriangleMesh, Vector3d};

#[derive(Debug, Clone)]
struct IndexedTriangle {
    corners: [Point3d; 3],
}

impl RTreeObject for IndexedTriangle {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        let [a, b, c] = &self.corners;
        let min = a.inf(b).inf(c);
        let max = a.sup(b).sup(c);
        AABB::from_corners([min.x, min.y, min.z], [max.x, max.y, max.z])
    }
}

impl PointDistance for IndexedTriangle {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let p = Point3d::new(point[0], point[1], point[2]);
        let [a, b, c] = &self.corners;
        (closest_point_on_triangle(&p, a, b, c) - p).norm_squared()
    }
}

/// Bounding-volume hierarchy over the faces of one surface
pub struct SurfaceIndex {
    tree: RTree<IndexedTriangle>,
    bbox: Option<Aabb>,
}

impl SurfaceIndex {
    pub fn build(mesh: &TriangleMesh) -> Self {
        let triangles = mesh
            .faces
            .iter()
            .map(|f| IndexedTriangle {
                corners: [mesh.vertices[f[0]], mesh.vertices[f[1]], mesh.vertices[f[2]]],
            })
            .collect();

        Self {
            tree: RTree::bulk_load(triangles),
            bbox: mesh.bounding_box(),
        }
    }

    /// Axis-aligned box of the indexed surface, `None` when it has no vertices
    pub fn bounding_box(&self) -> Option<Aabb> {
        self.bbox
    }

    /// Length of the bounding box diagonal, zero for an empty surface
    pub fn diagonal_length(&self) -> f64 {
        self.bbox.map_or(0.0, |b| b.diagonal_length())
    }

    /// Distance from `point` to the closest indexed triangle
    pub fn distance_to_surface(&self, point: &Point3d) -> Option<f64> {
        let query = [point.x, point.y, point.z];
        self.tree
            .nearest_neighbor(&query)
            .map(|t| t.distance_2(&query).sqrt())
    }

    /// Whether `point` lies within `eps` of the surface
    pub fn is_within(&self, point: &Point3d, eps: f64) -> bool {
        let query = [point.x, point.y, point.z];
        self.tree
            .locate_within_distance(query, eps * eps)
            .next()
            .is_some()
    }
}

/// Closest point to `p` on triangle `abc` (Ericson, Real-Time Collision Detection 5.1.5)
pub fn closest_point_on_triangle(p: &Point3d, a: &Point3d, b: &Point3d, c: &Point3d) -> Point3d {
    let ab: Vector3d = b - a;
    let ac: Vector3d = c - a;
    let ap: Vector3d = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    // Degenerate triangles land here with a zero denominator
    let denom = va + vb + vc;
    if denom.abs() <= f64::MIN_POSITIVE {
        return *a;
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}

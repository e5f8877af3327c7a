//! Envelope-bounded edge collapse simplification
//!
//! Iterative edge collapse over a half-edge structure, prioritized by
//! quadric error metrics (QEM). A collapse is accepted only when its quadric
//! cost stays below the squared simplification envelope, the new vertex
//! stays within that envelope of the original surface, and no edge it creates
//! grows past the split threshold of the target edge length. Face tags travel
//! with the faces that survive.

use crate::duplicates::{remove_duplicates, DEFAULT_MERGE_TOLERANCE_REL};
use crate::{MeshingParameters, Simplifier, SurfaceIndex};
use nalgebra::{Matrix4, Vector4};
use priority_queue::PriorityQueue;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use surfmerge_core::{Bounded, Point3d, Tag, TriangleMesh, Vector3d};
use tracing::debug;

const INVALID: usize = usize::MAX;

// ============================================================
// Half-Edge Data Structure
// ============================================================

#[derive(Debug, Clone)]
struct HalfEdge {
    target: usize,
    twin: usize,
    next: usize,
    prev: usize,
    face: usize,
}

/// Half-edge mesh for topology-aware edge collapse operations.
struct HalfEdgeMesh {
    half_edges: Vec<HalfEdge>,
    /// One outgoing half-edge per vertex (INVALID if removed)
    vertex_edge: Vec<usize>,
    /// One half-edge per face (INVALID if removed)
    face_edge: Vec<usize>,
    face_tags: Vec<Tag>,
    active_face_count: usize,
    positions: Vec<Point3d>,
    quadrics: Vec<Matrix4<f64>>,
    vertex_removed: Vec<bool>,
}

impl HalfEdgeMesh {
    fn from_triangle_mesh(mesh: &TriangleMesh) -> Self {
        let nv = mesh.vertices.len();
        let nf = mesh.faces.len();

        let mut half_edges = Vec::with_capacity(nf * 3);
        let mut vertex_edge = vec![INVALID; nv];
        let mut face_edge = Vec::with_capacity(nf);

        for (fi, face) in mesh.faces.iter().enumerate() {
            let base = fi * 3;
            for j in 0..3usize {
                half_edges.push(HalfEdge {
                    target: face[(j + 1) % 3],
                    twin: INVALID,
                    next: base + (j + 1) % 3,
                    prev: base + (j + 2) % 3,
                    face: fi,
                });
                if vertex_edge[face[j]] == INVALID {
                    vertex_edge[face[j]] = base + j;
                }
            }
            face_edge.push(base);
        }

        // Pair twins only across manifold edges; an undirected edge used by
        // more than two half-edges stays unpaired and reads as boundary.
        let mut edge_uses: HashMap<(usize, usize), Vec<usize>> = HashMap::with_capacity(nf * 3);
        for (he_idx, he) in half_edges.iter().enumerate() {
            let src = half_edges[he.prev].target;
            edge_uses
                .entry((src.min(he.target), src.max(he.target)))
                .or_default()
                .push(he_idx);
        }
        for uses in edge_uses.values() {
            if let [a, b] = uses[..] {
                let a_src = half_edges[half_edges[a].prev].target;
                if half_edges[b].target == a_src {
                    half_edges[a].twin = b;
                    half_edges[b].twin = a;
                }
            }
        }

        let mut hem = HalfEdgeMesh {
            half_edges,
            vertex_edge,
            face_edge,
            face_tags: mesh.face_tags(),
            active_face_count: nf,
            positions: mesh.vertices.clone(),
            quadrics: vec![Matrix4::zeros(); nv],
            vertex_removed: vec![false; nv],
        };
        hem.initialize_quadrics();
        hem
    }

    #[inline]
    fn source(&self, he: usize) -> usize {
        self.half_edges[self.half_edges[he].prev].target
    }

    fn face_vertices(&self, face: usize) -> [usize; 3] {
        let he0 = self.face_edge[face];
        let he1 = self.half_edges[he0].next;
        [self.source(he0), self.half_edges[he0].target, self.half_edges[he1].target]
    }

    fn compute_plane(v0: &Point3d, v1: &Point3d, v2: &Point3d) -> Vector4<f64> {
        let n = match (v1 - v0).cross(&(v2 - v0)).try_normalize(0.0) {
            Some(n) => n,
            None => return Vector4::zeros(),
        };
        let d = -n.dot(&v0.coords);
        Vector4::new(n.x, n.y, n.z, d)
    }

    fn plane_to_quadric(p: &Vector4<f64>) -> Matrix4<f64> {
        p * p.transpose()
    }

    fn initialize_quadrics(&mut self) {
        for fi in 0..self.face_edge.len() {
            if self.face_edge[fi] == INVALID {
                continue;
            }
            let [v0, v1, v2] = self.face_vertices(fi);
            let plane =
                Self::compute_plane(&self.positions[v0], &self.positions[v1], &self.positions[v2]);
            let q = Self::plane_to_quadric(&plane);
            self.quadrics[v0] += q;
            self.quadrics[v1] += q;
            self.quadrics[v2] += q;
        }
    }

    /// Get all outgoing half-edges from a vertex (handles boundary vertices).
    fn outgoing_half_edges(&self, v: usize) -> Vec<usize> {
        let start = self.vertex_edge[v];
        if start == INVALID {
            return vec![];
        }

        let mut result = Vec::new();
        let mut current = start;

        // Rotate counterclockwise: current.prev.twin
        loop {
            result.push(current);
            let prev = self.half_edges[current].prev;
            let twin = self.half_edges[prev].twin;
            if twin == INVALID {
                break;
            }
            current = twin;
            if current == start {
                return result;
            }
        }

        // Boundary: also rotate clockwise from start via twin.next
        let twin_of_start = self.half_edges[start].twin;
        if twin_of_start != INVALID {
            let mut current = self.half_edges[twin_of_start].next;
            loop {
                if current == start {
                    break;
                }
                result.push(current);
                let twin = self.half_edges[current].twin;
                if twin == INVALID {
                    break;
                }
                current = self.half_edges[twin].next;
            }
        }

        result
    }

    fn neighbors(&self, v: usize) -> HashSet<usize> {
        self.outgoing_half_edges(v)
            .iter()
            .map(|&he| self.half_edges[he].target)
            .collect()
    }

    fn is_boundary_vertex(&self, v: usize) -> bool {
        self.outgoing_half_edges(v)
            .iter()
            .any(|&he| self.half_edges[he].twin == INVALID || self.half_edges[self.half_edges[he].prev].twin == INVALID)
    }

    /// Check the link condition: common neighbors must equal exactly the
    /// face apices opposite the edge (2 for interior, 1 for boundary).
    fn check_link_condition(&self, v1: usize, v2: usize) -> bool {
        let n1 = self.neighbors(v1);
        let n2 = self.neighbors(v2);
        let common_count = n1.intersection(&n2).count();

        let h = match self.find_half_edge(v1, v2) {
            Some(h) => h,
            None => return false,
        };
        let expected = if self.half_edges[h].twin == INVALID { 1 } else { 2 };
        common_count == expected
    }

    fn find_half_edge(&self, from: usize, to: usize) -> Option<usize> {
        self.outgoing_half_edges(from)
            .into_iter()
            .find(|&he| self.half_edges[he].target == to)
    }

    fn compute_collapse_cost(&self, v1: usize, v2: usize) -> (Point3d, f64) {
        let q = self.quadrics[v1] + self.quadrics[v2];
        let q3 = q.fixed_view::<3, 3>(0, 0);
        let q1 = q.fixed_view::<3, 1>(0, 3);

        let midpoint = nalgebra::center(&self.positions[v1], &self.positions[v2]);
        let optimal = match q3.try_inverse() {
            Some(inv) => {
                let p = -inv * q1;
                let candidate = Point3d::new(p[0], p[1], p[2]);
                if candidate.coords.iter().all(|c| c.is_finite()) {
                    candidate
                } else {
                    midpoint
                }
            }
            None => midpoint,
        };

        let vh = optimal.to_homogeneous();
        let cost = (vh.transpose() * q * vh)[0].max(0.0);
        (optimal, cost)
    }

    /// Longest edge from `new_pos` to the neighbors of `v1` and `v2`.
    fn longest_new_edge(&self, v1: usize, v2: usize, new_pos: &Point3d) -> f64 {
        self.neighbors(v1)
            .union(&self.neighbors(v2))
            .filter(|&&n| n != v1 && n != v2)
            .map(|&n| (self.positions[n] - new_pos).norm())
            .fold(0.0, f64::max)
    }

    /// Whether moving `v1` and `v2` to `new_pos` turns any surviving face over.
    fn collapse_flips_face(&self, v1: usize, v2: usize, new_pos: &Point3d) -> bool {
        let mut faces: HashSet<usize> = HashSet::new();
        for v in [v1, v2] {
            for he in self.outgoing_half_edges(v) {
                faces.insert(self.half_edges[he].face);
            }
        }

        faces.into_iter().filter(|&f| f != INVALID).any(|f| {
            let corners = self.face_vertices(f);
            if corners.contains(&v1) && corners.contains(&v2) {
                return false;
            }
            let before = corners.map(|v| self.positions[v]);
            let after = corners.map(|v| if v == v1 || v == v2 { *new_pos } else { self.positions[v] });
            let n_before: Vector3d = (before[1] - before[0]).cross(&(before[2] - before[0]));
            let n_after: Vector3d = (after[1] - after[0]).cross(&(after[2] - after[0]));
            n_before.dot(&n_after) <= 0.0
        })
    }

    /// Find any valid outgoing half-edge from a vertex (linear scan fallback).
    fn find_valid_outgoing(&self, v: usize) -> usize {
        for (i, he) in self.half_edges.iter().enumerate() {
            if he.face != INVALID && self.source(i) == v {
                return i;
            }
        }
        INVALID
    }

    /// Collapse edge (v1, v2), merging v2 into v1 at new_pos.
    /// Returns true on success.
    fn collapse_edge(&mut self, v1: usize, v2: usize, new_pos: Point3d) -> bool {
        let h = match self.find_half_edge(v1, v2) {
            Some(h) => h,
            None => return false,
        };

        let h_twin = self.half_edges[h].twin;
        let h_next = self.half_edges[h].next;
        let h_prev = self.half_edges[h].prev;
        let face_a = self.half_edges[h].face;
        let h_next_twin = self.half_edges[h_next].twin;
        let h_prev_twin = self.half_edges[h_prev].twin;
        let c = self.half_edges[h_next].target;

        let (face_b, ht_next, ht_prev, ht_next_twin, ht_prev_twin, d) = if h_twin != INVALID {
            let hn = self.half_edges[h_twin].next;
            let hp = self.half_edges[h_twin].prev;
            (
                self.half_edges[h_twin].face,
                hn,
                hp,
                self.half_edges[hn].twin,
                self.half_edges[hp].twin,
                self.half_edges[hn].target,
            )
        } else {
            (INVALID, INVALID, INVALID, INVALID, INVALID, INVALID)
        };

        // Collect v2 outgoing edges BEFORE any modifications
        let v2_outgoing = self.outgoing_half_edges(v2);

        // Re-pair twins for face A border edges
        if h_next_twin != INVALID {
            self.half_edges[h_next_twin].twin = h_prev_twin;
        }
        if h_prev_twin != INVALID {
            self.half_edges[h_prev_twin].twin = h_next_twin;
        }

        self.half_edges[h].face = INVALID;
        self.half_edges[h_next].face = INVALID;
        self.half_edges[h_prev].face = INVALID;
        self.face_edge[face_a] = INVALID;
        self.active_face_count -= 1;

        if face_b != INVALID {
            if ht_next_twin != INVALID {
                self.half_edges[ht_next_twin].twin = ht_prev_twin;
            }
            if ht_prev_twin != INVALID {
                self.half_edges[ht_prev_twin].twin = ht_next_twin;
            }
            self.half_edges[h_twin].face = INVALID;
            self.half_edges[ht_next].face = INVALID;
            self.half_edges[ht_prev].face = INVALID;
            self.face_edge[face_b] = INVALID;
            self.active_face_count -= 1;
        }

        // Redirect all v2 references to v1
        for &he in &v2_outgoing {
            let prev = self.half_edges[he].prev;
            self.half_edges[prev].target = v1;

            let twin = self.half_edges[he].twin;
            if twin != INVALID && self.half_edges[twin].face != INVALID {
                self.half_edges[twin].target = v1;
            }
        }

        if self.half_edges[self.vertex_edge[v1]].face == INVALID {
            if h_prev_twin != INVALID && self.half_edges[h_prev_twin].face != INVALID {
                self.vertex_edge[v1] = h_prev_twin;
            } else {
                self.vertex_edge[v1] = self.find_valid_outgoing(v1);
            }
        }

        if c != INVALID
            && self.vertex_edge[c] != INVALID
            && self.half_edges[self.vertex_edge[c]].face == INVALID
        {
            if h_next_twin != INVALID && self.half_edges[h_next_twin].face != INVALID {
                self.vertex_edge[c] = h_next_twin;
            } else {
                self.vertex_edge[c] = self.find_valid_outgoing(c);
            }
        }

        if d != INVALID
            && d != c
            && self.vertex_edge[d] != INVALID
            && self.half_edges[self.vertex_edge[d]].face == INVALID
        {
            if ht_next_twin != INVALID && self.half_edges[ht_next_twin].face != INVALID {
                self.vertex_edge[d] = ht_next_twin;
            } else {
                self.vertex_edge[d] = self.find_valid_outgoing(d);
            }
        }

        self.vertex_edge[v2] = INVALID;
        self.vertex_removed[v2] = true;

        let v2_quadric = self.quadrics[v2];
        self.positions[v1] = new_pos;
        self.quadrics[v1] += v2_quadric;

        true
    }

    fn to_triangle_mesh(&self) -> TriangleMesh {
        let mut old_to_new: HashMap<usize, usize> = HashMap::new();
        let mut new_positions = Vec::new();

        for (i, &removed) in self.vertex_removed.iter().enumerate() {
            if !removed && self.vertex_edge[i] != INVALID {
                old_to_new.insert(i, new_positions.len());
                new_positions.push(self.positions[i]);
            }
        }

        let mut new_faces = Vec::new();
        let mut new_tags = Vec::new();
        for fi in 0..self.face_edge.len() {
            if self.face_edge[fi] == INVALID {
                continue;
            }
            let [v0, v1, v2] = self.face_vertices(fi);

            if let (Some(&nv0), Some(&nv1), Some(&nv2)) =
                (old_to_new.get(&v0), old_to_new.get(&v1), old_to_new.get(&v2))
            {
                if nv0 != nv1 && nv1 != nv2 && nv2 != nv0 {
                    new_faces.push([nv0, nv1, nv2]);
                    new_tags.push(self.face_tags[fi]);
                }
            }
        }

        let mut mesh = TriangleMesh::from_vertices_and_faces(new_positions, new_faces);
        mesh.set_tags(new_tags);
        mesh
    }
}

// ============================================================
// Edge Cost for Priority Queue
// ============================================================

#[derive(Debug, Clone)]
struct EdgeCost {
    v1: usize,
    v2: usize,
    cost: f64,
}

impl PartialEq for EdgeCost {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost) == Ordering::Equal
    }
}
impl Eq for EdgeCost {}

impl PartialOrd for EdgeCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smallest cost first
        other.cost.total_cmp(&self.cost)
    }
}

// ============================================================
// Envelope Simplifier
// ============================================================

/// Edge collapse simplifier bounded by the simplification envelope.
///
/// Duplicate vertices and faces are always removed first. When skipping is
/// requested that cleaned surface is returned as is.
#[derive(Debug, Clone)]
pub struct EnvelopeSimplifier {
    /// Never collapse edges touching the surface boundary
    pub preserve_boundary: bool,
    /// Extra penalty added to boundary edge costs when they are not frozen
    pub boundary_weight: f64,
    /// Upper bound on full queue rebuilds
    pub max_passes: usize,
    /// Welding tolerance as a fraction of the bounding diagonal
    pub merge_tolerance_rel: f64,
}

impl Default for EnvelopeSimplifier {
    fn default() -> Self {
        Self {
            preserve_boundary: true,
            boundary_weight: 100.0,
            max_passes: 8,
            merge_tolerance_rel: DEFAULT_MERGE_TOLERANCE_REL,
        }
    }
}

impl EnvelopeSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the priority queue of edge collapse candidates.
    fn build_queue(&self, hem: &HalfEdgeMesh) -> PriorityQueue<usize, EdgeCost> {
        let mut queue = PriorityQueue::new();
        let mut seen_edges: HashSet<(usize, usize)> = HashSet::new();
        let mut edge_id = 0;

        for vi in 0..hem.positions.len() {
            if hem.vertex_removed[vi] || hem.vertex_edge[vi] == INVALID {
                continue;
            }
            for &he in &hem.outgoing_half_edges(vi) {
                if hem.half_edges[he].face == INVALID {
                    continue;
                }
                let target = hem.half_edges[he].target;
                let key = (vi.min(target), vi.max(target));
                if !seen_edges.insert(key) {
                    continue;
                }

                let on_boundary = hem.is_boundary_vertex(vi) || hem.is_boundary_vertex(target);
                if self.preserve_boundary && on_boundary {
                    continue;
                }

                let (_, mut cost) = hem.compute_collapse_cost(vi, target);
                if on_boundary {
                    cost += self.boundary_weight;
                }

                queue.push(edge_id, EdgeCost { v1: vi, v2: target, cost });
                edge_id += 1;
            }
        }

        queue
    }

    /// Run collapse passes until a pass makes no progress.
    fn collapse(&self, hem: &mut HalfEdgeMesh, index: &SurfaceIndex, params: &MeshingParameters) -> usize {
        let threshold = params.eps_2_simplification;
        let mut total = 0usize;

        for pass in 0..self.max_passes {
            let mut queue = self.build_queue(hem);
            let mut collapsed = 0usize;

            while let Some((_, edge_cost)) = queue.pop() {
                if edge_cost.cost > threshold {
                    break;
                }

                let (v1, v2) = (edge_cost.v1, edge_cost.v2);

                // Validate: both vertices still alive and still neighbors
                if hem.vertex_removed[v1]
                    || hem.vertex_removed[v2]
                    || hem.vertex_edge[v1] == INVALID
                    || hem.vertex_edge[v2] == INVALID
                    || hem.find_half_edge(v1, v2).is_none()
                {
                    continue;
                }

                if !hem.check_link_condition(v1, v2) {
                    continue;
                }

                // Costs go stale as neighbors collapse
                let (pos, cost) = hem.compute_collapse_cost(v1, v2);
                if cost > threshold
                    || hem.longest_new_edge(v1, v2, &pos) > params.split_threshold
                    || !index.is_within(&pos, params.eps_simplification)
                    || hem.collapse_flips_face(v1, v2, &pos)
                {
                    continue;
                }

                if hem.collapse_edge(v1, v2, pos) {
                    collapsed += 1;
                    if collapsed % 100 == 0 {
                        queue = self.build_queue(hem);
                    }
                }
            }

            debug!(pass, collapsed, faces = hem.active_face_count, "edge collapse pass");
            total += collapsed;
            if collapsed == 0 {
                break;
            }
        }

        total
    }
}

impl Simplifier for EnvelopeSimplifier {
    fn simplify(
        &self,
        mesh: &TriangleMesh,
        index: &SurfaceIndex,
        params: &MeshingParameters,
        skip: bool,
    ) -> TriangleMesh {
        let diagonal = if params.bbox_diag_length > 0.0 {
            params.bbox_diag_length
        } else {
            mesh.bounding_box().map_or(0.0, |b| b.diagonal_length())
        };
        let (cleaned, stats) = remove_duplicates(mesh, self.merge_tolerance_rel * diagonal);
        debug!(
            merged_vertices = stats.merged_vertices,
            degenerate_faces = stats.degenerate_faces,
            duplicate_faces = stats.duplicate_faces,
            "removed duplicates"
        );

        if skip || cleaned.is_empty() {
            return cleaned;
        }

        let mut hem = HalfEdgeMesh::from_triangle_mesh(&cleaned);
        let collapsed = self.collapse(&mut hem, index, params);
        let result = hem.to_triangle_mesh();
        debug!(
            collapsed,
            faces_before = cleaned.face_count(),
            faces_after = result.face_count(),
            "simplified surface"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tetrahedron() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(1.0, 0.0, 0.0),
                Point3d::new(0.5, 1.0, 0.0),
                Point3d::new(0.5, 0.5, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
    }

    fn make_plane_grid(size: usize) -> TriangleMesh {
        let mut vertices = Vec::new();
        for y in 0..size {
            for x in 0..size {
                vertices.push(Point3d::new(x as f64, y as f64, 0.0));
            }
        }
        let mut faces = Vec::new();
        for y in 0..(size - 1) {
            for x in 0..(size - 1) {
                let tl = y * size + x;
                let tr = tl + 1;
                let bl = (y + 1) * size + x;
                let br = bl + 1;
                faces.push([tl, bl, tr]);
                faces.push([tr, bl, br]);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    fn make_curved_grid(size: usize) -> TriangleMesh {
        let mut mesh = make_plane_grid(size);
        for v in mesh.vertices.iter_mut() {
            v.z = (v.x * 1.3).sin() * (v.y * 1.7).cos() * 2.0;
        }
        mesh
    }

    fn params_for(index: &SurfaceIndex, eps_rel: f64) -> MeshingParameters {
        // Target edges long enough that edge length never limits a collapse
        let mut params = MeshingParameters {
            eps_rel,
            ideal_edge_length_rel: 1.0,
            ..Default::default()
        };
        params.init(index.diagonal_length()).unwrap();
        params
    }

    #[test]
    fn test_halfedge_construction() {
        let hem = HalfEdgeMesh::from_triangle_mesh(&make_tetrahedron());
        assert_eq!(hem.half_edges.len(), 12);
        assert_eq!(hem.active_face_count, 4);
        for he in &hem.half_edges {
            assert_ne!(he.twin, INVALID, "closed surface half-edge should have twin");
        }
        for v in 0..4 {
            assert_eq!(hem.neighbors(v).len(), 3);
        }
        assert!(hem.check_link_condition(0, 1));
    }

    #[test]
    fn test_non_manifold_edge_is_left_unpaired() {
        // Three triangles fanning off the edge (0, 1)
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(1.0, 0.0, 0.0),
                Point3d::new(0.5, 1.0, 0.0),
                Point3d::new(0.5, -1.0, 0.0),
                Point3d::new(0.5, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]],
        );
        let hem = HalfEdgeMesh::from_triangle_mesh(&mesh);
        let h = hem.find_half_edge(0, 1).unwrap();
        assert_eq!(hem.half_edges[h].twin, INVALID);
        assert!(hem.is_boundary_vertex(0));
    }

    #[test]
    fn test_flat_grid_is_reduced_and_keeps_boundary() {
        let mesh = make_plane_grid(8);
        let index = SurfaceIndex::build(&mesh);
        let params = params_for(&index, 1e-3);

        let result = EnvelopeSimplifier::new().simplify(&mesh, &index, &params, false);
        assert!(result.face_count() < mesh.face_count());
        assert!(result.face_count() > 0);
        assert_eq!(result.tags.as_ref().map(Vec::len), Some(result.face_count()));
        result.validate().unwrap();

        // Corners are boundary vertices and must survive
        for corner in [
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(7.0, 0.0, 0.0),
            Point3d::new(0.0, 7.0, 0.0),
            Point3d::new(7.0, 7.0, 0.0),
        ] {
            assert!(result.vertices.contains(&corner));
        }
        // Everything stays inside the envelope
        for v in &result.vertices {
            assert!(index.distance_to_surface(v).unwrap() <= params.eps_simplification);
        }
    }

    #[test]
    fn test_tight_envelope_blocks_collapse_on_curved_surface() {
        let mesh = make_curved_grid(6);
        let index = SurfaceIndex::build(&mesh);
        let params = params_for(&index, 1e-6);

        let result = EnvelopeSimplifier::new().simplify(&mesh, &index, &params, false);
        assert_eq!(result.face_count(), mesh.face_count());
    }

    #[test]
    fn test_skip_only_cleans() {
        let mut mesh = make_plane_grid(5);
        mesh.faces.push(mesh.faces[0]);
        let tags: Vec<Tag> = (0..mesh.face_count() as Tag).collect();
        mesh.set_tags(tags);

        let index = SurfaceIndex::build(&mesh);
        let params = params_for(&index, 1e-2);
        let result = EnvelopeSimplifier::new().simplify(&mesh, &index, &params, true);

        assert_eq!(result.face_count(), 32);
        assert_eq!(result.vertex_count(), 25);
        let expected: Vec<Tag> = (0..32).collect();
        assert_eq!(result.tags, Some(expected));
    }

    #[test]
    fn test_tags_follow_surviving_faces() {
        let mut mesh = make_plane_grid(6);
        let half = mesh.face_count() / 2;
        let tags: Vec<Tag> = (0..mesh.face_count()).map(|i| if i < half { 1 } else { 2 }).collect();
        mesh.set_tags(tags);

        let index = SurfaceIndex::build(&mesh);
        let params = params_for(&index, 1e-3);
        let result = EnvelopeSimplifier::new().simplify(&mesh, &index, &params, false);

        let tags = result.tags.unwrap();
        assert_eq!(tags.len(), result.faces.len());
        assert!(tags.iter().all(|t| *t == 1 || *t == 2));
    }

    #[test]
    fn test_empty_mesh_passes_through() {
        let mesh = TriangleMesh::new();
        let index = SurfaceIndex::build(&mesh);
        let params = MeshingParameters::default();
        let result = EnvelopeSimplifier::new().simplify(&mesh, &index, &params, false);
        assert!(result.is_empty());
    }

    #[test]
    fn test_target_edge_length_limits_collapse() {
        let mesh = make_plane_grid(20);
        let index = SurfaceIndex::build(&mesh);
        let simplifier = EnvelopeSimplifier::new();

        let mut fine = MeshingParameters::default().with_ideal_edge_length(1.0);
        fine.init(index.diagonal_length()).unwrap();
        let mut coarse = MeshingParameters::default().with_ideal_edge_length(10.0);
        coarse.init(index.diagonal_length()).unwrap();

        let fine_result = simplifier.simplify(&mesh, &index, &fine, false);
        let coarse_result = simplifier.simplify(&mesh, &index, &coarse, false);

        // Any collapse on a unit grid creates an edge of at least 1.5
        assert_eq!(fine_result.face_count(), mesh.face_count());
        assert!(coarse_result.face_count() < fine_result.face_count());
        coarse_result.validate().unwrap();
    }

    #[test]
    fn test_skip_keeps_tiny_and_distant_meshes() {
        let simplifier = EnvelopeSimplifier::new();
        for (scale, offset) in [(1e-9, 0.0), (1.0, 1e12)] {
            let mut mesh = make_plane_grid(4);
            for v in mesh.vertices.iter_mut() {
                v.x = v.x * scale + offset;
                v.y = v.y * scale + offset;
                v.z += offset;
            }
            let index = SurfaceIndex::build(&mesh);
            let params = params_for(&index, 1e-3);
            let result = simplifier.simplify(&mesh, &index, &params, true);
            assert_eq!(result.face_count(), 18);
            assert_eq!(result.vertex_count(), 16);
        }
    }
}

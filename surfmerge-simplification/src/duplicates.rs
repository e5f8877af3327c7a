//! Duplicate vertex and face removal

use std::collections::{HashMap, HashSet};
use surfmerge_core::{Bounded, Face, Point3d, TriangleMesh};

/// Welding tolerance relative to the mesh's bounding diagonal
pub const DEFAULT_MERGE_TOLERANCE_REL: f64 = 1e-10;

/// Counts of what [`remove_duplicates`] dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub merged_vertices: usize,
    pub unreferenced_vertices: usize,
    pub degenerate_faces: usize,
    pub duplicate_faces: usize,
}

/// Grid cell of `p`, counted from `origin`.
///
/// Without a usable tolerance only bit-identical coordinates share a cell.
fn cell_key(p: &Point3d, origin: &Point3d, tolerance: f64) -> [i64; 3] {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return [p.x.to_bits() as i64, p.y.to_bits() as i64, p.z.to_bits() as i64];
    }
    let d = p - origin;
    [
        (d.x / tolerance).round() as i64,
        (d.y / tolerance).round() as i64,
        (d.z / tolerance).round() as i64,
    ]
}

/// Weld coincident vertices and drop degenerate and repeated faces.
///
/// Vertices whose coordinates fall in the same `tolerance` cell, measured
/// from the bounding box minimum, are welded to the first one seen. Callers
/// scale `tolerance` to the mesh so cell counts stay far below `i64::MAX`. Faces that reference a welded vertex twice are
/// dropped, as are faces over a vertex set already used by an earlier face.
/// Surviving faces keep their tags. Vertices no longer referenced are removed
/// and the remaining ones are renumbered in their original order.
pub fn remove_duplicates(mesh: &TriangleMesh, tolerance: f64) -> (TriangleMesh, CleanupStats) {
    let mut stats = CleanupStats::default();
    let tags = mesh.face_tags();
    let origin = mesh.bounding_box().map_or_else(Point3d::origin, |b| b.min);

    let mut cells: HashMap<[i64; 3], usize> = HashMap::with_capacity(mesh.vertices.len());
    let welded: Vec<usize> = mesh
        .vertices
        .iter()
        .enumerate()
        .map(|(i, p)| *cells.entry(cell_key(p, &origin, tolerance)).or_insert(i))
        .collect();
    stats.merged_vertices = welded.iter().enumerate().filter(|(i, w)| i != *w).count();

    let mut seen: HashSet<Face> = HashSet::with_capacity(mesh.faces.len());
    let mut kept_faces = Vec::with_capacity(mesh.faces.len());
    let mut kept_tags = Vec::with_capacity(mesh.faces.len());
    for (face, &tag) in mesh.faces.iter().zip(&tags) {
        let f = [welded[face[0]], welded[face[1]], welded[face[2]]];
        if f[0] == f[1] || f[1] == f[2] || f[2] == f[0] {
            stats.degenerate_faces += 1;
            continue;
        }
        let mut key = f;
        key.sort_unstable();
        if !seen.insert(key) {
            stats.duplicate_faces += 1;
            continue;
        }
        kept_faces.push(f);
        kept_tags.push(tag);
    }

    let mut old_to_new = vec![usize::MAX; mesh.vertices.len()];
    let mut vertices = Vec::new();
    for face in &mut kept_faces {
        for v in face.iter_mut() {
            if old_to_new[*v] == usize::MAX {
                old_to_new[*v] = vertices.len();
                vertices.push(mesh.vertices[*v]);
            }
            *v = old_to_new[*v];
        }
    }
    stats.unreferenced_vertices = mesh.vertices.len() - stats.merged_vertices - vertices.len();

    let mut cleaned = TriangleMesh::from_vertices_and_faces(vertices, kept_faces);
    cleaned.set_tags(kept_tags);
    (cleaned, stats)
}

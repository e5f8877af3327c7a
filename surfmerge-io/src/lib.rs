//! I/O operations for surface meshes
//!
//! Reads OBJ and PLY surfaces into [`TriangleMesh`] values and writes the
//! merged result back out as PLY. Polygons with more than three corners are
//! fan-triangulated on load.

pub mod ply;
pub mod obj;

use std::path::Path;
use surfmerge_core::{Error, Result, TriangleMesh};

/// Trait for reading meshes from files
pub trait MeshReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh>;
}

/// Trait for writing meshes to files
pub trait MeshWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()>;
}

/// Auto-detect format and read mesh
pub fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let mesh = match extension(path).as_deref() {
        Some("obj") => obj::ObjReader::read_mesh(path)?,
        Some("ply") => ply::PlyReader::read_mesh(path)?,
        _ => {
            return Err(Error::UnsupportedFormat(format!(
                "Unsupported mesh format: {:?}",
                path.extension()
            )))
        }
    };
    mesh.validate()?;
    tracing::debug!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        tagged = mesh.tags.is_some(),
        "read mesh"
    );
    Ok(mesh)
}

/// Auto-detect format and write mesh
pub fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match extension(path).as_deref() {
        Some("ply") => ply::PlyWriter::write_mesh(mesh, path),
        _ => Err(Error::UnsupportedFormat(format!(
            "Unsupported output format: {:?}",
            path.extension()
        ))),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
}

/// Split a polygon into a triangle fan around its first corner
pub(crate) fn triangulate_fan(polygon: &[usize], faces: &mut Vec<[usize; 3]>) -> usize {
    if polygon.len() < 3 {
        return 0;
    }
    for i in 1..polygon.len() - 1 {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
    polygon.len() - 2
}

//! OBJ format support

use crate::{triangulate_fan, MeshReader};
use obj::{Obj, ObjData};
use std::io::Read;
use std::path::Path;
use surfmerge_core::{Error, Point3d, Result, TriangleMesh};

pub struct ObjReader;

impl ObjReader {
    /// Read a mesh from any OBJ byte stream
    pub fn read_from<R: Read>(reader: R) -> Result<TriangleMesh> {
        let data = ObjData::load_buf(reader)
            .map_err(|e| Error::InvalidData(format!("OBJ parse error: {}", e)))?;
        Ok(Self::to_mesh(&data))
    }

    fn to_mesh(data: &ObjData) -> TriangleMesh {
        let vertices = data
            .position
            .iter()
            .map(|p| Point3d::new(p[0] as f64, p[1] as f64, p[2] as f64))
            .collect();

        let mut faces = Vec::new();
        let mut corners = Vec::new();
        for group in data.objects.iter().flat_map(|o| o.groups.iter()) {
            for poly in &group.polys {
                corners.clear();
                corners.extend(poly.0.iter().map(|t| t.0));
                triangulate_fan(&corners, &mut faces);
            }
        }

        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }
}

impl MeshReader for ObjReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
            .into());
        }
        let obj = Obj::load(path)
            .map_err(|e| Error::InvalidData(format!("OBJ parse error: {}", e)))?;
        Ok(Self::to_mesh(&obj.data))
    }
}

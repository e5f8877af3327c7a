//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use crate::{Tag, DEFAULT_TAG};
use serde::{Deserialize, Serialize};

/// An indexed triangle surface with optional per-face tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3d>,
    pub faces: Vec<Face>,
    pub tags: Option<Vec<Tag>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            tags: None,
        }
    }

    /// Create a mesh from vertices and faces without checking the indices
    pub fn from_vertices_and_faces(vertices: Vec<Point3d>, faces: Vec<Face>) -> Self {
        Self {
            vertices,
            faces,
            tags: None,
        }
    }

    /// Rebuild a surface from raw arrays.
    ///
    /// Every face index must address an existing vertex and, when given,
    /// there must be exactly one tag per face.
    pub fn from_indexed(vertices: Vec<Point3d>, faces: Vec<Face>, tags: Option<Vec<Tag>>) -> Result<Self> {
        let mesh = Self { vertices, faces, tags };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Check index bounds and tag count
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len();
        if let Some((fi, face)) = self
            .faces
            .iter()
            .enumerate()
            .find(|(_, f)| f.iter().any(|&i| i >= n))
        {
            return Err(Error::InvalidData(format!(
                "face {} {:?} references a vertex outside 0..{}",
                fi, face, n
            )));
        }
        if let Some(tags) = &self.tags {
            if tags.len() != self.faces.len() {
                return Err(Error::InvalidData(format!(
                    "{} tags for {} faces",
                    tags.len(),
                    self.faces.len()
                )));
            }
        }
        Ok(())
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Set per-face tags. Ignored unless there is one tag per face.
    pub fn set_tags(&mut self, tags: Vec<Tag>) {
        if tags.len() == self.faces.len() {
            self.tags = Some(tags);
        }
    }

    /// Tags with exactly one entry per face.
    ///
    /// Missing tags, or a tag array whose length disagrees with the face
    /// count, are replaced by [`DEFAULT_TAG`] for every face.
    pub fn face_tags(&self) -> Vec<Tag> {
        match &self.tags {
            Some(tags) if tags.len() == self.faces.len() => tags.clone(),
            _ => vec![DEFAULT_TAG; self.faces.len()],
        }
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

//! Merge assembly
//!
//! Concatenates independently indexed meshes into one surface. Vertices are
//! appended in order without welding across meshes, and every face index of
//! mesh `i` is shifted by the number of vertices contributed by meshes
//! `0..i`.

use crate::prepare::LoadedMesh;
use serde::{Deserialize, Serialize};
use surfmerge_core::{Aabb, Face, Point3d, Result, Tag, TriangleMesh, DEFAULT_TAG};
use tracing::info;

/// Tag assigned to merged faces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagPolicy {
    /// Every merged face gets [`DEFAULT_TAG`]
    #[default]
    Reset,
    /// Faces keep the tag their mesh carried out of preparation
    Preserve,
    /// Faces are tagged with the position of their mesh in the batch
    MeshIndex,
}

/// The combined surface and per-mesh bookkeeping
#[derive(Debug, Clone)]
pub struct MergedMesh {
    pub surface: TriangleMesh,
    /// Bounding box of every input mesh, in batch order
    pub bounding_boxes: Vec<Aabb>,
    /// Vertex offset applied to each input mesh, in batch order
    pub vertex_offsets: Vec<usize>,
}

impl MergedMesh {
    pub fn vertices(&self) -> &[Point3d] {
        &self.surface.vertices
    }

    pub fn faces(&self) -> &[Face] {
        &self.surface.faces
    }

    pub fn tags(&self) -> &[Tag] {
        self.surface.tags.as_deref().unwrap_or(&[])
    }

    pub fn bbox_mins(&self) -> Vec<Point3d> {
        self.bounding_boxes.iter().map(|b| b.min).collect()
    }

    pub fn bbox_maxes(&self) -> Vec<Point3d> {
        self.bounding_boxes.iter().map(|b| b.max).collect()
    }

    pub fn mesh_count(&self) -> usize {
        self.bounding_boxes.len()
    }
}

/// Accumulates prepared meshes and produces the merged surface once
#[derive(Debug, Default)]
pub struct MergeBuilder {
    policy: TagPolicy,
    vertices: Vec<Point3d>,
    faces: Vec<Face>,
    tags: Vec<Tag>,
    bounding_boxes: Vec<Aabb>,
    vertex_offsets: Vec<usize>,
}

impl MergeBuilder {
    pub fn new(policy: TagPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Offset the next pushed mesh will receive
    pub fn offset(&self) -> usize {
        self.vertices.len()
    }

    /// Append one mesh, returning the vertex offset applied to its faces
    pub fn push(&mut self, loaded: LoadedMesh) -> usize {
        let offset = self.offset();
        let mesh_index = self.bounding_boxes.len();
        let LoadedMesh { mesh, bounding_box, .. } = loaded;

        let own_tags = mesh.face_tags();
        self.faces
            .extend(mesh.faces.iter().map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]));
        match self.policy {
            TagPolicy::Reset => self.tags.extend(std::iter::repeat(DEFAULT_TAG).take(mesh.faces.len())),
            TagPolicy::Preserve => self.tags.extend(own_tags),
            TagPolicy::MeshIndex => {
                let tag = Tag::try_from(mesh_index).unwrap_or(Tag::MAX);
                self.tags.extend(std::iter::repeat(tag).take(mesh.faces.len()));
            }
        }
        self.vertices.extend(mesh.vertices);

        self.bounding_boxes.push(bounding_box);
        self.vertex_offsets.push(offset);
        offset
    }

    /// Rebuild the combined surface, checking every remapped index
    pub fn finish(self) -> Result<MergedMesh> {
        let surface = TriangleMesh::from_indexed(self.vertices, self.faces, Some(self.tags))?;
        info!(
            meshes = self.bounding_boxes.len(),
            vertices = surface.vertex_count(),
            faces = surface.face_count(),
            "merged surface"
        );
        Ok(MergedMesh {
            surface,
            bounding_boxes: self.bounding_boxes,
            vertex_offsets: self.vertex_offsets,
        })
    }
}

/// Merge prepared meshes in the given order
pub fn merge<I>(meshes: I, policy: TagPolicy) -> Result<MergedMesh>
where
    I: IntoIterator<Item = LoadedMesh>,
{
    let mut builder = MergeBuilder::new(policy);
    for mesh in meshes {
        builder.push(mesh);
    }
    builder.finish()
}

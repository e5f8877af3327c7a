//! Per-mesh preparation: load, index, adapt parameters, simplify

use crate::config::MeshDescriptor;
use std::path::Path;
use surfmerge_core::{Aabb, Bounded, Error, Result, TriangleMesh, DEFAULT_TAG};
use surfmerge_simplification::{MeshingParameters, Simplifier, SurfaceIndex};
use tracing::{debug, info};

/// Source of surface geometry for a mesh identity
pub trait MeshLoader: Send + Sync {
    /// Load the surface named by `path`. Tags are optional; faces must index
    /// existing vertices or preparation fails with [`Error::Load`].
    fn load(&self, path: &Path) -> Result<TriangleMesh>;
}

/// Loads meshes from disk, choosing the decoder by file extension
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMeshLoader;

impl MeshLoader for FileMeshLoader {
    fn load(&self, path: &Path) -> Result<TriangleMesh> {
        surfmerge_io::read_mesh(path).map_err(|e| match e {
            Error::Load { .. } => e,
            other => Error::load(path, other),
        })
    }
}

/// One prepared mesh, ready for merging
#[derive(Debug, Clone)]
pub struct LoadedMesh {
    pub name: String,
    /// Simplified surface with exactly one tag per face
    pub mesh: TriangleMesh,
    /// Bounding box of the simplified surface
    pub bounding_box: Aabb,
}

impl LoadedMesh {
    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn face_count(&self) -> usize {
        self.mesh.face_count()
    }
}

/// Clone the global parameters with this mesh's overrides applied.
///
/// Epsilon is always taken from the descriptor, so an unset epsilon resets to
/// the sentinel and is later derived from the mesh's own diagonal. A target
/// edge length is only applied when the descriptor gives one.
pub fn adapt_parameters(base: &MeshingParameters, descriptor: &MeshDescriptor) -> MeshingParameters {
    let params = base.clone().with_eps_input(descriptor.epsilon);
    match descriptor.target_edge_length_override() {
        Some(length) => params.with_ideal_edge_length(length),
        None => params,
    }
}

/// Make the tag array exactly one default tag per face unless it already fits
pub fn normalize_tags(mesh: &mut TriangleMesh) {
    let fits = mesh.tags.as_ref().is_some_and(|t| t.len() == mesh.faces.len());
    if !fits {
        if mesh.tags.is_some() {
            debug!(
                tags = mesh.tags.as_ref().map_or(0, Vec::len),
                faces = mesh.faces.len(),
                "tag count mismatch, resetting tags"
            );
        }
        mesh.tags = Some(vec![DEFAULT_TAG; mesh.faces.len()]);
    }
}

/// Prepares individual meshes against a shared base parameter set
pub struct MeshPreparer<'a, L: ?Sized, S: ?Sized> {
    pub loader: &'a L,
    pub simplifier: &'a S,
    pub base: &'a MeshingParameters,
}

impl<'a, L, S> MeshPreparer<'a, L, S>
where
    L: MeshLoader + ?Sized,
    S: Simplifier + ?Sized,
{
    pub fn new(loader: &'a L, simplifier: &'a S, base: &'a MeshingParameters) -> Self {
        Self { loader, simplifier, base }
    }

    pub fn prepare(&self, descriptor: &MeshDescriptor) -> Result<LoadedMesh> {
        let path = descriptor.path();
        let mut mesh = self.loader.load(path)?;
        mesh.validate().map_err(|e| Error::load(path, e))?;
        let index = SurfaceIndex::build(&mesh);

        let mut params = adapt_parameters(self.base, descriptor);
        params.init(index.diagonal_length())?;

        normalize_tags(&mut mesh);

        let (vertices_in, faces_in) = (mesh.vertex_count(), mesh.face_count());
        let mut simplified = self
            .simplifier
            .simplify(&mesh, &index, &params, descriptor.skip_simplify);
        normalize_tags(&mut simplified);

        let bounding_box = simplified
            .bounding_box()
            .or_else(|| index.bounding_box())
            .ok_or_else(|| Error::InvalidData(format!("{} has no vertices", descriptor.name)))?;

        info!(
            name = %descriptor.name,
            vertices_in,
            faces_in,
            vertices_out = simplified.vertex_count(),
            faces_out = simplified.face_count(),
            eps_input = params.eps_input,
            skipped = descriptor.skip_simplify,
            "prepared mesh"
        );

        Ok(LoadedMesh {
            name: descriptor.name.clone(),
            mesh: simplified,
            bounding_box,
        })
    }
}

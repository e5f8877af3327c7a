//! Surface preparation: scale-relative parameters, spatial indexing and
//! simplification
//!
//! - [`MeshingParameters`] turns thresholds relative to a mesh's bounding
//!   diagonal into absolute lengths
//! - [`SurfaceIndex`] answers bounding-box and closest-distance queries
//! - [`EnvelopeSimplifier`] removes duplicates and collapses edges while
//!   staying inside the simplification envelope

pub mod params;
pub mod spatial;
pub mod duplicates;
pub mod edge_collapse;

pub use params::*;
pub use spatial::*;
pub use duplicates::*;
pub use edge_collapse::*;

use surfmerge_core::TriangleMesh;

/// Reduce a surface's complexity within the bounds set by `params`.
///
/// The input carries per-face tags; the returned surface carries exactly one
/// tag per remaining face. With `skip` set the surface is only cleaned of
/// duplicates. No failure is reported: an input that cannot be reduced comes
/// back unchanged.
pub trait Simplifier {
    fn simplify(
        &self,
        mesh: &TriangleMesh,
        index: &SurfaceIndex,
        params: &MeshingParameters,
        skip: bool,
    ) -> TriangleMesh;
}

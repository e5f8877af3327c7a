//! Batch pipeline: resolve, prepare each mesh, merge
//!
//! A batch is a pure call: nothing is retained between runs. When a mesh
//! fails to load or its parameters cannot be initialized the batch stops and
//! the error carries the bounding boxes of the meshes prepared before it.

use crate::config::{resolve, FieldPolicy, InputFiles, MeshDescriptor, RawFileEntry};
use crate::merge::{MergeBuilder, MergedMesh, TagPolicy};
use crate::prepare::{FileMeshLoader, LoadedMesh, MeshLoader, MeshPreparer};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use surfmerge_core::{Aabb, Error};
use surfmerge_simplification::{EnvelopeSimplifier, MeshingParameters, Simplifier};
use tracing::{error, info, info_span};

/// Configuration for a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Global parameters, cloned and adapted for every mesh
    pub parameters: MeshingParameters,
    /// Handling of mistyped descriptor fields
    pub field_policy: FieldPolicy,
    /// Tags given to merged faces
    pub tag_policy: TagPolicy,
    /// Prepare meshes on the rayon thread pool
    pub parallel: bool,
}

/// Failure of a batch run
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(Error),

    #[error("mesh {index} ({name}) failed: {source}")]
    Mesh {
        index: usize,
        name: String,
        /// Bounding boxes of the meshes prepared before `index`
        bounding_boxes: Vec<Aabb>,
        #[source]
        source: Error,
    },

    #[error("merge failed: {0}")]
    Merge(#[source] Error),
}

impl PipelineError {
    /// Bounding boxes gathered before the failure
    pub fn bounding_boxes(&self) -> &[Aabb] {
        match self {
            PipelineError::Mesh { bounding_boxes, .. } => bounding_boxes,
            _ => &[],
        }
    }

    /// Position of the failing mesh, if a mesh failed
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            PipelineError::Mesh { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// The batch pipeline with its loading and simplification collaborators
pub struct BatchPipeline<L = FileMeshLoader, S = EnvelopeSimplifier> {
    config: PipelineConfig,
    loader: L,
    simplifier: S,
}

impl BatchPipeline {
    /// Pipeline reading meshes from disk with the default simplifier
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            loader: FileMeshLoader,
            simplifier: EnvelopeSimplifier::default(),
        }
    }
}

impl Default for BatchPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl<L, S> BatchPipeline<L, S>
where
    L: MeshLoader,
    S: Simplifier + Sync,
{
    pub fn with_parts(config: PipelineConfig, loader: L, simplifier: S) -> Self {
        Self {
            config,
            loader,
            simplifier,
        }
    }

    pub fn with_loader<L2: MeshLoader>(self, loader: L2) -> BatchPipeline<L2, S> {
        BatchPipeline {
            config: self.config,
            loader,
            simplifier: self.simplifier,
        }
    }

    pub fn with_simplifier<S2: Simplifier + Sync>(self, simplifier: S2) -> BatchPipeline<L, S2> {
        BatchPipeline {
            config: self.config,
            loader: self.loader,
            simplifier,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolve raw entries with the configured field policy
    pub fn resolve(&self, entries: &[RawFileEntry]) -> Result<Vec<MeshDescriptor>, PipelineError> {
        resolve(entries, self.config.field_policy).map_err(PipelineError::Config)
    }

    /// Prepare every mesh in batch order, stopping at the first failure
    pub fn prepare_all(&self, descriptors: &[MeshDescriptor]) -> Result<Vec<LoadedMesh>, PipelineError> {
        let preparer = MeshPreparer::new(&self.loader, &self.simplifier, &self.config.parameters);
        let prepare = |index: usize, descriptor: &MeshDescriptor| {
            let _span = info_span!("prepare", index, name = %descriptor.name).entered();
            preparer.prepare(descriptor)
        };

        let mut prepared: Vec<LoadedMesh> = Vec::with_capacity(descriptors.len());

        if self.config.parallel {
            let results: Vec<_> = descriptors
                .par_iter()
                .enumerate()
                .map(|(i, d)| prepare(i, d))
                .collect();
            for (index, result) in results.into_iter().enumerate() {
                match result {
                    Ok(mesh) => prepared.push(mesh),
                    Err(source) => return Err(mesh_failure(index, &descriptors[index], &prepared, source)),
                }
            }
        } else {
            for (index, descriptor) in descriptors.iter().enumerate() {
                match prepare(index, descriptor) {
                    Ok(mesh) => prepared.push(mesh),
                    Err(source) => return Err(mesh_failure(index, descriptor, &prepared, source)),
                }
            }
        }

        Ok(prepared)
    }

    /// Prepare and merge already resolved descriptors
    pub fn run(&self, descriptors: &[MeshDescriptor]) -> Result<MergedMesh, PipelineError> {
        let _span = info_span!("batch", meshes = descriptors.len()).entered();
        let prepared = self.prepare_all(descriptors)?;

        let mut builder = MergeBuilder::new(self.config.tag_policy);
        for mesh in prepared {
            builder.push(mesh);
        }
        let merged = builder.finish().map_err(PipelineError::Merge)?;
        info!(
            meshes = merged.mesh_count(),
            vertices = merged.vertices().len(),
            faces = merged.faces().len(),
            "batch complete"
        );
        Ok(merged)
    }

    /// Resolve raw entries, then run them
    pub fn run_entries(&self, entries: &[RawFileEntry]) -> Result<MergedMesh, PipelineError> {
        let descriptors = self.resolve(entries)?;
        self.run(&descriptors)
    }

    /// Run a JSON batch document
    pub fn run_json(&self, json: &str) -> Result<MergedMesh, PipelineError> {
        let input = InputFiles::from_json(json).map_err(PipelineError::Config)?;
        self.run_entries(&input.files)
    }

    /// Run a JSON batch document read from `path`
    pub fn run_file<P: AsRef<Path>>(&self, path: P) -> Result<MergedMesh, PipelineError> {
        let input = InputFiles::from_path(path).map_err(PipelineError::Config)?;
        self.run_entries(&input.files)
    }
}

fn mesh_failure(index: usize, descriptor: &MeshDescriptor, prepared: &[LoadedMesh], source: Error) -> PipelineError {
    error!(index, name = %descriptor.name, error = %source, "mesh preparation failed");
    PipelineError::Mesh {
        index,
        name: descriptor.name.clone(),
        bounding_boxes: prepared.iter().map(|m| m.bounding_box).collect(),
        source,
    }
}

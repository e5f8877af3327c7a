//! Batch preparation and merging of surface meshes
//!
//! Takes a list of named input surfaces with optional per-mesh overrides,
//! prepares each one against thresholds scaled to its own bounding diagonal,
//! and assembles the results into one indexed surface:
//!
//! 1. [`config`] resolves the batch document into unique [`MeshDescriptor`]s
//! 2. [`prepare`] loads, indexes and simplifies each mesh
//! 3. [`merge`] concatenates the prepared meshes with remapped face indices
//!
//! ```no_run
//! use surfmerge_pipeline::{BatchPipeline, PipelineConfig};
//!
//! let pipeline = BatchPipeline::new(PipelineConfig::default());
//! let merged = pipeline
//!     .run_json(r#"{"files": [{"name": "part.obj"}, {"name": "shell.ply", "skip_simplify": true}]}"#)
//!     .unwrap();
//! println!("{} faces", merged.faces().len());
//! ```

pub mod config;
pub mod prepare;
pub mod merge;
pub mod pipeline;

pub use config::{resolve, resolve_json, FieldPolicy, InputFiles, MeshDescriptor, RawFileEntry, UNSPECIFIED};
pub use merge::{merge, MergeBuilder, MergedMesh, TagPolicy};
pub use pipeline::{BatchPipeline, PipelineConfig, PipelineError};
pub use prepare::{adapt_parameters, normalize_tags, FileMeshLoader, LoadedMesh, MeshLoader, MeshPreparer};

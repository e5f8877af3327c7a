//! surfmerge: merge a batch of surface meshes into one tagged PLY.
//!
//! The batch is a JSON document listing the input meshes:
//!
//! ```json
//! {"files": [{"name": "part.obj", "epsa": 0.01}, {"name": "shell.ply", "skip_simplify": true}]}
//! ```
//!
//! Set `RUST_LOG` to control log output, or pass `-v` / `-vv`:
//!
//! ```bash
//! surfmerge batch.json -o merged.ply -v
//! RUST_LOG=surfmerge_simplification=debug surfmerge batch.json -o merged.ply
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use surfmerge_pipeline::{BatchPipeline, FieldPolicy, PipelineConfig, PipelineError, TagPolicy};
use surfmerge_simplification::MeshingParameters;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Simplify each mesh of a batch relative to its own size and merge the results
#[derive(Parser, Debug)]
#[command(name = "surfmerge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON batch file
    input: PathBuf,

    /// Output PLY file
    #[arg(short, long)]
    output: PathBuf,

    /// Envelope size relative to each mesh's bounding diagonal
    #[arg(long, default_value_t = MeshingParameters::default().eps_rel)]
    epsilon_rel: f64,

    /// Ideal edge length relative to each mesh's bounding diagonal
    #[arg(long, default_value_t = MeshingParameters::default().ideal_edge_length_rel)]
    edge_length_rel: f64,

    /// Envelope refinement stage (1-5)
    #[arg(long, default_value_t = MeshingParameters::default().stage)]
    stage: u32,

    /// How merged faces are tagged
    #[arg(long, default_value = "reset")]
    tags: TagMode,

    /// Reject mistyped fields in the batch file instead of using defaults
    #[arg(long)]
    strict: bool,

    /// Prepare meshes on all cores
    #[arg(long)]
    parallel: bool,

    /// Suppress the summary line
    #[arg(long, short)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TagMode {
    /// Every merged face gets tag 0
    Reset,
    /// Faces keep the tags of their source mesh
    Preserve,
    /// Faces are tagged with their mesh's batch position
    MeshIndex,
}

impl From<TagMode> for TagPolicy {
    fn from(mode: TagMode) -> Self {
        match mode {
            TagMode::Reset => TagPolicy::Reset,
            TagMode::Preserve => TagPolicy::Preserve,
            TagMode::MeshIndex => TagPolicy::MeshIndex,
        }
    }
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            parameters: MeshingParameters {
                eps_rel: self.epsilon_rel,
                ideal_edge_length_rel: self.edge_length_rel,
                stage: self.stage,
                ..Default::default()
            },
            field_policy: if self.strict { FieldPolicy::Strict } else { FieldPolicy::Lenient },
            tag_policy: self.tags.into(),
            parallel: self.parallel,
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "surfmerge_pipeline=info,surfmerge_simplification=info,surfmerge_io=info",
            2 => "surfmerge_pipeline=debug,surfmerge_simplification=debug,surfmerge_io=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let pipeline = BatchPipeline::new(cli.pipeline_config());
    let merged = match pipeline.run_file(&cli.input) {
        Ok(merged) => merged,
        Err(err) => {
            if let PipelineError::Mesh { bounding_boxes, .. } = &err {
                tracing::warn!(completed = bounding_boxes.len(), "batch aborted");
            }
            return Err(err).with_context(|| format!("failed to merge batch {}", cli.input.display()));
        }
    };

    surfmerge_io::write_mesh(&merged.surface, &cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    if !cli.quiet {
        println!(
            "merged {} meshes: {} vertices, {} faces -> {}",
            merged.mesh_count(),
            merged.vertices().len(),
            merged.faces().len(),
            cli.output.display()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  Caused by: {cause}");
        }
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["surfmerge", "batch.json", "-o", "out.ply"]).unwrap();
        let config = cli.pipeline_config();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.input, PathBuf::from("batch.json"));
    }

    #[test]
    fn test_all_options() {
        let cli = Cli::try_parse_from([
            "surfmerge",
            "batch.json",
            "--output",
            "out.ply",
            "--epsilon-rel",
            "0.01",
            "--edge-length-rel",
            "0.1",
            "--stage",
            "3",
            "--tags",
            "mesh-index",
            "--strict",
            "--parallel",
            "-vv",
        ])
        .unwrap();
        let config = cli.pipeline_config();
        assert_eq!(config.parameters.eps_rel, 0.01);
        assert_eq!(config.parameters.ideal_edge_length_rel, 0.1);
        assert_eq!(config.parameters.stage, 3);
        assert_eq!(config.tag_policy, TagPolicy::MeshIndex);
        assert_eq!(config.field_policy, FieldPolicy::Strict);
        assert!(config.parallel);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_output_is_required() {
        assert!(Cli::try_parse_from(["surfmerge", "batch.json"]).is_err());
        assert!(Cli::try_parse_from(["surfmerge", "batch.json", "-o", "x.ply", "--tags", "keep"]).is_err());
    }
}

//! Integration tests for surfmerge-pipeline
//!
//! These tests run whole batches through resolution, preparation and merge,
//! with in-memory collaborators and with real files on disk.

use std::collections::HashMap;
use std::path::Path;
use surfmerge_core::{Error, Point3d, Result, TriangleMesh};
use surfmerge_pipeline::*;
use surfmerge_simplification::{MeshingParameters, Simplifier, SurfaceIndex};

/// Serves meshes from memory by name
struct MemoryLoader(HashMap<String, TriangleMesh>);

impl MemoryLoader {
    fn new(meshes: Vec<(&str, TriangleMesh)>) -> Self {
        Self(meshes.into_iter().map(|(n, m)| (n.to_string(), m)).collect())
    }
}

impl MeshLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<TriangleMesh> {
        let key = path.to_string_lossy();
        self.0
            .get(key.as_ref())
            .cloned()
            .ok_or_else(|| Error::load(path, "no such mesh"))
    }
}

/// Returns its input untouched
struct Passthrough;

impl Simplifier for Passthrough {
    fn simplify(&self, mesh: &TriangleMesh, _: &SurfaceIndex, _: &MeshingParameters, _: bool) -> TriangleMesh {
        mesh.clone()
    }
}

fn triangle(scale: f64) -> TriangleMesh {
    TriangleMesh::from_vertices_and_faces(
        vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(scale, 0.0, 0.0),
            Point3d::new(0.0, scale, 0.0),
        ],
        vec![[0, 1, 2]],
    )
}

fn four_vertex_mesh() -> TriangleMesh {
    TriangleMesh::from_vertices_and_faces(
        vec![
            Point3d::new(10.0, 0.0, 0.0),
            Point3d::new(11.0, 0.0, 0.0),
            Point3d::new(11.0, 1.0, 0.0),
            Point3d::new(10.0, 1.0, 1.0),
        ],
        vec![[1, 2, 3]],
    )
}

fn plane_grid(size: usize, scale: f64) -> TriangleMesh {
    let mut vertices = Vec::new();
    for y in 0..size {
        for x in 0..size {
            vertices.push(Point3d::new(x as f64 * scale, y as f64 * scale, 0.0));
        }
    }
    let mut faces = Vec::new();
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            let br = bl + 1;
            faces.push([tl, bl, tr]);
            faces.push([tr, bl, br]);
        }
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

fn passthrough_pipeline(meshes: Vec<(&str, TriangleMesh)>, config: PipelineConfig) -> BatchPipeline<MemoryLoader, Passthrough> {
    BatchPipeline::with_parts(config, MemoryLoader::new(meshes), Passthrough)
}

#[test]
fn test_two_mesh_round_trip() {
    let pipeline = passthrough_pipeline(
        vec![("a", triangle(1.0)), ("b", four_vertex_mesh())],
        PipelineConfig::default(),
    );
    let merged = pipeline
        .run(&[MeshDescriptor::new("a"), MeshDescriptor::new("b")])
        .unwrap();

    assert_eq!(merged.vertices().len(), 7);
    assert_eq!(merged.faces().len(), 2);
    assert_eq!(merged.faces()[0], [0, 1, 2]);
    assert_eq!(merged.faces()[1], [1 + 3, 2 + 3, 3 + 3]);
    assert_eq!(merged.tags(), &[0, 0]);
    assert_eq!(merged.bounding_boxes.len(), 2);
    assert_eq!(merged.bbox_mins()[1], Point3d::new(10.0, 0.0, 0.0));
}

#[test]
fn test_offset_invariant() {
    let meshes = vec![
        ("g3", plane_grid(3, 1.0)),
        ("t", triangle(2.0)),
        ("g5", plane_grid(5, 0.1)),
        ("q", four_vertex_mesh()),
    ];
    let counts: Vec<(usize, usize)> = meshes.iter().map(|(_, m)| (m.vertex_count(), m.face_count())).collect();
    let names: Vec<MeshDescriptor> = meshes.iter().map(|(n, _)| MeshDescriptor::new(*n)).collect();
    let merged = passthrough_pipeline(meshes, PipelineConfig::default()).run(&names).unwrap();

    let mut offset = 0;
    let mut face_start = 0;
    for (i, (vertex_count, face_count)) in counts.iter().enumerate() {
        assert_eq!(merged.vertex_offsets[i], offset);
        for face in &merged.faces()[face_start..face_start + face_count] {
            for &v in face {
                assert!(v >= offset && v < offset + vertex_count);
            }
        }
        offset += vertex_count;
        face_start += face_count;
    }
    assert_eq!(merged.vertices().len(), offset);
    assert_eq!(merged.tags().len(), merged.faces().len());
    assert!(merged.tags().iter().all(|&t| t == 0));
}

#[test]
fn test_second_of_three_fails_to_load() {
    for parallel in [false, true] {
        let config = PipelineConfig { parallel, ..Default::default() };
        let pipeline = passthrough_pipeline(vec![("a", triangle(1.0)), ("c", triangle(3.0))], config);
        let err = pipeline
            .run(&[MeshDescriptor::new("a"), MeshDescriptor::new("missing"), MeshDescriptor::new("c")])
            .unwrap_err();

        assert_eq!(err.failed_index(), Some(1));
        assert_eq!(err.bounding_boxes().len(), 1);
        assert_eq!(err.bounding_boxes()[0].max, Point3d::new(1.0, 1.0, 0.0));
        match err {
            PipelineError::Mesh { name, source: Error::Load { .. }, .. } => assert_eq!(name, "missing"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}

#[test]
fn test_degenerate_mesh_fails_parameter_init() {
    let point = Point3d::new(1.0, 1.0, 1.0);
    let collapsed = TriangleMesh::from_vertices_and_faces(vec![point, point, point], vec![[0, 1, 2]]);
    let pipeline = passthrough_pipeline(vec![("ok", triangle(1.0)), ("flat", collapsed)], PipelineConfig::default());

    let err = pipeline
        .run(&[MeshDescriptor::new("ok"), MeshDescriptor::new("flat")])
        .unwrap_err();
    assert!(matches!(err, PipelineError::Mesh { index: 1, source: Error::ParamInit(_), .. }));
    assert_eq!(err.bounding_boxes().len(), 1);
}

#[test]
fn test_duplicate_entries_are_merged_once() {
    let pipeline = passthrough_pipeline(vec![("a", triangle(1.0)), ("b", triangle(2.0))], PipelineConfig::default());
    let entries = vec![
        RawFileEntry::named("a").with_epsilon(0.01),
        RawFileEntry::named("b"),
        RawFileEntry::named("a").with_skip_simplify(true),
    ];
    let merged = pipeline.run_entries(&entries).unwrap();
    assert_eq!(merged.mesh_count(), 2);
    assert_eq!(merged.vertices().len(), 6);
}

#[test]
fn test_strict_policy_surfaces_config_error() {
    let config = PipelineConfig { field_policy: FieldPolicy::Strict, ..Default::default() };
    let pipeline = passthrough_pipeline(vec![("a", triangle(1.0))], config);
    let err = pipeline
        .run_json(r#"{"files": [{"name": "a", "epsa": "tiny"}]}"#)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(Error::Config(_))));
    assert!(err.bounding_boxes().is_empty());
}

#[test]
fn test_tag_policies_end_to_end() {
    let mut tagged = triangle(1.0);
    tagged.set_tags(vec![9]);
    let meshes = || vec![("a", tagged.clone()), ("b", four_vertex_mesh())];
    let names = [MeshDescriptor::new("a"), MeshDescriptor::new("b")];

    let reset = passthrough_pipeline(meshes(), PipelineConfig::default()).run(&names).unwrap();
    assert_eq!(reset.tags(), &[0, 0]);

    let config = PipelineConfig { tag_policy: TagPolicy::Preserve, ..Default::default() };
    let preserved = passthrough_pipeline(meshes(), config).run(&names).unwrap();
    // The untagged mesh was normalized to default tags during preparation
    assert_eq!(preserved.tags(), &[9, 0]);

    let config = PipelineConfig { tag_policy: TagPolicy::MeshIndex, ..Default::default() };
    let indexed = passthrough_pipeline(meshes(), config).run(&names).unwrap();
    assert_eq!(indexed.tags(), &[0, 1]);
}

#[test]
fn test_thresholds_follow_each_mesh_scale() {
    // Thresholds are relative, so both scales are reduced the same way
    let mut config = PipelineConfig::default();
    config.parameters.ideal_edge_length_rel = 1.0;
    let pipeline = BatchPipeline::new(config).with_loader(MemoryLoader::new(vec![
        ("small", plane_grid(8, 0.001)),
        ("large", plane_grid(8, 1000.0)),
    ]));
    let prepared = pipeline
        .prepare_all(&[MeshDescriptor::new("small"), MeshDescriptor::new("large")])
        .unwrap();

    for mesh in &prepared {
        assert!(mesh.face_count() < 98);
        assert!(mesh.face_count() >= 2);
        assert_eq!(mesh.mesh.tags.as_ref().map(Vec::len), Some(mesh.face_count()));
    }
    approx::assert_relative_eq!(prepared[0].bounding_box.max.x, 0.007, epsilon = 1e-12);
    approx::assert_relative_eq!(prepared[1].bounding_box.max.x, 7000.0);
}

#[test]
fn test_skip_simplify_keeps_faces() {
    let pipeline = BatchPipeline::default().with_loader(MemoryLoader::new(vec![("g", plane_grid(6, 1.0))]));
    let mut descriptor = MeshDescriptor::new("g");
    descriptor.skip_simplify = true;
    let merged = pipeline.run(&[descriptor]).unwrap();
    assert_eq!(merged.faces().len(), 50);
    assert_eq!(merged.vertices().len(), 36);
}

#[test]
fn test_parallel_matches_sequential() {
    let meshes = || {
        vec![
            ("g3", plane_grid(3, 1.0)),
            ("t", triangle(2.0)),
            ("g6", plane_grid(6, 0.5)),
            ("q", four_vertex_mesh()),
        ]
    };
    let names = [
        MeshDescriptor::new("g3"),
        MeshDescriptor::new("t"),
        MeshDescriptor::new("g6"),
        MeshDescriptor::new("q"),
    ];
    let mut config = PipelineConfig { tag_policy: TagPolicy::MeshIndex, ..Default::default() };
    config.parameters.ideal_edge_length_rel = 1.0;

    let sequential = BatchPipeline::new(config.clone())
        .with_loader(MemoryLoader::new(meshes()))
        .run(&names)
        .unwrap();
    config.parallel = true;
    let parallel = BatchPipeline::new(config)
        .with_loader(MemoryLoader::new(meshes()))
        .run(&names)
        .unwrap();

    assert_eq!(parallel.vertex_offsets, sequential.vertex_offsets);
    assert_eq!(parallel.faces(), sequential.faces());
    assert_eq!(parallel.tags(), sequential.tags());
    assert_eq!(parallel.vertices(), sequential.vertices());
    assert_eq!(parallel.bounding_boxes, sequential.bounding_boxes);
}

#[test]
fn test_skip_keeps_meshes_at_extreme_scales() {
    let mut distant = plane_grid(4, 1.0);
    for v in distant.vertices.iter_mut() {
        v.x += 1e12;
        v.y += 1e12;
        v.z += 1e12;
    }
    let pipeline = BatchPipeline::default().with_loader(MemoryLoader::new(vec![
        ("tiny", plane_grid(4, 1e-9)),
        ("distant", distant),
    ]));
    let mut descriptors = [MeshDescriptor::new("tiny"), MeshDescriptor::new("distant")];
    for d in descriptors.iter_mut() {
        d.skip_simplify = true;
    }

    let merged = pipeline.run(&descriptors).unwrap();
    assert_eq!(merged.vertex_offsets, vec![0, 16]);
    assert_eq!(merged.faces().len(), 36);
    assert_eq!(merged.vertices().len(), 32);
}

#[test]
fn test_target_edge_length_controls_reduction() {
    let pipeline = BatchPipeline::default().with_loader(MemoryLoader::new(vec![
        ("fine", plane_grid(20, 1.0)),
        ("coarse", plane_grid(20, 1.0)),
    ]));
    let fine = RawFileEntry::named("fine").with_target_edge_length(1.0);
    let coarse = RawFileEntry::named("coarse").with_target_edge_length(10.0);
    let merged = pipeline.run_entries(&[fine, coarse]).unwrap();

    let fine_vertices = merged.vertex_offsets[1];
    assert_eq!(fine_vertices, 400);
    assert!(merged.vertices().len() - fine_vertices < 400);
    assert!(merged.faces().len() < 2 * 722);
}

#[test]
fn test_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let obj_path = dir.path().join("quad.obj");
    std::fs::write(&obj_path, "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap();

    let ply_path = dir.path().join("tagged.ply");
    std::fs::write(
        &ply_path,
        "ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\n\
element face 1\nproperty list uchar int vertex_indices\nproperty int tag\nend_header\n\
0 0 5\n2 0 5\n0 2 5\n3 0 1 2 4\n",
    )
    .unwrap();

    let batch = dir.path().join("batch.json");
    let document = serde_json::json!({
        "files": [
            {"name": obj_path.to_str().unwrap(), "skip_simplify": true},
            {"name": ply_path.to_str().unwrap(), "skip_simplify": true},
        ]
    });
    std::fs::write(&batch, document.to_string()).unwrap();

    let config = PipelineConfig { tag_policy: TagPolicy::Preserve, ..Default::default() };
    let merged = BatchPipeline::new(config).run_file(&batch).unwrap();

    assert_eq!(merged.vertices().len(), 7);
    assert_eq!(merged.faces(), &[[0, 1, 2], [0, 2, 3], [4, 5, 6]]);
    assert_eq!(merged.tags(), &[0, 0, 4]);
    assert_eq!(merged.bbox_mins()[1].z, 5.0);

    let missing = dir.path().join("absent.obj");
    let err = BatchPipeline::default()
        .run_entries(&[RawFileEntry::named(missing.to_str().unwrap())])
        .unwrap_err();
    assert!(matches!(err, PipelineError::Mesh { source: Error::Load { .. }, .. }));
}

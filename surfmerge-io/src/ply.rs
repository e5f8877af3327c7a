//! PLY format support
//!
//! Face elements may carry an integer `tag`, `label` or `region` property;
//! when every face has one it becomes the mesh's per-face tag array.

use crate::{triangulate_fan, MeshReader, MeshWriter};
use ply_rs::{
    parser::Parser,
    ply::{Addable, DefaultElement, ElementDef, Ply, Property, PropertyDef, PropertyType, ScalarType},
    writer::Writer,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use surfmerge_core::{Error, Point3d, Result, Tag, TriangleMesh};

/// Face properties recognised as per-face tags, in lookup order
const TAG_PROPERTIES: [&str; 3] = ["tag", "label", "region"];

pub struct PlyReader;
pub struct PlyWriter;

impl PlyReader {
    /// Read a mesh from any PLY byte stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<TriangleMesh> {
        let parser = Parser::<DefaultElement>::new();
        let ply = parser.read_ply(reader)?;

        // Extract vertices
        let mut vertices = Vec::new();
        if let Some(vertex_element) = ply.payload.get("vertex") {
            for vertex in vertex_element {
                let x = extract_property_value(vertex, "x")?;
                let y = extract_property_value(vertex, "y")?;
                let z = extract_property_value(vertex, "z")?;
                vertices.push(Point3d::new(x, y, z));
            }
        }

        // Extract faces, fanning polygons and repeating the tag per triangle
        let mut faces = Vec::new();
        let mut tags = Vec::new();
        let mut all_tagged = true;
        if let Some(face_element) = ply.payload.get("face") {
            for face in face_element {
                let indices = extract_face_indices(face)?;
                let added = triangulate_fan(&indices, &mut faces);
                match extract_tag(face) {
                    Some(tag) => tags.extend(std::iter::repeat(tag).take(added)),
                    None => all_tagged = false,
                }
            }
        }

        let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
        if all_tagged && !mesh.faces.is_empty() {
            mesh.set_tags(tags);
        }
        Ok(mesh)
    }
}

impl MeshReader for PlyReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

impl MeshWriter for PlyWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut ply = Ply::<DefaultElement>::new();

        // Define vertex element
        let mut vertex_element = ElementDef::new("vertex".to_string());
        vertex_element.count = mesh.vertices.len();
        for axis in ["x", "y", "z"] {
            vertex_element.properties.add(PropertyDef::new(
                axis.to_string(),
                PropertyType::Scalar(ScalarType::Double),
            ));
        }
        ply.header.elements.add(vertex_element);

        // Define face element
        let mut face_element = ElementDef::new("face".to_string());
        face_element.count = mesh.faces.len();
        face_element.properties.add(PropertyDef::new(
            "vertex_indices".to_string(),
            PropertyType::List(ScalarType::UChar, ScalarType::Int),
        ));
        if mesh.tags.is_some() {
            face_element.properties.add(PropertyDef::new(
                "tag".to_string(),
                PropertyType::Scalar(ScalarType::Int),
            ));
        }
        ply.header.elements.add(face_element);

        let vertices = mesh
            .vertices
            .iter()
            .map(|v| {
                let mut element = DefaultElement::new();
                element.insert("x".to_string(), Property::Double(v.x));
                element.insert("y".to_string(), Property::Double(v.y));
                element.insert("z".to_string(), Property::Double(v.z));
                element
            })
            .collect();
        ply.payload.insert("vertex".to_string(), vertices);

        let mut faces = Vec::with_capacity(mesh.faces.len());
        for (fi, face) in mesh.faces.iter().enumerate() {
            let mut element = DefaultElement::new();
            let indices = face
                .iter()
                .map(|&i| {
                    i32::try_from(i).map_err(|_| {
                        Error::InvalidData(format!("vertex index {} does not fit in a PLY int", i))
                    })
                })
                .collect::<Result<Vec<i32>>>()?;
            element.insert("vertex_indices".to_string(), Property::ListInt(indices));
            if let Some(tags) = &mesh.tags {
                element.insert("tag".to_string(), Property::Int(tags[fi]));
            }
            faces.push(element);
        }
        ply.payload.insert("face".to_string(), faces);

        let writer_instance = Writer::new();
        writer_instance.write_ply(&mut writer, &mut ply)?;

        Ok(())
    }
}

/// Extract a property value as f64 from a PLY element
fn extract_property_value(element: &DefaultElement, name: &str) -> Result<f64> {
    match element.get(name) {
        Some(Property::Float(val)) => Ok(*val as f64),
        Some(Property::Double(val)) => Ok(*val),
        Some(Property::Int(val)) => Ok(*val as f64),
        Some(Property::UInt(val)) => Ok(*val as f64),
        Some(Property::Short(val)) => Ok(*val as f64),
        Some(Property::UShort(val)) => Ok(*val as f64),
        _ => Err(Error::InvalidData(format!(
            "Property '{}' not found or invalid type",
            name
        ))),
    }
}

/// Extract face indices from a PLY face element
fn extract_face_indices(element: &DefaultElement) -> Result<Vec<usize>> {
    let to_index = |idx: i64| {
        usize::try_from(idx).map_err(|_| Error::InvalidData(format!("negative face index {}", idx)))
    };
    match element.get("vertex_indices").or_else(|| element.get("vertex_index")) {
        Some(Property::ListInt(indices)) => indices.iter().map(|&i| to_index(i as i64)).collect(),
        Some(Property::ListUInt(indices)) => Ok(indices.iter().map(|&i| i as usize).collect()),
        Some(Property::ListUShort(indices)) => Ok(indices.iter().map(|&i| i as usize).collect()),
        Some(Property::ListShort(indices)) => indices.iter().map(|&i| to_index(i as i64)).collect(),
        _ => Err(Error::InvalidData("Face indices not found".to_string())),
    }
}

fn extract_tag(element: &DefaultElement) -> Option<Tag> {
    TAG_PROPERTIES.iter().find_map(|name| match element.get(*name)? {
        Property::Char(v) => Some(*v as Tag),
        Property::UChar(v) => Some(*v as Tag),
        Property::Short(v) => Some(*v as Tag),
        Property::UShort(v) => Some(*v as Tag),
        Property::Int(v) => Some(*v),
        Property::UInt(v) => Tag::try_from(*v).ok(),
        _ => None,
    })
}

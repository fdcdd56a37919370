use std::collections::HashMap;
use std::io::Read;
use std::path::{Component, Path};

use glam::{Vec2, Vec3};
use tracing::{debug, warn};

use crate::atlas::HashingReader;
use crate::error::{AtlasError, Result};
use crate::resource::Identifier;
use crate::types::{Face, FacePoint, Group, Material, Model};

/// Load an OBJ file and its MTL library into a [`Model`].
///
/// Every OBJ object/group becomes a [`Group`]; objects split by material are
/// merged back under one name. Texture identifiers are relative to the OBJ's
/// directory.
pub fn load_obj(path: &Path) -> Result<Model> {
    let file = std::fs::File::open(path)?;
    let mut reader = HashingReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let hash = reader.finish();

    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ..Default::default()
    };
    let (objects, materials_result) = tobj::load_obj(path, &options)
        .map_err(|e| AtlasError::Input(format!("Failed to load OBJ: {e}")))?;

    debug!(object_count = objects.len(), "Loaded OBJ objects");

    let tobj_materials = match materials_result {
        Ok(mats) => mats,
        Err(e) => {
            warn!("Failed to load MTL: {e}");
            Vec::new()
        }
    };

    let mut model = Model {
        location: model_location(path),
        hash,
        materials: convert_materials(&tobj_materials),
        ..Default::default()
    };

    // tobj pads missing vt/vn slots with filler indices, so attribute
    // presence comes from the face records themselves.
    let mut attributes = scan_face_attributes(&String::from_utf8_lossy(&bytes));
    let triangles: usize = objects.iter().map(|o| o.mesh.indices.len() / 3).sum();
    if attributes.len() != triangles {
        warn!(
            scanned = attributes.len(),
            triangles, "Face records do not match triangulated faces; dropping texcoords and normals"
        );
        attributes = vec![FaceAttributes::default(); triangles];
    }
    let mut attributes = attributes.into_iter();

    let mut group_index: HashMap<String, usize> = HashMap::new();
    for object in objects {
        let material = object
            .mesh
            .material_id
            .and_then(|id| tobj_materials.get(id))
            .map(|m| m.name.clone())
            .unwrap_or_default();

        let group = *group_index.entry(object.name.clone()).or_insert_with(|| {
            model.groups.push(Group {
                name: object.name.clone(),
                faces: Vec::new(),
            });
            model.groups.len() - 1
        });

        let first_face = model.faces.len();
        append_mesh(&mut model, &object.mesh, &material, &mut attributes);
        model.groups[group].faces.extend(first_face..model.faces.len());
    }

    debug!(
        location = %model.location,
        faces = model.faces.len(),
        groups = model.groups.len(),
        materials = model.materials.len(),
        "Converted OBJ"
    );
    Ok(model)
}

/// Which optional attributes every corner of a face record carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FaceAttributes {
    texcoords: bool,
    normals: bool,
}

/// Attribute presence for every triangle the `f` records of `source`
/// triangulate into, in file order.
///
/// A polygon of `n` corners yields `n - 2` entries. An attribute counts as
/// present only when every corner of the record has it.
fn scan_face_attributes(source: &str) -> Vec<FaceAttributes> {
    let mut out = Vec::new();
    for line in source.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("f") {
            continue;
        }
        let corners: Vec<&str> = tokens.collect();
        let has = |slot: usize| {
            !corners.is_empty()
                && corners
                    .iter()
                    .all(|c| c.split('/').nth(slot).is_some_and(|s| !s.is_empty()))
        };
        let attrs = FaceAttributes {
            texcoords: has(1),
            normals: has(2),
        };
        out.extend(std::iter::repeat_n(attrs, corners.len().saturating_sub(2)));
    }
    out
}

/// Append one tobj mesh's arrays and triangles to `model`.
///
/// `attributes` yields one entry per triangle, shared across meshes in
/// file order.
fn append_mesh(
    model: &mut Model,
    mesh: &tobj::Mesh,
    material: &str,
    attributes: &mut impl Iterator<Item = FaceAttributes>,
) {
    let vertex_base = model.vertices.len() as u32;
    let texcoord_base = model.texcoords.len() as u32;
    let normal_base = model.normals.len() as u32;

    model.vertices.extend(
        mesh.positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2])),
    );
    model
        .texcoords
        .extend(mesh.texcoords.chunks_exact(2).map(|t| Vec2::new(t[0], t[1])));
    model.normals.extend(
        mesh.normals
            .chunks_exact(3)
            .map(|n| Vec3::new(n[0], n[1], n[2])),
    );

    for (tri, corners) in mesh.indices.chunks_exact(3).enumerate() {
        let attrs = attributes.next().unwrap_or_default();
        let point = |k: usize| {
            let i = tri * 3 + k;
            let texcoord = mesh
                .texcoord_indices
                .get(i)
                .filter(|_| attrs.texcoords)
                .map(|&t| texcoord_base + t);
            let normal = mesh
                .normal_indices
                .get(i)
                .filter(|_| attrs.normals)
                .map(|&n| normal_base + n);
            FacePoint::new(vertex_base + corners[k], texcoord, normal)
        };
        model.faces.push(Face {
            material: material.to_string(),
            points: [point(0), point(1), point(2)],
        });
    }
}

/// Convert tobj materials: `map_Kd` gives a textured material, otherwise
/// `Kd` gives a flat colour. `d` becomes alpha.
fn convert_materials(tobj_mats: &[tobj::Material]) -> HashMap<String, Material> {
    tobj_mats
        .iter()
        .map(|mat| {
            let [r, g, b] = mat.diffuse.unwrap_or([1.0, 1.0, 1.0]);
            let color = [r, g, b, mat.dissolve.unwrap_or(1.0)];
            let material = match &mat.diffuse_texture {
                Some(tex) => Material::Textured {
                    texture: Identifier::new(tex.replace('\\', "/")),
                    diffuse: color,
                },
                None => Material::FlatColor {
                    color,
                    darken: None,
                },
            };
            (mat.name.clone(), material)
        })
        .collect()
}

/// Cache-friendly location string: the path's normal components joined
/// with `/`.
fn model_location(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

//! Per-group vertex buffer assembly.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use regex::Regex;
use tracing::{debug, info};

use crate::atlas::TextureSheet;
use crate::error::{AtlasError, Result};
use crate::report::BuildReport;
use crate::types::{Model, darken_multiplicative};

/// One vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct VertexRecord {
    pub position: [f32; 3],
    /// 1 when `normal` came from the model, 0 when it is zero-filled.
    pub has_normal: u32,
    pub normal: [f32; 3],
    /// Atlas-space texture coordinate.
    pub uv: [f32; 2],
    /// Tint `[r, g, b, a]`.
    pub color: [f32; 4],
}

/// Contiguous vertex range drawn for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRange {
    pub name: String,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

/// Interleaved vertices for every drawable group, in group order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexBuffer {
    records: Vec<VertexRecord>,
    groups: Vec<GroupRange>,
}

impl VertexBuffer {
    pub fn records(&self) -> &[VertexRecord] {
        &self.records
    }

    pub fn groups(&self) -> &[GroupRange] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&GroupRange> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn vertex_count(&self) -> usize {
        self.records.len()
    }

    /// Vertices of one group.
    pub fn group_records(&self, name: &str) -> &[VertexRecord] {
        match self.group(name) {
            Some(g) => {
                let start = g.first_vertex as usize;
                &self.records[start..start + g.vertex_count as usize]
            }
            None => &[],
        }
    }

    /// Ranges for the named groups, skipping names that are not present.
    pub fn ranges_for<'a, I>(&self, names: I) -> Vec<GroupRange>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter_map(|n| self.group(n).cloned())
            .collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }
}

/// Group-name patterns for particle emitters, which are never drawn.
///
/// Each pattern must match the whole group name.
#[derive(Debug, Clone)]
pub struct ParticleFilter {
    patterns: Vec<Regex>,
}

impl ParticleFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{p})$")).map_err(|source| AtlasError::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// A filter that excludes nothing.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn is_particle(&self, group: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(group))
    }
}

/// Build the vertex buffer for every non-particle group of `model`, then
/// release the model's raw geometry.
///
/// Faces whose material is missing are skipped and reported once per name.
/// Faces whose texture could not be loaded are kept with UV `(0, 0)`.
pub fn assemble(
    model: &mut Model,
    sheet: &TextureSheet,
    filter: &ParticleFilter,
    report: &mut BuildReport,
) -> VertexBuffer {
    let mut out = VertexBuffer::default();
    let mut skipped_groups = 0usize;

    for group in &model.groups {
        if filter.is_particle(&group.name) {
            debug!(group = %group.name, "Skipping particle emitter group");
            skipped_groups += 1;
            continue;
        }

        let first_vertex = out.records.len() as u32;
        for &face_idx in &group.faces {
            let Some(face) = model.faces.get(face_idx) else {
                continue;
            };
            let name = face.material.as_str();
            let Some(material) = model.material(name) else {
                report.missing_material(name);
                continue;
            };

            let diffuse = material.diffuse();
            let base = if sheet.is_flat_material(name) {
                [1.0, 1.0, 1.0]
            } else {
                [diffuse[0], diffuse[1], diffuse[2]]
            };
            let [r, g, b] = darken_multiplicative(base, model.darken);
            let color = [r, g, b, diffuse[3]];

            let offset = sheet.face_offset(face_idx).as_vec2();
            for point in &face.points {
                let local = match model.texcoord(point) {
                    Some(t) => Vec2::new(t.x - offset.x, -t.y - offset.y),
                    None => Vec2::ZERO,
                };
                let uv = sheet.map_uv(name, local).unwrap_or(Vec2::ZERO);
                let normal = model.normal(point);

                out.records.push(VertexRecord {
                    position: model.vertex(point).to_array(),
                    has_normal: u32::from(normal.is_some()),
                    normal: normal.unwrap_or_default().to_array(),
                    uv: uv.to_array(),
                    color,
                });
            }
        }

        out.groups.push(GroupRange {
            name: group.name.clone(),
            first_vertex,
            vertex_count: out.records.len() as u32 - first_vertex,
        });
    }

    info!(
        groups = out.groups.len(),
        skipped_groups,
        vertices = out.records.len(),
        "Assembled vertex buffer"
    );
    model.release_geometry();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AtlasConfig, DEFAULT_PARTICLE_PATTERNS};
    use crate::resource::MemoryResolver;
    use crate::types::{Face, FacePoint, Group, Material};
    use approx::assert_relative_eq;
    use glam::Vec3;
    use image::RgbaImage;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(w, h, |x, y| image::Rgba([(x * 9) as u8, (y * 9) as u8, 3, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn face(material: &str, texcoords: bool, normals: bool) -> Face {
        let point = |i: u32| {
            FacePoint::new(
                i,
                texcoords.then_some(i),
                normals.then_some(0),
            )
        };
        Face {
            material: material.into(),
            points: [point(0), point(1), point(2)],
        }
    }

    fn model() -> Model {
        Model {
            location: "models/loco.obj".into(),
            hash: 5,
            darken: 0.1,
            groups: vec![
                Group {
                    name: "body".into(),
                    faces: vec![0, 1],
                },
                Group {
                    name: "LOCO_EXHAUST_1".into(),
                    faces: vec![0],
                },
                Group {
                    name: "trim".into(),
                    faces: vec![2, 3],
                },
            ],
            materials: [
                (
                    "wood".to_string(),
                    Material::Textured {
                        texture: "wood.png".into(),
                        diffuse: [0.5, 0.4, 1.0, 0.8],
                    },
                ),
                ("paint".to_string(), Material::flat([0.2, 0.6, 1.0, 1.0])),
            ]
            .into(),
            faces: vec![
                face("wood", true, true),
                face("paint", true, false),
                face("wood", false, false),
                face("ghost", true, true),
            ],
            vertices: vec![Vec3::X, Vec3::Y, Vec3::Z],
            normals: vec![Vec3::Z],
            texcoords: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
            ],
        }
    }

    fn sheet(model: &Model, dir: &std::path::Path) -> TextureSheet {
        let mut resolver = MemoryResolver::new();
        resolver.insert("wood.png", png(16, 16));
        let config = AtlasConfig {
            cache_dir: dir.to_path_buf(),
            ..Default::default()
        };
        let mut report = BuildReport::new();
        TextureSheet::build(model, None, &resolver, 4096, &config, &mut report).unwrap()
    }

    fn default_filter() -> ParticleFilter {
        ParticleFilter::new(DEFAULT_PARTICLE_PATTERNS).unwrap()
    }

    #[test]
    fn record_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<VertexRecord>(), 52);
    }

    #[test]
    fn particle_patterns_match_whole_name() {
        let filter = default_filter();
        assert!(filter.is_particle("LOCO_EXHAUST_1"));
        assert!(filter.is_particle("CHIMNEY_2_smoke"));
        assert!(filter.is_particle("PRESSURE_VALVE_3"));
        assert!(filter.is_particle("old_CHIMINEY_0"));
        assert!(!filter.is_particle("EXHAUST_pipe"));
        assert!(!filter.is_particle("body"));
        assert!(!ParticleFilter::none().is_particle("CHIMNEY_1"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = ParticleFilter::new(&["(unclosed"]).unwrap_err();
        assert!(matches!(err, AtlasError::InvalidPattern { .. }));
    }

    #[test]
    fn particle_groups_contribute_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        let sheet = sheet(&m, tmp.path());
        let mut report = BuildReport::new();

        let vb = assemble(&mut m, &sheet, &default_filter(), &mut report);
        assert!(vb.group("LOCO_EXHAUST_1").is_none());
        let names: Vec<_> = vb.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["body", "trim"]);
    }

    #[test]
    fn missing_material_faces_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        let sheet = sheet(&m, tmp.path());
        let mut report = BuildReport::new();

        let vb = assemble(&mut m, &sheet, &default_filter(), &mut report);
        let trim = vb.group("trim").unwrap();
        assert_eq!(trim.first_vertex, 6);
        assert_eq!(trim.vertex_count, 3);
        assert_eq!(vb.vertex_count(), 9);
        assert!(report.is_missing("ghost"));
    }

    #[test]
    fn tint_uses_white_for_flat_and_diffuse_otherwise() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        let sheet = sheet(&m, tmp.path());
        let mut report = BuildReport::new();

        let vb = assemble(&mut m, &sheet, &default_filter(), &mut report);
        let body = vb.group_records("body");
        // darken 0.1 -> multiplier 0.5
        let wood = body[0].color;
        assert_relative_eq!(wood[0], 0.25);
        assert_relative_eq!(wood[1], 0.2);
        assert_relative_eq!(wood[2], 0.5);
        assert_relative_eq!(wood[3], 0.8);

        let paint = body[3].color;
        assert_eq!(paint, [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn normals_flagged_and_zero_filled() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        let sheet = sheet(&m, tmp.path());
        let mut report = BuildReport::new();

        let vb = assemble(&mut m, &sheet, &default_filter(), &mut report);
        let body = vb.group_records("body");
        assert_eq!(body[0].has_normal, 1);
        assert_eq!(body[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(body[3].has_normal, 0);
        assert_eq!(body[3].normal, [0.0; 3]);
        assert_eq!(body[1].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn uvs_are_mapped_into_atlas() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        let sheet = sheet(&m, tmp.path());
        assert_eq!((sheet.width(), sheet.height()), (24, 16));
        let mut report = BuildReport::new();

        let vb = assemble(&mut m, &sheet, &default_filter(), &mut report);
        let body = vb.group_records("body");
        // Face offset v = -1: (1, 1) -> local (1, 0).
        assert_relative_eq!(body[2].uv[0], 16.0 / 24.0);
        assert_relative_eq!(body[2].uv[1], 0.0);
        // (0, 0) -> local (0, 1).
        assert_relative_eq!(body[0].uv[0], 0.0);
        assert_relative_eq!(body[0].uv[1], 1.0);

        // Flat swatch: every vertex samples the swatch centre.
        for rec in &body[3..6] {
            assert_relative_eq!(rec.uv[0], 20.0 / 24.0);
            assert_relative_eq!(rec.uv[1], 4.0 / 16.0);
        }

        // No texcoords: local (0, 0).
        let trim = vb.group_records("trim");
        assert_eq!(trim[0].uv, [0.0, 0.0]);
    }

    #[test]
    fn geometry_released_after_assembly() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        let sheet = sheet(&m, tmp.path());
        let mut report = BuildReport::new();

        let vb = assemble(&mut m, &sheet, &default_filter(), &mut report);
        assert!(!m.has_geometry());
        assert_eq!(m.groups.len(), 3);
        assert_eq!(vb.as_bytes().len(), vb.vertex_count() * 52);
    }

    #[test]
    fn ranges_for_skips_unknown_groups() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = model();
        let sheet = sheet(&m, tmp.path());
        let mut report = BuildReport::new();

        let vb = assemble(&mut m, &sheet, &default_filter(), &mut report);
        let ranges = vb.ranges_for(["trim", "nope", "LOCO_EXHAUST_1"]);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].name, "trim");
    }
}

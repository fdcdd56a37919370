//! Collect one SubTexture per distinct material key and fold its content
//! into the sheet hash.

use std::collections::{HashMap, HashSet};
use std::io::{self, Read};

use glam::Vec2;
use image::RgbaImage;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::report::{BuildReport, BuildWarning};
use crate::resource::{Identifier, ResolveError, ResourceResolver};
use crate::types::{Material, Model, darken_subtractive, pack_argb};

use super::sub_texture::SubTexture;
use super::wrap::{FaceOffset, face_extent};

/// Everything gathered from the model before packing.
#[derive(Debug, Default)]
pub struct Collection {
    /// SubTextures in first-use order.
    pub sub_textures: Vec<SubTexture>,
    /// SubTexture key to index in `sub_textures`.
    pub index: HashMap<String, usize>,
    /// Material name to SubTexture key, for materials that resolved.
    pub materials: HashMap<String, String>,
    /// Tile offset for every face of the model.
    pub face_offsets: Vec<FaceOffset>,
    /// Model hash plus every SubTexture's content contribution.
    pub hash: u64,
}

impl Collection {
    fn insert(&mut self, sub: SubTexture) -> usize {
        let idx = self.sub_textures.len();
        self.index.insert(sub.key().to_string(), idx);
        self.sub_textures.push(sub);
        idx
    }
}

/// Key under which a flat material's swatch is collected.
pub fn flat_key(material_name: &str) -> String {
    format!("generated:{material_name}")
}

/// Walk every face of every group and collect its material's SubTexture.
///
/// Missing materials and unloadable textures are recorded in `report` and
/// their faces skipped. The only hard failure is a face whose tile offset
/// does not fit a [`super::wrap::TileOffset`].
pub fn collect(
    model: &Model,
    prefix: Option<&str>,
    resolver: &dyn ResourceResolver,
    report: &mut BuildReport,
) -> Result<Collection> {
    let mut out = Collection {
        face_offsets: vec![FaceOffset::default(); model.face_count()],
        hash: model.hash,
        ..Default::default()
    };
    let mut failed: HashSet<String> = HashSet::new();
    let mut texcoords: Vec<Vec2> = Vec::with_capacity(3);

    for group in &model.groups {
        for &face_idx in &group.faces {
            let Some(face) = model.faces.get(face_idx) else {
                continue;
            };
            let name = face.material.as_str();
            if report.is_missing(name) {
                continue;
            }
            let Some(material) = model.material(name) else {
                report.missing_material(name);
                continue;
            };

            match material {
                Material::Textured { texture, .. } => {
                    let key = texture.to_string();
                    if failed.contains(&key) {
                        continue;
                    }
                    let idx = match out.index.get(&key) {
                        Some(&idx) => idx,
                        None => {
                            let primary = texture.with_prefix(prefix.unwrap_or(""));
                            match load_texture(resolver, &primary, texture) {
                                Ok((image, content_hash)) => {
                                    out.hash = out.hash.wrapping_add(content_hash);
                                    debug!(
                                        key = %key,
                                        width = image.width(),
                                        height = image.height(),
                                        "Collected texture"
                                    );
                                    out.insert(SubTexture::from_image(key.clone(), image))
                                }
                                Err(reason) => {
                                    report.push(BuildWarning::TextureUnavailable {
                                        key: key.clone(),
                                        reason,
                                    });
                                    failed.insert(key);
                                    continue;
                                }
                            }
                        }
                    };
                    out.materials.insert(name.to_string(), key);

                    texcoords.clear();
                    texcoords.extend(face.points.iter().filter_map(|p| model.texcoord(p)));
                    if let Some(extent) = face_extent(&texcoords) {
                        out.sub_textures[idx].extend(&extent.bounds);
                        out.face_offsets[face_idx] = FaceOffset::checked(face_idx, extent.offset)?;
                    }
                }
                Material::FlatColor { color, darken } => {
                    let key = flat_key(name);
                    if !out.index.contains_key(&key) {
                        let rgba = darken_subtractive(*color, darken.unwrap_or(model.darken));
                        let argb = pack_argb(rgba);
                        out.hash = out.hash.wrapping_add(u64::from(argb));
                        debug!(key = %key, argb = format_args!("{argb:#010x}"), "Collected swatch");
                        out.insert(SubTexture::swatch(key.clone(), rgba));
                    }
                    out.materials.insert(name.to_string(), key);
                }
            }
        }
    }

    Ok(out)
}

/// Open `primary`, falling back to `fallback` when it does not exist, and
/// decode it while hashing the raw bytes.
fn load_texture(
    resolver: &dyn ResourceResolver,
    primary: &Identifier,
    fallback: &Identifier,
) -> std::result::Result<(RgbaImage, u64), String> {
    let stream = match resolver.open(primary) {
        Ok(stream) => stream,
        Err(e) if e.is_not_found() && primary != fallback => {
            debug!(primary = %primary, fallback = %fallback, "Falling back to base texture");
            resolver.open(fallback).map_err(|e| e.to_string())?
        }
        Err(e) => return Err(e.to_string()),
    };

    let mut reader = HashingReader::new(stream);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| {
        ResolveError::Io {
            id: primary.clone(),
            source: e,
        }
        .to_string()
    })?;
    let content_hash = reader.finish();

    let image = image::load_from_memory(&bytes)
        .map_err(|e| format!("failed to decode: {e}"))?
        .to_rgba8();
    Ok((image, content_hash))
}

/// Reader adapter feeding every byte read through SHA-256.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// First eight digest bytes as a little-endian integer.
    pub fn finish(self) -> u64 {
        let digest = self.hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(head)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryResolver;
    use crate::types::{Face, FacePoint, Group};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(w, h, |x, y| image::Rgba([x as u8 * 10, y as u8 * 10, 0, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn face(material: &str, t: [u32; 3]) -> Face {
        Face {
            material: material.into(),
            points: [
                FacePoint::new(0, Some(t[0]), None),
                FacePoint::new(1, Some(t[1]), None),
                FacePoint::new(2, Some(t[2]), None),
            ],
        }
    }

    fn model() -> Model {
        Model {
            location: "models/test.obj".into(),
            hash: 1000,
            groups: vec![Group {
                name: "body".into(),
                faces: vec![0, 1, 2, 3],
            }],
            materials: [
                ("wood".to_string(), Material::textured("tex/wood.png")),
                ("paint".to_string(), Material::flat([1.0, 0.0, 0.0, 1.0])),
            ]
            .into(),
            faces: vec![
                face("wood", [0, 1, 2]),
                face("wood", [0, 3, 2]),
                face("paint", [0, 1, 2]),
                face("ghost", [0, 1, 2]),
            ],
            vertices: vec![glam::Vec3::ZERO; 3],
            texcoords: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(3.0, 0.0),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn collects_each_key_once() {
        let mut resolver = MemoryResolver::new();
        resolver.insert("tex/wood.png", png_bytes(16, 16));
        let mut report = BuildReport::new();

        let c = collect(&model(), None, &resolver, &mut report).unwrap();
        assert_eq!(c.sub_textures.len(), 2);
        assert!(c.index.contains_key("tex/wood.png"));
        assert!(c.index.contains_key("generated:paint"));
        assert_eq!(c.materials["wood"], "tex/wood.png");
        assert_eq!(c.face_offsets.len(), 4);
    }

    #[test]
    fn wrap_extends_textured_bounds() {
        let mut resolver = MemoryResolver::new();
        resolver.insert("tex/wood.png", png_bytes(16, 16));
        let mut report = BuildReport::new();

        let c = collect(&model(), None, &resolver, &mut report).unwrap();
        let wood = &c.sub_textures[c.index["tex/wood.png"]];
        // Second face spans u in [0, 3].
        assert_eq!(wood.copies_u(), 3);
        assert_eq!(wood.copies_v(), 1);
        assert_eq!(wood.placed_width(), 48);
    }

    #[test]
    fn missing_material_warned_once() {
        let mut resolver = MemoryResolver::new();
        resolver.insert("tex/wood.png", png_bytes(4, 4));
        let mut m = model();
        m.groups.push(Group {
            name: "extra".into(),
            faces: vec![3, 3],
        });
        let mut report = BuildReport::new();

        collect(&m, None, &resolver, &mut report).unwrap();
        let missing: Vec<_> = report
            .warnings()
            .iter()
            .filter(|w| matches!(w, BuildWarning::MissingMaterial { .. }))
            .collect();
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn hash_includes_texture_and_colour() {
        let mut resolver = MemoryResolver::new();
        let bytes = png_bytes(4, 4);
        resolver.insert("tex/wood.png", bytes.clone());
        let mut report = BuildReport::new();

        let c = collect(&model(), None, &resolver, &mut report).unwrap();

        let mut reader = HashingReader::new(bytes.as_slice());
        std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
        let tex_hash = reader.finish();
        let colour = u64::from(0xFFFF_0000u32);
        assert_eq!(c.hash, 1000u64.wrapping_add(tex_hash).wrapping_add(colour));
    }

    #[test]
    fn prefix_falls_back_to_base() {
        let mut resolver = MemoryResolver::new();
        resolver.insert("tex/wood.png", png_bytes(4, 4));
        let mut report = BuildReport::new();

        let c = collect(&model(), Some("red"), &resolver, &mut report).unwrap();
        assert!(c.index.contains_key("tex/wood.png"));
        assert!(
            !report
                .warnings()
                .iter()
                .any(|w| matches!(w, BuildWarning::TextureUnavailable { .. }))
        );
    }

    #[test]
    fn prefix_variant_preferred() {
        let mut resolver = MemoryResolver::new();
        resolver.insert("tex/wood.png", png_bytes(4, 4));
        resolver.insert("tex/red/wood.png", png_bytes(8, 8));
        let mut report = BuildReport::new();

        let c = collect(&model(), Some("red"), &resolver, &mut report).unwrap();
        let wood = &c.sub_textures[c.index["tex/wood.png"]];
        assert_eq!(wood.width(), 8);
    }

    #[test]
    fn unavailable_texture_is_dropped() {
        let resolver = MemoryResolver::new();
        let mut report = BuildReport::new();

        let c = collect(&model(), Some("red"), &resolver, &mut report).unwrap();
        assert_eq!(c.sub_textures.len(), 1);
        assert!(!c.materials.contains_key("wood"));
        let unavailable = report
            .warnings()
            .iter()
            .filter(|w| matches!(w, BuildWarning::TextureUnavailable { .. }))
            .count();
        assert_eq!(unavailable, 1);
    }

    #[test]
    fn shared_unavailable_texture_is_tried_once() {
        let resolver = MemoryResolver::new();
        let mut m = model();
        m.materials
            .insert("oak".to_string(), Material::textured("tex/wood.png"));
        m.faces.push(face("oak", [0, 1, 2]));
        m.groups[0].faces.push(4);
        let mut report = BuildReport::new();

        let c = collect(&m, None, &resolver, &mut report).unwrap();
        assert!(!c.materials.contains_key("wood"));
        assert!(!c.materials.contains_key("oak"));
        let unavailable: Vec<_> = report
            .warnings()
            .iter()
            .filter(|w| matches!(w, BuildWarning::TextureUnavailable { .. }))
            .collect();
        assert_eq!(unavailable.len(), 1);
    }

    #[test]
    fn flat_swatch_is_darkened() {
        let resolver = MemoryResolver::new();
        let mut m = model();
        m.darken = 0.5;
        let mut report = BuildReport::new();

        let c = collect(&m, None, &resolver, &mut report).unwrap();
        let paint = &c.sub_textures[c.index["generated:paint"]];
        assert_eq!(paint.pixels().unwrap().get_pixel(0, 0).0, [127, 0, 0, 255]);
    }

    #[test]
    fn oversized_tile_offset_fails() {
        let mut resolver = MemoryResolver::new();
        resolver.insert("tex/wood.png", png_bytes(4, 4));
        let mut m = model();
        m.texcoords = vec![Vec2::new(500.0, 0.0); 4];
        let mut report = BuildReport::new();

        assert!(collect(&m, None, &resolver, &mut report).is_err());
    }
}

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use super::material::Material;

/// One corner of a triangle, indexing into the model's raw arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacePoint {
    pub vertex: u32,
    pub texcoord: Option<u32>,
    pub normal: Option<u32>,
}

impl FacePoint {
    pub fn new(vertex: u32, texcoord: Option<u32>, normal: Option<u32>) -> Self {
        Self {
            vertex,
            texcoord,
            normal,
        }
    }
}

/// A triangle and the name of the material it is drawn with.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub material: String,
    pub points: [FacePoint; 3],
}

/// A named, ordered list of face indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub faces: Vec<usize>,
}

/// A parsed multi-material model.
///
/// Faces, vertices, normals and texcoords are dropped by
/// [`Model::release_geometry`] once the vertex buffer has been assembled;
/// groups, materials and the hash stay available.
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Source location, used to derive cache keys (`models/loco.obj`).
    pub location: String,
    /// Content hash of the model data.
    pub hash: u64,
    /// Model-wide darken factor.
    pub darken: f32,
    pub groups: Vec<Group>,
    pub materials: HashMap<String, Material>,
    pub faces: Vec<Face>,
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Texture coordinates as stored in the source (V up).
    pub texcoords: Vec<Vec2>,
}

impl Model {
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Whether the raw arrays are still present.
    pub fn has_geometry(&self) -> bool {
        !self.faces.is_empty() || !self.vertices.is_empty()
    }

    pub fn vertex(&self, point: &FacePoint) -> Vec3 {
        self.vertices
            .get(point.vertex as usize)
            .copied()
            .unwrap_or(Vec3::ZERO)
    }

    pub fn normal(&self, point: &FacePoint) -> Option<Vec3> {
        point
            .normal
            .and_then(|i| self.normals.get(i as usize).copied())
    }

    pub fn texcoord(&self, point: &FacePoint) -> Option<Vec2> {
        point
            .texcoord
            .and_then(|i| self.texcoords.get(i as usize).copied())
    }

    /// Drop the raw geometry arrays and return their memory to the allocator.
    pub fn release_geometry(&mut self) {
        self.faces = Vec::new();
        self.vertices = Vec::new();
        self.normals = Vec::new();
        self.texcoords = Vec::new();
    }
}

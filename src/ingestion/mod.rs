pub mod obj_loader;

use std::path::Path;

use tracing::{debug, info};

use crate::config::BakeConfig;
use crate::error::{AtlasError, Result};
use crate::types::{Material, Model};

/// Result of the ingestion stage.
#[derive(Debug)]
pub struct IngestionResult {
    pub model: Model,
    pub stats: IngestionStats,
}

/// Statistics about the ingested model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionStats {
    pub vertices: usize,
    pub faces: usize,
    pub groups: usize,
    pub materials: usize,
    pub textured_materials: usize,
    pub has_normals: bool,
    pub has_texcoords: bool,
    pub input_format: String,
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Obj,
}

impl InputFormat {
    /// Detect format from file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "obj" => Ok(InputFormat::Obj),
            _ => Err(AtlasError::Input(format!("Unsupported file format: .{ext}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Obj => "OBJ",
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run the full ingestion stage.
pub fn ingest(config: &BakeConfig) -> Result<IngestionResult> {
    if !config.input.exists() {
        return Err(AtlasError::Input(format!(
            "Input file not found: {}",
            config.input.display()
        )));
    }

    let format = InputFormat::from_path(&config.input)?;
    info!(format = %format, path = %config.input.display(), "Detected input format");

    let mut model = match format {
        InputFormat::Obj => obj_loader::load_obj(&config.input)?,
    };
    model.darken = config.darken;

    let stats = compute_stats(&model, format);
    debug!(
        vertices = stats.vertices,
        faces = stats.faces,
        groups = stats.groups,
        "Ingestion stats"
    );

    Ok(IngestionResult { model, stats })
}

/// Compute summary statistics for a model.
pub fn compute_stats(model: &Model, format: InputFormat) -> IngestionStats {
    let points = || model.faces.iter().flat_map(|f| f.points.iter());
    IngestionStats {
        vertices: model.vertices.len(),
        faces: model.face_count(),
        groups: model.groups.len(),
        materials: model.materials.len(),
        textured_materials: model
            .materials
            .values()
            .filter(|m| matches!(m, Material::Textured { .. }))
            .count(),
        has_normals: points().any(|p| p.normal.is_some()),
        has_texcoords: points().any(|p| p.texcoord.is_some()),
        input_format: format.to_string(),
    }
}

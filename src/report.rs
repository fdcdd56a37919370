//! Warnings accumulated while building a texture sheet and vertex buffer.
//!
//! Every recoverable problem is recorded here as it happens and surfaced
//! once at the end of the build with [`BuildReport::log`].

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::warn;

/// A single recoverable problem encountered during a build.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildWarning {
    /// A face references a material that is not in the material table.
    MissingMaterial { name: String },
    /// Neither the prefixed nor the fallback texture could be loaded.
    TextureUnavailable { key: String, reason: String },
    /// The packed sheet is larger than the hardware texture limit.
    SheetExceedsLimit { width: u32, height: u32, max: u32 },
    /// A single SubTexture is wider than the hardware texture limit.
    OversizedSubTexture { key: String, width: u32, max: u32 },
    /// One or more tile copies of a SubTexture fell outside the sheet.
    TileTruncated { key: String, copied: u32, expected: u32 },
    /// The cache sidecar existed but could not be read or parsed.
    CacheUnreadable { path: String, reason: String },
    /// Writing a cache file failed; the in-memory atlas is still usable.
    CacheWriteFailed { path: String, reason: String },
    /// A prefix sheet's layout differs from the default sheet the vertex
    /// UVs were mapped against.
    SheetLayoutMismatch { sheet: String, reason: String },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::MissingMaterial { name } => write!(f, "missing material {name}"),
            BuildWarning::TextureUnavailable { key, reason } => {
                write!(f, "texture {key} unavailable: {reason}")
            }
            BuildWarning::SheetExceedsLimit { width, height, max } => {
                write!(f, "sheet {width}x{height} exceeds max texture size {max}")
            }
            BuildWarning::OversizedSubTexture { key, width, max } => {
                write!(f, "texture {key} is {width} px wide, max texture size is {max}")
            }
            BuildWarning::TileTruncated {
                key,
                copied,
                expected,
            } => write!(f, "texture {key}: copied {copied} of {expected} tiles"),
            BuildWarning::CacheUnreadable { path, reason } => {
                write!(f, "cache entry {path} unreadable: {reason}")
            }
            BuildWarning::CacheWriteFailed { path, reason } => {
                write!(f, "failed to write cache file {path}: {reason}")
            }
            BuildWarning::SheetLayoutMismatch { sheet, reason } => {
                write!(f, "sheet {sheet} does not match the default layout: {reason}")
            }
        }
    }
}

/// Warnings accumulated across one build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    warnings: Vec<BuildWarning>,
    #[serde(skip)]
    missing_materials: HashSet<String>,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn push(&mut self, warning: BuildWarning) {
        self.warnings.push(warning);
    }

    /// Record a missing material once per distinct name.
    ///
    /// Returns `true` the first time a name is seen.
    pub fn missing_material(&mut self, name: &str) -> bool {
        if !self.missing_materials.insert(name.to_string()) {
            return false;
        }
        self.warnings.push(BuildWarning::MissingMaterial {
            name: name.to_string(),
        });
        true
    }

    /// Whether a material name has already been reported missing.
    pub fn is_missing(&self, name: &str) -> bool {
        self.missing_materials.contains(name)
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Append another report, keeping missing-material deduplication.
    pub fn merge(&mut self, other: BuildReport) {
        for warning in other.warnings {
            if let BuildWarning::MissingMaterial { name } = &warning {
                if !self.missing_materials.insert(name.clone()) {
                    continue;
                }
            }
            self.warnings.push(warning);
        }
    }

    /// Emit every accumulated warning through `tracing`.
    pub fn log(&self, context: &str) {
        for warning in &self.warnings {
            warn!(context, "{warning}");
        }
    }
}

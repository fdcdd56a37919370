//! On-disk atlas cache keyed by model location and texture prefix.
//!
//! ```text
//! <cache_dir>/<key>.png       full atlas
//! <cache_dir>/<key>_icon.png  icon variant
//! <cache_dir>/<key>.sha256    decimal content hash, written last
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, info};

use crate::report::{BuildReport, BuildWarning};

/// Outcome of checking a cache entry against a content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Both files exist and the sidecar matches.
    Hit,
    /// The atlas or sidecar file does not exist.
    Missing,
    /// The sidecar holds a different hash.
    Stale { found: u64 },
    /// The sidecar could not be read or parsed.
    Unreadable(String),
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit)
    }
}

/// Location of one cached atlas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    dir: PathBuf,
    key: String,
}

impl CacheEntry {
    pub fn new(dir: impl Into<PathBuf>, model_location: &str, prefix: Option<&str>) -> Self {
        Self {
            dir: dir.into(),
            key: cache_key(model_location, prefix),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn atlas_path(&self) -> PathBuf {
        self.dir.join(format!("{}.png", self.key))
    }

    pub fn icon_path(&self) -> PathBuf {
        self.dir.join(format!("{}_icon.png", self.key))
    }

    pub fn hash_path(&self) -> PathBuf {
        self.dir.join(format!("{}.sha256", self.key))
    }

    /// Compare the stored sidecar with `hash`.
    ///
    /// The atlas, the icon and the sidecar must all exist for a hit.
    pub fn lookup(&self, hash: u64) -> CacheLookup {
        let hash_path = self.hash_path();
        if !self.atlas_path().exists() || !self.icon_path().exists() || !hash_path.exists() {
            return CacheLookup::Missing;
        }
        let text = match fs::read_to_string(&hash_path) {
            Ok(text) => text,
            Err(e) => return CacheLookup::Unreadable(e.to_string()),
        };
        match text.trim().parse::<u64>() {
            Ok(found) if found == hash => CacheLookup::Hit,
            Ok(found) => CacheLookup::Stale { found },
            Err(e) => CacheLookup::Unreadable(format!("corrupt sidecar {:?}: {e}", text.trim())),
        }
    }

    /// Check the entry and record unreadable sidecars in `report`.
    pub fn validate(&self, hash: u64, report: &mut BuildReport) -> bool {
        let lookup = self.lookup(hash);
        debug!(key = %self.key, ?lookup, "Cache lookup");
        if let CacheLookup::Unreadable(reason) = &lookup {
            report.push(BuildWarning::CacheUnreadable {
                path: self.hash_path().display().to_string(),
                reason: reason.clone(),
            });
        }
        lookup.is_hit()
    }

    /// Persist the atlas, its icon and finally the hash sidecar.
    ///
    /// When `icon` is `None` the atlas itself is written as the icon. The
    /// sidecar is only written after both images succeed, so a partial
    /// write never produces a valid entry.
    pub fn store(
        &self,
        atlas: &RgbaImage,
        icon: Option<&RgbaImage>,
        hash: u64,
        report: &mut BuildReport,
    ) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            record_write_failure(report, &self.dir, &e);
            return;
        }

        let atlas_path = self.atlas_path();
        if let Err(e) = atlas.save(&atlas_path) {
            record_write_failure(report, &atlas_path, &e);
            return;
        }

        let icon_path = self.icon_path();
        if let Err(e) = icon.unwrap_or(atlas).save(&icon_path) {
            record_write_failure(report, &icon_path, &e);
            return;
        }

        let hash_path = self.hash_path();
        if let Err(e) = fs::write(&hash_path, hash.to_string()) {
            record_write_failure(report, &hash_path, &e);
            return;
        }

        info!(key = %self.key, path = %atlas_path.display(), "Cached atlas");
    }
}

/// Cache key for a model location and prefix: path separators become dots
/// and the prefix is appended.
pub fn cache_key(model_location: &str, prefix: Option<&str>) -> String {
    let mut key: String = model_location
        .chars()
        .map(|c| if c == '/' || c == '\\' { '.' } else { c })
        .collect();
    key.push_str(prefix.unwrap_or(""));
    key
}

fn record_write_failure(report: &mut BuildReport, path: &Path, err: &dyn std::fmt::Display) {
    report.push(BuildWarning::CacheWriteFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    });
}

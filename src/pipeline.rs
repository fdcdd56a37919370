use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::atlas::{SubTextureKind, TextureSheet};
use crate::config::BakeConfig;
use crate::error::{AtlasError, Result};
use crate::ingestion::{self, IngestionStats};
use crate::render::{HeadlessBackend, ModelRenderer, RenderContext, VertexBuffer};
use crate::report::BuildWarning;
use crate::resource::DirectoryResolver;

/// Summary of a completed bake.
#[derive(Debug)]
pub struct BakeResult {
    pub sheets: Vec<SheetSummary>,
    pub vertices: usize,
    pub groups: usize,
    pub warnings: Vec<BuildWarning>,
    pub duration: Duration,
}

/// Per-sheet outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSummary {
    pub prefix: Option<String>,
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub sub_textures: usize,
    pub cached: bool,
    pub blits: u32,
}

impl From<&TextureSheet> for SheetSummary {
    fn from(sheet: &TextureSheet) -> Self {
        Self {
            prefix: sheet.prefix().map(str::to_string),
            key: sheet.cache_entry().key().to_string(),
            width: sheet.width(),
            height: sheet.height(),
            sub_textures: sheet.sub_textures().len(),
            cached: sheet.is_cached(),
            blits: sheet.composite_stats().blits,
        }
    }
}

/// Layout manifest written with `--manifest`.
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub location: &'a str,
    pub hash: String,
    pub sheets: Vec<SheetManifest<'a>>,
    pub groups: Vec<GroupManifest<'a>>,
    pub warnings: &'a [BuildWarning],
}

#[derive(Debug, Serialize)]
pub struct SheetManifest<'a> {
    pub prefix: Option<&'a str>,
    pub atlas: String,
    pub icon: String,
    pub width: u32,
    pub height: u32,
    pub cached: bool,
    pub sub_textures: Vec<SubTextureManifest<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SubTextureManifest<'a> {
    pub key: &'a str,
    pub flat: bool,
    pub generated: bool,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub copies_u: u32,
    pub copies_v: u32,
}

#[derive(Debug, Serialize)]
pub struct GroupManifest<'a> {
    pub name: &'a str,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

/// Pipeline orchestrator -- load, bake sheets, assemble, report.
pub struct Pipeline;

impl Pipeline {
    /// Run the full bake.
    pub fn run(config: &BakeConfig) -> Result<BakeResult> {
        let start = Instant::now();

        info!(input = %config.input.display(), "Starting bake");

        info!("Stage 1/3: Ingestion");
        let ingested = ingestion::ingest(config)?;
        print_ingestion_summary(&ingested.stats);

        info!("Stage 2/3: Texture sheets");
        let texture_root = config.input.parent().unwrap_or_else(|| Path::new("."));
        let resolver = DirectoryResolver::new(texture_root);
        let mut ctx = RenderContext::new(HeadlessBackend::new(config.backend_max_texture_size));
        let mut renderer = ModelRenderer::new(
            ingested.model,
            &config.prefixes,
            &resolver,
            &mut ctx,
            &config.atlas,
        )?;

        info!("Stage 3/3: Vertex buffer");
        let names: Vec<Option<String>> = renderer
            .sheets()
            .map(|(name, _)| name.map(str::to_string))
            .collect();
        for name in &names {
            renderer.bind_texture(&mut ctx, name.as_deref(), false);
        }
        renderer.draw(&mut ctx);

        let sheets: Vec<SheetSummary> = renderer.sheets().map(|(_, s)| s.into()).collect();
        let (vertices, groups) = {
            let vb = renderer.vertex_buffer();
            (vb.vertex_count(), vb.groups().len())
        };

        if let Some(path) = &config.manifest {
            write_manifest(&mut renderer, path)?;
        }

        renderer.free(&mut ctx);
        let warnings = renderer.report().warnings().to_vec();
        print_sheet_summary(&sheets, vertices, groups, warnings.len());

        let duration = start.elapsed();
        info!(
            sheets = sheets.len(),
            vertices,
            warnings = warnings.len(),
            elapsed = ?duration,
            "Bake complete"
        );

        Ok(BakeResult {
            sheets,
            vertices,
            groups,
            warnings,
            duration,
        })
    }
}

/// Serialize the sheet layout and group ranges to JSON.
fn write_manifest(renderer: &mut ModelRenderer, path: &Path) -> Result<()> {
    renderer.vertex_buffer();
    let manifest = build_manifest(renderer);
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| AtlasError::Output(format!("Failed to serialize manifest: {e}")))?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), "Wrote layout manifest");
    Ok(())
}

fn build_manifest(renderer: &ModelRenderer) -> Manifest<'_> {
    let sheets = renderer
        .sheets()
        .map(|(prefix, sheet)| SheetManifest {
            prefix,
            atlas: sheet.cache_entry().atlas_path().display().to_string(),
            icon: sheet.cache_entry().icon_path().display().to_string(),
            width: sheet.width(),
            height: sheet.height(),
            cached: sheet.is_cached(),
            sub_textures: sheet
                .sub_textures()
                .iter()
                .map(|st| SubTextureManifest {
                    key: st.key(),
                    flat: st.is_flat(),
                    generated: st.kind() == SubTextureKind::Flat,
                    x: st.origin().0,
                    y: st.origin().1,
                    width: st.width(),
                    height: st.height(),
                    copies_u: st.copies_u(),
                    copies_v: st.copies_v(),
                })
                .collect(),
        })
        .collect();

    Manifest {
        location: &renderer.model().location,
        hash: renderer.default_sheet().hash().to_string(),
        sheets,
        groups: renderer
            .assembled()
            .map(VertexBuffer::groups)
            .unwrap_or_default()
            .iter()
            .map(|g| GroupManifest {
                name: &g.name,
                first_vertex: g.first_vertex,
                vertex_count: g.vertex_count,
            })
            .collect(),
        warnings: renderer.report().warnings(),
    }
}

/// Print the ingestion stats.
fn print_ingestion_summary(stats: &IngestionStats) {
    println!("=== Model ===");
    println!("  Format:    {}", stats.input_format);
    println!("  Vertices:  {}", stats.vertices);
    println!("  Faces:     {}", stats.faces);
    println!("  Groups:    {}", stats.groups);
    println!(
        "  Materials: {} ({} textured)",
        stats.materials, stats.textured_materials
    );
    println!("  Normals:   {}", if stats.has_normals { "yes" } else { "no" });
    println!("  UVs:       {}", if stats.has_texcoords { "yes" } else { "no" });
}

/// Print one line per sheet plus buffer totals.
fn print_sheet_summary(sheets: &[SheetSummary], vertices: usize, groups: usize, warnings: usize) {
    println!("=== Sheets ===");
    for s in sheets {
        println!(
            "  {:<24} {}x{} ({} sub-textures, {})",
            s.prefix.as_deref().unwrap_or("<default>"),
            s.width,
            s.height,
            s.sub_textures,
            if s.cached { "cached" } else { "composed" }
        );
    }
    println!("=== Vertex buffer ===");
    println!("  Groups:    {groups}");
    println!("  Vertices:  {vertices}");
    if warnings > 0 {
        println!("  Warnings:  {warnings} (see log)");
    }
}

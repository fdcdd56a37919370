use tracing::{debug, info, warn};

use crate::atlas::TextureSheet;
use crate::config::AtlasConfig;
use crate::error::Result;
use crate::report::{BuildReport, BuildWarning};
use crate::resource::ResourceResolver;
use crate::types::Model;

use super::binding::{RenderContext, SheetTextures};
use super::gpu::{BindToken, BufferHandle, GpuBackend};
use super::vertex_buffer::{self, ParticleFilter, VertexBuffer};

/// A texture sheet and its GPU textures.
#[derive(Debug)]
struct NamedSheet {
    /// `None` for the default sheet.
    name: Option<String>,
    sheet: TextureSheet,
    textures: Option<SheetTextures>,
}

/// Draws one model with one or more prefix variants of its atlas.
///
/// With more than one prefix, a sheet is built per prefix and
/// [`ModelRenderer::bind_texture`] selects between them; otherwise a single
/// unprefixed sheet is used. The vertex buffer is assembled against the
/// default sheet on first draw.
///
/// GPU resources must be released with [`ModelRenderer::free`].
#[derive(Debug)]
pub struct ModelRenderer {
    model: Model,
    sheets: Vec<NamedSheet>,
    filter: ParticleFilter,
    vertex_buffer: Option<VertexBuffer>,
    buffer: Option<BufferHandle>,
    report: BuildReport,
}

impl ModelRenderer {
    pub fn new<B: GpuBackend>(
        model: Model,
        prefixes: &[String],
        resolver: &dyn ResourceResolver,
        ctx: &mut RenderContext<B>,
        config: &AtlasConfig,
    ) -> Result<Self> {
        let filter = ParticleFilter::new(config.particle_patterns.as_slice())?;
        let max_texture_size = config
            .max_texture_size
            .unwrap_or_else(|| ctx.backend().max_texture_size());
        let mut report = BuildReport::new();

        let names: Vec<Option<&str>> = if prefixes.len() > 1 {
            prefixes.iter().map(|p| Some(p.as_str())).collect()
        } else {
            vec![None]
        };

        let mut sheets = Vec::with_capacity(names.len());
        for name in names {
            let mut sheet_report = BuildReport::new();
            let mut sheet = TextureSheet::build(
                &model,
                name,
                resolver,
                max_texture_size,
                config,
                &mut sheet_report,
            )?;
            sheet_report.log(sheet.cache_entry().key());
            report.merge(sheet_report);

            let textures = sheet
                .take_assets()
                .map(|assets| SheetTextures::create(ctx, &assets));
            sheets.push(NamedSheet {
                name: name.map(str::to_string),
                sheet,
                textures,
            });
        }

        if let Some((default, rest)) = sheets.split_first() {
            for entry in rest {
                if let Some(reason) = layout_difference(&default.sheet, &entry.sheet) {
                    let warning = BuildWarning::SheetLayoutMismatch {
                        sheet: entry.name.clone().unwrap_or_default(),
                        reason,
                    };
                    warn!(location = %model.location, "{warning}");
                    report.push(warning);
                }
            }
        }

        info!(
            location = %model.location,
            sheets = sheets.len(),
            max_texture_size,
            "Model renderer ready"
        );

        Ok(Self {
            model,
            sheets,
            filter,
            vertex_buffer: None,
            buffer: None,
            report,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Warnings from building every sheet and the vertex buffer.
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// The sheet used for UV mapping.
    pub fn default_sheet(&self) -> &TextureSheet {
        &self.default_entry().sheet
    }

    /// Sheet for a prefix name; unknown names and `None` give the default.
    pub fn sheet(&self, name: Option<&str>) -> &TextureSheet {
        &self.entry(name).sheet
    }

    pub fn sheets(&self) -> impl Iterator<Item = (Option<&str>, &TextureSheet)> {
        self.sheets.iter().map(|s| (s.name.as_deref(), &s.sheet))
    }

    fn default_entry(&self) -> &NamedSheet {
        // `new` always builds at least one sheet.
        &self.sheets[0]
    }

    fn entry(&self, name: Option<&str>) -> &NamedSheet {
        name.and_then(|n| self.sheets.iter().find(|s| s.name.as_deref() == Some(n)))
            .unwrap_or_else(|| self.default_entry())
    }

    /// Bind the atlas (or its icon) of the named sheet, falling back to the
    /// default sheet for unknown names.
    pub fn bind_texture<B: GpuBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        name: Option<&str>,
        icon: bool,
    ) -> BindToken {
        match self.entry(name).textures {
            Some(textures) if icon => textures.bind_icon(ctx),
            Some(textures) => textures.bind(ctx),
            None => ctx.bind_placeholder(),
        }
    }

    /// Assemble the vertex buffer if that has not happened yet.
    ///
    /// The model's raw geometry is released afterwards.
    pub fn vertex_buffer(&mut self) -> &VertexBuffer {
        if self.vertex_buffer.is_none() {
            let mut report = BuildReport::new();
            let vb = vertex_buffer::assemble(
                &mut self.model,
                &self.sheets[0].sheet,
                &self.filter,
                &mut report,
            );
            report.log(&self.model.location);
            self.report.merge(report);
            self.vertex_buffer = Some(vb);
        }
        self.vertex_buffer.get_or_insert_with(VertexBuffer::default)
    }

    /// The vertex buffer, if it has been assembled.
    pub fn assembled(&self) -> Option<&VertexBuffer> {
        self.vertex_buffer.as_ref()
    }

    fn upload<B: GpuBackend>(&mut self, ctx: &mut RenderContext<B>) -> BufferHandle {
        if let Some(handle) = self.buffer {
            return handle;
        }
        let handle = ctx.backend_mut().create_vertex_buffer(self.vertex_buffer());
        self.buffer = Some(handle);
        handle
    }

    /// Draw every group.
    pub fn draw<B: GpuBackend>(&mut self, ctx: &mut RenderContext<B>) {
        let handle = self.upload(ctx);
        let ranges = self.vertex_buffer().groups().to_vec();
        ctx.backend_mut().draw(handle, &ranges);
    }

    /// Draw only the named groups; unknown names are ignored.
    pub fn draw_groups<'a, B, I>(&mut self, ctx: &mut RenderContext<B>, groups: I)
    where
        B: GpuBackend,
        I: IntoIterator<Item = &'a str>,
    {
        let handle = self.upload(ctx);
        let ranges = self.vertex_buffer().ranges_for(groups);
        debug!(groups = ranges.len(), "Drawing group subset");
        ctx.backend_mut().draw(handle, &ranges);
    }

    /// Release every GPU texture and the vertex buffer.
    pub fn free<B: GpuBackend>(&mut self, ctx: &mut RenderContext<B>) {
        for entry in &mut self.sheets {
            if let Some(textures) = entry.textures.take() {
                textures.free(ctx);
            }
        }
        if let Some(buffer) = self.buffer.take() {
            ctx.backend_mut().free_vertex_buffer(buffer);
        }
    }

    fn holds_gpu_resources(&self) -> bool {
        self.buffer.is_some() || self.sheets.iter().any(|s| s.textures.is_some())
    }
}

/// First way `other` lays out its SubTextures differently from `default`.
///
/// Vertex UVs are mapped against the default sheet only.
fn layout_difference(default: &TextureSheet, other: &TextureSheet) -> Option<String> {
    if (other.width(), other.height()) != (default.width(), default.height()) {
        return Some(format!(
            "size {}x{}, default is {}x{}",
            other.width(),
            other.height(),
            default.width(),
            default.height()
        ));
    }
    if other.sub_textures().len() != default.sub_textures().len() {
        return Some(format!(
            "{} sub-textures, default has {}",
            other.sub_textures().len(),
            default.sub_textures().len()
        ));
    }
    for expected in default.sub_textures() {
        let Some(found) = other.sub_texture(expected.key()) else {
            return Some(format!("{} is not in the sheet", expected.key()));
        };
        let same = found.origin() == expected.origin()
            && found.width() == expected.width()
            && found.height() == expected.height()
            && found.bounds() == expected.bounds()
            && found.is_flat() == expected.is_flat();
        if !same {
            let (x, y) = found.origin();
            let (dx, dy) = expected.origin();
            return Some(format!(
                "{} is {}x{} at ({x}, {y}), default is {}x{} at ({dx}, {dy})",
                expected.key(),
                found.width(),
                found.height(),
                expected.width(),
                expected.height()
            ));
        }
    }
    None
}

impl Drop for ModelRenderer {
    fn drop(&mut self) {
        if self.holds_gpu_resources() {
            warn!(
                location = %self.model.location,
                "ModelRenderer dropped without free(); GPU resources leaked"
            );
        }
    }
}

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Group-name patterns for particle emitters that are never drawn.
///
/// The `CHIMINEY` spelling is a legacy misspelling still found in shipped
/// models.
pub const DEFAULT_PARTICLE_PATTERNS: &[&str] = &[
    r".*EXHAUST_\d.*",
    r".*CHIMNEY_\d.*",
    r".*PRESSURE_VALVE_\d.*",
    r".*CHIMINEY_\d.*",
];

/// Edge length of the square pixel area above which the icon is downscaled.
pub const DEFAULT_ICON_SIZE: u32 = 1024;

/// Atlas build parameters.
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// Directory holding `<key>.png`, `<key>_icon.png` and `<key>.sha256`.
    pub cache_dir: PathBuf,
    /// Residency hint for the full atlas; the icon is kept twice as long.
    pub cache_seconds: u32,
    /// Pixel-count threshold for the icon variant.
    pub icon_threshold: u64,
    /// Overrides the backend's reported maximum texture dimension.
    pub max_texture_size: Option<u32>,
    /// Regex patterns for groups excluded from the vertex buffer.
    pub particle_patterns: Vec<String>,
}

impl AtlasConfig {
    pub fn atlas_lifetime(&self) -> Duration {
        Duration::from_secs(u64::from(self.cache_seconds))
    }

    pub fn icon_lifetime(&self) -> Duration {
        Duration::from_secs(u64::from(self.cache_seconds) * 2)
    }
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".atlas-cache"),
            cache_seconds: 30,
            icon_threshold: u64::from(DEFAULT_ICON_SIZE) * u64::from(DEFAULT_ICON_SIZE),
            max_texture_size: None,
            particle_patterns: DEFAULT_PARTICLE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Fully resolved bake configuration (constructed from CLI args).
#[derive(Debug, Clone)]
pub struct BakeConfig {
    pub input: PathBuf,
    /// Texture-name prefixes; more than one builds one sheet per prefix.
    pub prefixes: Vec<String>,
    /// Model-wide darken factor applied to flat swatches and tints.
    pub darken: f32,
    /// Optional path for a JSON layout manifest.
    pub manifest: Option<PathBuf>,
    /// Texture limit reported by the headless backend.
    pub backend_max_texture_size: u32,
    pub atlas: AtlasConfig,
    pub verbose: bool,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            prefixes: Vec::new(),
            darken: 0.0,
            manifest: None,
            backend_max_texture_size: 8192,
            atlas: AtlasConfig::default(),
            verbose: false,
        }
    }
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "atlas-baker",
    about = "Bake a multi-material OBJ into a texture atlas and vertex buffer",
    version
)]
pub struct CliArgs {
    /// Input OBJ file
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Atlas cache directory
    #[arg(short = 'c', long, default_value = ".atlas-cache")]
    pub cache_dir: PathBuf,

    /// Texture-name prefix (repeatable)
    #[arg(short = 'p', long = "prefix")]
    pub prefixes: Vec<String>,

    /// Darken factor applied to material colours
    #[arg(long, default_value_t = 0.0)]
    pub darken: f32,

    /// Maximum texture dimension reported by the backend
    #[arg(long, default_value_t = 8192)]
    pub max_texture_size: u32,

    /// Icon edge length; atlases larger than its square are downscaled
    #[arg(long, default_value_t = DEFAULT_ICON_SIZE)]
    pub icon_size: u32,

    /// Residency hint for the full atlas in seconds
    #[arg(long, default_value_t = 30)]
    pub cache_seconds: u32,

    /// Group pattern excluded from the vertex buffer (repeatable, replaces defaults)
    #[arg(long = "skip-group")]
    pub skip_groups: Vec<String>,

    /// Write a JSON layout manifest to this path
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl From<CliArgs> for BakeConfig {
    fn from(args: CliArgs) -> Self {
        let mut atlas = AtlasConfig {
            cache_dir: args.cache_dir,
            cache_seconds: args.cache_seconds,
            icon_threshold: u64::from(args.icon_size) * u64::from(args.icon_size),
            max_texture_size: None,
            ..Default::default()
        };
        if !args.skip_groups.is_empty() {
            atlas.particle_patterns = args.skip_groups;
        }

        BakeConfig {
            input: args.input,
            prefixes: args.prefixes,
            darken: args.darken,
            manifest: args.manifest,
            backend_max_texture_size: args.max_texture_size,
            atlas,
            verbose: args.verbose,
        }
    }
}

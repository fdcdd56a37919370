use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use atlas_baker::config::{BakeConfig, CliArgs};
use atlas_baker::pipeline::Pipeline;

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let filter = if args.verbose {
        EnvFilter::new("atlas_baker=debug")
    } else {
        EnvFilter::new("atlas_baker=info")
    };
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config: BakeConfig = args.into();
    std::fs::create_dir_all(&config.atlas.cache_dir).with_context(|| {
        format!(
            "Failed to create cache directory {}",
            config.atlas.cache_dir.display()
        )
    })?;

    match Pipeline::run(&config) {
        Ok(result) => {
            println!(
                "Done: {} sheet(s), {} vertices in {:.2}s",
                result.sheets.len(),
                result.vertices,
                result.duration.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            error!(%e, "Bake failed");
            Err(anyhow::anyhow!(e)).context("atlas-baker failed")
        }
    }
}

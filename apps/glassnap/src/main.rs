//! Glassnap - Screenshots that keep window transparency
//!
//! Captures the configured region (the whole virtual screen by default)
//! with its alpha channel reconstructed and saves it as a PNG.

mod config;
mod save;

use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use tracing::{error, info};

use config::AppConfig;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glassnap=info,capture=info,unblend=info".into()),
        )
        .with_target(true)
        .init();

    if let Err(err) = run() {
        error!("Screenshot failed: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    info!("Starting Glassnap");

    let config = AppConfig::load()?;
    capture::enable_dpi_awareness();

    let region = match config.region {
        Some(region) => region,
        None => capture::virtual_screen().context("querying virtual screen bounds")?,
    };

    if config.delay_ms > 0 {
        info!("Waiting {} ms before capture", config.delay_ms);
        std::thread::sleep(Duration::from_millis(config.delay_ms));
    }

    let rgba = capture::shoot(region).with_context(|| format!("capturing {region}"))?;

    let dir = config.resolve_output_dir();
    let name = config
        .file_name
        .clone()
        .unwrap_or_else(|| save::default_file_name(Local::now()));
    let path = save::save_png(rgba, &dir, &name, config.compression)?;

    info!("Saved {}", path.display());
    Ok(())
}

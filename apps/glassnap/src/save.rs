//! PNG output for reconstructed screenshots

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use chrono::{DateTime, Local};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use pixels::{PixelBuffer, PixelFormat};
use tracing::debug;

use crate::config::Compression;

/// Timestamped default name, e.g. `screenshot_2024-03-01_17-05-09.png`
pub fn default_file_name(now: DateTime<Local>) -> String {
    now.format("screenshot_%Y-%m-%d_%H-%M-%S.png").to_string()
}

fn compression_type(compression: Compression) -> CompressionType {
    match compression {
        Compression::Fast => CompressionType::Fast,
        Compression::Default => CompressionType::Default,
        Compression::Best => CompressionType::Best,
    }
}

/// Encode an RGBA buffer as an 8-bit RGBA PNG, top row first
pub fn encode_png<W: Write>(
    buffer: PixelBuffer,
    compression: Compression,
    writer: W,
) -> anyhow::Result<()> {
    ensure!(
        buffer.format() == PixelFormat::Rgba8,
        "expected an RGBA buffer, got {:?}",
        buffer.format()
    );

    let buffer = buffer.into_top_down();
    let (width, height) = (buffer.width(), buffer.height());
    let rgba = buffer.into_raw();

    PngEncoder::new_with_quality(writer, compression_type(compression), FilterType::Adaptive)
        .write_image(&rgba, width, height, ExtendedColorType::Rgba8)
        .context("encoding PNG")?;

    Ok(())
}

/// Write the screenshot to `dir/name`, replacing any existing file
pub fn save_png(
    buffer: PixelBuffer,
    dir: &Path,
    name: &str,
    compression: Compression,
) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    let file =
        File::create(&path).with_context(|| format!("creating {}", path.display()))?;

    let mut writer = BufWriter::new(file);
    encode_png(buffer, compression, &mut writer)
        .with_context(|| format!("writing {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;

    debug!("Wrote {}", path.display());
    Ok(path)
}

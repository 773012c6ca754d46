use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::imageops::FilterType;

use crate::overlay::font::FontResolver;
use crate::overlay::layout::{RegionLayout, layout_region};
use crate::overlay::render::{compose_svg, encode_image, rasterize_svg};
use crate::region::TextRegion;

/// Geometry multiplier for the supersampled export path.
const SUPERSAMPLE_SCALE: u32 = 2;

/// Shared front half of every render path: one layout per drawable
/// region, all decisions made by `layout_region`.
pub fn layout_regions<'a>(
    regions: impl IntoIterator<Item = &'a TextRegion>,
    img_w: u32,
    img_h: u32,
    scale: u32,
    fonts: &FontResolver,
) -> Vec<RegionLayout> {
    regions
        .into_iter()
        .filter_map(|region| layout_region(region, img_w, img_h, scale, fonts))
        .collect()
}

/// Interactive preview: rasterize the overlay alone and alpha-blend it
/// onto a copy of the already-decoded base frame.
pub fn render_preview<'a>(
    base: &image::RgbaImage,
    regions: impl IntoIterator<Item = &'a TextRegion>,
    fonts: &FontResolver,
) -> Result<image::RgbaImage> {
    let (width, height) = base.dimensions();
    let layouts = layout_regions(regions, width, height, 1, fonts);
    let svg = compose_svg(width, height, None, &layouts);
    let overlay = rasterize_svg(&svg, &layouts)?;
    let mut out = base.clone();
    image::imageops::overlay(&mut out, &overlay, 0, 0);
    Ok(out)
}

/// Standard export: base image embedded in the SVG, rasterized at native
/// resolution and encoded.
pub fn export_standard<'a>(
    image_bytes: &[u8],
    image_mime: &str,
    regions: impl IntoIterator<Item = &'a TextRegion>,
    fonts: &FontResolver,
    format: image::ImageFormat,
) -> Result<Vec<u8>> {
    let (width, height) = probe_dimensions(image_bytes)?;
    let layouts = layout_regions(regions, width, height, 1, fonts);
    let svg = compose_svg(width, height, Some((image_bytes, image_mime)), &layouts);
    let raster = rasterize_svg(&svg, &layouts)?;
    encode_image(image::DynamicImage::ImageRgba8(raster), format)
}

/// Supersampled export: double geometry, rasterize, then a high-quality
/// downsample back to native resolution for smoother glyph edges.
pub fn export_supersampled<'a>(
    image_bytes: &[u8],
    image_mime: &str,
    regions: impl IntoIterator<Item = &'a TextRegion>,
    fonts: &FontResolver,
    format: image::ImageFormat,
) -> Result<Vec<u8>> {
    let (width, height) = probe_dimensions(image_bytes)?;
    let layouts = layout_regions(regions, width, height, SUPERSAMPLE_SCALE, fonts);
    let svg = compose_svg(
        width * SUPERSAMPLE_SCALE,
        height * SUPERSAMPLE_SCALE,
        Some((image_bytes, image_mime)),
        &layouts,
    );
    let raster = rasterize_svg(&svg, &layouts)?;
    let downsampled = image::imageops::resize(&raster, width, height, FilterType::Lanczos3);
    encode_image(image::DynamicImage::ImageRgba8(downsampled), format)
}

/// Legacy renderer kept for compatibility: decodes the base with the
/// image crate and composites a separately rasterized overlay layer, the
/// way the old screen-capture path worked. Layout is still the shared
/// function, so its output matches the other paths.
pub fn export_legacy<'a>(
    image_bytes: &[u8],
    regions: impl IntoIterator<Item = &'a TextRegion>,
    fonts: &FontResolver,
    format: image::ImageFormat,
) -> Result<Vec<u8>> {
    let base = image::load_from_memory(image_bytes)
        .with_context(|| "failed to decode target image")?
        .to_rgba8();
    let composited = render_preview(&base, regions, fonts)?;
    encode_image(image::DynamicImage::ImageRgba8(composited), format)
}

pub fn format_for_output(path: &Path) -> Result<image::ImageFormat> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok(image::ImageFormat::Png),
        "jpg" | "jpeg" => Ok(image::ImageFormat::Jpeg),
        other => Err(anyhow!("unsupported output format '{}'", other)),
    }
}

pub fn mime_for_bytes(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::Bmp) => "image/bmp",
        Ok(image::ImageFormat::WebP) => "image/webp",
        _ => "image/png",
    }
}

fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let image =
        image::load_from_memory(bytes).with_context(|| "failed to decode target image")?;
    Ok((image.width(), image.height()))
}

use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::layout::RegionLayout;
use crate::region::{Rgb, Rgba};

fn rgb_hex(color: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

fn rgba_attrs(color: Rgba) -> String {
    format!(
        r##"fill="#{:02x}{:02x}{:02x}" fill-opacity="{:.3}""##,
        color.r,
        color.g,
        color.b,
        color.a as f32 / 255.0
    )
}

/// SVG fragment drawing one laid-out region: optional background fill,
/// then each placed line, stroke painted under the fill.
pub fn region_svg_fragment(layout: &RegionLayout, clip_id: &str) -> String {
    let rect = layout.box_rect;
    let mut svg = String::new();

    if let Some(background) = layout.background {
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" {fill}/>"#,
            x = rect.x1,
            y = rect.y1,
            w = rect.width(),
            h = rect.height(),
            fill = rgba_attrs(background)
        ));
    }
    if layout.lines.is_empty() {
        return svg;
    }

    svg.push_str(&format!(
        r#"<clipPath id="{id}"><rect x="{x}" y="{y}" width="{w}" height="{h}"/></clipPath>"#,
        id = clip_id,
        x = rect.x1,
        y = rect.y1,
        w = rect.width(),
        h = rect.height(),
    ));

    let fill = rgb_hex(layout.color);
    let family = layout.font.family().map(escape_xml);
    let stroke_attrs = layout
        .stroke
        .map(|(color, width)| {
            format!(
                r#" stroke="{}" stroke-width="{}" paint-order="stroke""#,
                rgb_hex(color),
                width
            )
        })
        .unwrap_or_default();

    for line in &layout.lines {
        // SVG text y is the baseline; the layout y is the line's top.
        let baseline = line.y + layout.font_size;
        let family_attr = family
            .as_deref()
            .map(|name| format!(r#" font-family="{name}""#))
            .unwrap_or_default();
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{fill}"{family}{stroke} clip-path="url(#{clip})">{text}</text>"#,
            x = line.x,
            y = baseline,
            size = layout.font_size,
            fill = fill,
            family = family_attr,
            stroke = stroke_attrs,
            clip = clip_id,
            text = escape_xml(&line.text),
        ));
    }
    svg
}

/// Full SVG document: optional base image (as a data URI) underneath the
/// region fragments.
pub fn compose_svg(
    width: u32,
    height: u32,
    base: Option<(&[u8], &str)>,
    layouts: &[RegionLayout],
) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    if let Some((bytes, mime)) = base {
        let uri = format!("data:{};base64,{}", mime, BASE64.encode(bytes));
        svg.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
            uri = uri,
            w = width,
            h = height
        ));
    }
    for (idx, layout) in layouts.iter().enumerate() {
        let clip_id = format!("clip-{idx}");
        svg.push_str(&region_svg_fragment(layout, &clip_id));
    }
    svg.push_str("</svg>");
    svg
}

/// Rasterize an SVG document to an RGBA image. Fonts used by the layouts
/// are registered in the font database so text resolves to the same faces
/// that measurement used.
pub fn rasterize_svg(svg: &str, layouts: &[RegionLayout]) -> Result<image::RgbaImage> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    for layout in layouts {
        if let Some(data) = layout.font.font_data() {
            db.load_font_data(data.to_vec());
        }
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse overlay SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
}

pub fn encode_image(image: image::DynamicImage, format: image::ImageFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    // JPEG has no alpha channel.
    let image = match format {
        image::ImageFormat::Jpeg => image::DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    image
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode composited image")?;
    Ok(bytes)
}

pub fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::font::FontResolver;
    use crate::overlay::layout::layout_region;
    use crate::region::{RectPx, StyleDefaults, TextRegion};

    fn sample_layout() -> RegionLayout {
        let mut region = TextRegion::new("hello & <world>", &StyleDefaults::default());
        region.set_target_box(RectPx::new(10, 10, 200, 60), 400, 300);
        layout_region(&region, 400, 300, 1, &FontResolver::default()).expect("layout")
    }

    #[test]
    fn escape_xml_covers_markup_characters() {
        assert_eq!(escape_xml(r#"a&b<c>"d'"#), "a&amp;b&lt;c&gt;&quot;d&apos;");
    }

    #[test]
    fn fragment_contains_background_and_escaped_text() {
        let layout = sample_layout();
        let fragment = region_svg_fragment(&layout, "clip-0");
        assert!(fragment.contains("<rect"));
        assert!(fragment.contains(r##"fill="#ffffff" fill-opacity="1.000""##));
        assert!(fragment.contains("hello &amp; &lt;world&gt;"));
        assert!(fragment.contains(r##"clip-path="url(#clip-0)""##));
    }

    #[test]
    fn stroke_renders_under_fill() {
        let mut region = TextRegion::new("outlined", &StyleDefaults::default());
        region.set_target_box(RectPx::new(0, 0, 200, 60), 400, 300);
        region.set_stroke(Some(Rgb::new(255, 0, 0)), 2);
        let layout = layout_region(&region, 400, 300, 1, &FontResolver::default()).expect("layout");
        let fragment = region_svg_fragment(&layout, "clip-0");
        assert!(fragment.contains(r##"stroke="#ff0000""##));
        assert!(fragment.contains(r#"paint-order="stroke""#));
    }

    #[test]
    fn compose_without_base_rasterizes() {
        let svg = compose_svg(32, 16, None, &[]);
        let raster = rasterize_svg(&svg, &[]).expect("rasterize");
        assert_eq!(raster.dimensions(), (32, 16));
    }
}

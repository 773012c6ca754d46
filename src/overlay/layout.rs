use super::font::{FontHandle, FontResolver};
use super::wrap::{wrap_chars, wrap_words};
use crate::region::{BoldLevel, RectPx, Rgb, Rgba, TextAlign, TextRegion, WrapMode};

/// Font size never exceeds this share of the box height.
const MAX_FONT_BOX_RATIO: f32 = 0.6;
const MIN_FONT_SIZE: f32 = 8.0;
/// Slack when deciding whether a line still fits vertically.
const FIT_TOLERANCE: f32 = 20.0;

/// A line with its final position, in destination pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// The draw plan for one region: everything a rasterizer needs, with all
/// layout decisions already made.
pub struct RegionLayout {
    /// Clamped region box, scaled to destination pixels.
    pub box_rect: RectPx,
    /// Final font pixel size (bold inflation applied).
    pub font_size: f32,
    pub line_height: f32,
    pub lines: Vec<PlacedLine>,
    pub color: Rgb,
    pub background: Option<Rgba>,
    pub stroke: Option<(Rgb, f32)>,
    pub font: FontHandle,
}

fn bold_factor(level: BoldLevel) -> f32 {
    // Visual weight via size inflation, applied on top of bold-aware
    // font resolution so every render path behaves the same.
    match level {
        BoldLevel::Normal => 1.0,
        BoldLevel::Bold => 1.10,
        BoldLevel::ExtraBold => 1.10 * 1.15,
    }
}

fn wrap_lines(region: &TextRegion, width: f32, font: &FontHandle) -> Vec<String> {
    match region.wrap_mode {
        WrapMode::Word => wrap_words(&region.text, width, font),
        WrapMode::Char => wrap_chars(&region.text, width, font),
    }
}

/// Lay the region's text out inside its target box on an `img_w` x `img_h`
/// image. Every fit decision (size cap, bold inflation, wrapping, the
/// overflow procedure) happens in base scale-1 units; `scale` (1 for
/// preview and standard export, 2 for the supersampled path) multiplies
/// the finished geometry on the way out. Flooring in scaled units instead
/// would let the paths drift apart whenever the 60 % cap lands on a
/// fraction. Every render path calls this one function, so line breaks,
/// font size and positions agree exactly across scales.
///
/// Returns `None` for unpositioned regions and boxes that degenerate after
/// clamping; never fails otherwise.
pub fn layout_region(
    region: &TextRegion,
    img_w: u32,
    img_h: u32,
    scale: u32,
    fonts: &FontResolver,
) -> Option<RegionLayout> {
    let scale = scale.max(1);
    let rect = region.effective_box()?.clamped_to(img_w, img_h)?;

    let box_height = rect.height() as f32;

    // Size cap, then bold inflation on top.
    let requested = region.font_size.max(1) as f32;
    let capped = requested
        .min((box_height * MAX_FONT_BOX_RATIO).floor())
        .max(MIN_FONT_SIZE);
    let mut font_px = (capped * bold_factor(region.bold_level)).floor();

    // Text sub-rectangle; margin may be negative to allow overflow.
    let margin = region.margin;
    let mut tx1 = (rect.x1 + margin) as f32;
    let mut ty1 = (rect.y1 + margin) as f32;
    let mut tx2 = (rect.x2 - margin) as f32;
    let mut ty2 = (rect.y2 - margin) as f32;
    if tx2 <= tx1 || ty2 <= ty1 {
        // Degenerate after margins: substitute a minimum-size rectangle
        // anchored at the box's top-left.
        let min_w = (font_px * 2.0).max(20.0);
        let min_h = font_px.max(15.0);
        tx1 = rect.x1 as f32;
        ty1 = rect.y1 as f32;
        tx2 = (rect.x1 as f32 + min_w).max(rect.x2 as f32);
        ty2 = (rect.y1 as f32 + min_h).max(rect.y2 as f32);
    }

    // Wrap width widens for negative margins to pre-compensate the
    // allowed overflow.
    let inner_w = (tx2 - tx1).max(10.0);
    let wrap_width = if margin < 0 {
        inner_w - (margin * 2) as f32
    } else {
        inner_w
    };

    let mut font = fonts.resolve(&region.font_family, font_px, region.bold_level);
    let mut lines = wrap_lines(region, wrap_width, &font);

    let available = ty2 - ty1;
    let mut line_height = (font_px * region.line_spacing).round();
    let mut total = lines.len() as f32 * line_height;

    if total > available {
        // First compress the spacing, never below the font size itself.
        line_height = (available / lines.len() as f32).floor().max(font_px);
        total = lines.len() as f32 * line_height;

        if total > available {
            // Still overflowing: scale the font down and re-wrap once.
            // The line count may change, so height is recomputed after.
            let shrink = available / total;
            font_px = (font_px * shrink).floor().max(MIN_FONT_SIZE);
            font = fonts.resolve(&region.font_family, font_px, region.bold_level);
            lines = wrap_lines(region, wrap_width, &font);
            line_height = (available / lines.len() as f32).floor().max(font_px);
            total = lines.len() as f32 * line_height;
        }
    }

    let start_y = ty1 + (available - total) / 2.0;
    let tolerance = FIT_TOLERANCE;

    let mut placed = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let y = start_y + idx as f32 * line_height;
        if y + font_px <= ty2 + tolerance {
            let width = font.measure(line);
            placed.push(PlacedLine {
                x: aligned_x(region.text_align, tx1, tx2, width),
                y,
                width,
                text: line.clone(),
            });
            continue;
        }
        // The line's baseline row no longer fits. If it is at least
        // partially inside the box, truncate it with an ellipsis into the
        // wrap width; everything below is dropped entirely.
        if y <= ty2 + tolerance {
            if let Some(truncated) = truncate_with_ellipsis(line, wrap_width, &font) {
                let width = font.measure(&truncated);
                placed.push(PlacedLine {
                    x: aligned_x(region.text_align, tx1, tx2, width),
                    y,
                    width,
                    text: truncated,
                });
            }
        }
        break;
    }

    // Multiply the finished base-unit layout out to destination pixels.
    let s = scale as f32;
    Some(RegionLayout {
        box_rect: rect.scaled(scale as i32),
        font_size: font_px * s,
        line_height: line_height * s,
        lines: placed
            .into_iter()
            .map(|line| PlacedLine {
                text: line.text,
                x: line.x * s,
                y: line.y * s,
                width: line.width * s,
            })
            .collect(),
        color: region.color,
        background: if region.background.is_transparent() {
            None
        } else {
            Some(region.background)
        },
        stroke: match (region.stroke_color, region.stroke_width) {
            (Some(color), width) if width > 0 => Some((color, width as f32 * s)),
            _ => None,
        },
        font: font.with_size(font_px * s),
    })
}

fn aligned_x(align: TextAlign, tx1: f32, tx2: f32, width: f32) -> f32 {
    match align {
        TextAlign::Left => tx1,
        TextAlign::Right => tx2 - width,
        TextAlign::Center => tx1 + (tx2 - tx1 - width) / 2.0,
    }
}

/// Strip trailing characters until the text plus "..." fits the width.
/// Returns `None` when nothing remains.
fn truncate_with_ellipsis(line: &str, max_width: f32, font: &FontHandle) -> Option<String> {
    let mut kept: Vec<char> = line.chars().collect();
    while !kept.is_empty() {
        let candidate: String = kept.iter().collect::<String>() + "...";
        if font.measure(&candidate) <= max_width {
            return Some(candidate);
        }
        kept.pop();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{StyleDefaults, TextRegion};

    fn region_in_box(text: &str, rect: RectPx) -> TextRegion {
        let mut region = TextRegion::new(text, &StyleDefaults::default());
        region.set_target_box(rect, 1000, 1000);
        region
    }

    fn fonts() -> FontResolver {
        FontResolver::default()
    }

    #[test]
    fn unpositioned_region_has_no_layout() {
        let region = TextRegion::new("hi", &StyleDefaults::default());
        assert!(layout_region(&region, 1000, 1000, 1, &fonts()).is_none());
    }

    #[test]
    fn font_size_respects_box_bounds() {
        // Tall request, small box: capped at 60 % of the box height.
        let mut region = region_in_box("hello", RectPx::new(0, 0, 200, 40));
        region.font_size = 100;
        let layout = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        assert_eq!(layout.font_size, (40.0 * 0.6_f32).floor());

        // Tiny request: floored at 8 px.
        region.font_size = 1;
        let layout = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        assert!(layout.font_size >= 8.0);
    }

    #[test]
    fn bold_inflates_size_on_every_path() {
        let mut region = region_in_box("hello", RectPx::new(0, 0, 300, 100));
        region.font_size = 20;
        let normal = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");

        region.bold_level = BoldLevel::Bold;
        let bold = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        assert_eq!(bold.font_size, (normal.font_size * 1.10).floor());

        region.bold_level = BoldLevel::ExtraBold;
        let extra = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        assert_eq!(extra.font_size, (normal.font_size * 1.10 * 1.15).floor());
    }

    #[test]
    fn negative_margin_widens_wrap_width() {
        // 100x50 box with margin -10: the sub-rectangle grows to 120x70
        // and the wrap budget grows again by 2*|margin| to 140.
        let long_text = "aaaa bbbb cccc dddd eeee ffff gggg hhhh";
        let mut with_margin = region_in_box(long_text, RectPx::new(100, 100, 200, 150));
        with_margin.font_size = 16;
        with_margin.margin = -10;
        let mut without = with_margin.clone();
        without.margin = 0;

        let wide = layout_region(&with_margin, 1000, 1000, 1, &fonts()).expect("layout");
        let tight = layout_region(&without, 1000, 1000, 1, &fonts()).expect("layout");
        // More budget, no more lines; text may run outside the box.
        assert!(wide.lines.len() <= tight.lines.len());
        assert!(wide.lines.iter().any(|line| line.x < 100.0 || line.width > 100.0));
    }

    #[test]
    fn overflow_shrinks_font_and_rewraps() {
        // Enough text for several lines at the requested size in a box
        // only tall enough for a few.
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let mut region = region_in_box(text, RectPx::new(0, 0, 120, 60));
        region.font_size = 20;
        region.line_spacing = 1.2;
        let layout = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");

        assert!(layout.font_size >= 8.0);
        let total = layout.lines.len() as f32 * layout.line_height;
        // Fits, or bottomed out at the minimum size with truncation.
        assert!(total <= 60.0 + 20.0 || layout.font_size == 8.0);
    }

    #[test]
    fn block_is_vertically_centered() {
        let mut region = region_in_box("hi", RectPx::new(0, 0, 200, 100));
        region.font_size = 20;
        region.margin = 0;
        let layout = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        assert_eq!(layout.lines.len(), 1);
        let line = &layout.lines[0];
        let expected = (100.0 - layout.line_height) / 2.0;
        assert!((line.y - expected).abs() < 1.0);
    }

    #[test]
    fn alignment_places_lines_horizontally() {
        let mut region = region_in_box("hi", RectPx::new(0, 0, 200, 100));
        region.font_size = 20;
        region.margin = 0;

        region.text_align = TextAlign::Left;
        let left = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        assert_eq!(left.lines[0].x, 0.0);

        region.text_align = TextAlign::Right;
        let right = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        let line = &right.lines[0];
        assert!((line.x + line.width - 200.0).abs() < 1.0);

        region.text_align = TextAlign::Center;
        let center = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        let line = &center.lines[0];
        assert!((line.x - (200.0 - line.width) / 2.0).abs() < 1.0);
    }

    #[test]
    fn transparent_background_is_not_drawn() {
        let mut region = region_in_box("hi", RectPx::new(0, 0, 100, 50));
        region.background = Rgba::new(255, 255, 255, 0);
        let layout = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        assert!(layout.background.is_none());

        region.background = Rgba::new(200, 200, 200, 255);
        let layout = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        assert_eq!(layout.background, Some(Rgba::new(200, 200, 200, 255)));
    }

    #[test]
    fn stroke_scales_with_geometry() {
        let mut region = region_in_box("hi", RectPx::new(0, 0, 100, 50));
        region.set_stroke(Some(Rgb::new(255, 0, 0)), 2);
        let layout = layout_region(&region, 1000, 1000, 2, &fonts()).expect("layout");
        let (color, width) = layout.stroke.expect("stroke");
        assert_eq!(color, Rgb::new(255, 0, 0));
        assert_eq!(width, 4.0);
    }

    #[test]
    fn truncation_appends_ellipsis_within_width() {
        let font = FontHandle::builtin(10.0);
        // 6 px per char; "abcdefgh..." is 11 chars = 66 px.
        let truncated = truncate_with_ellipsis("abcdefghij", 60.0, &font).expect("truncated");
        assert!(truncated.ends_with("..."));
        assert!(font.measure(&truncated) <= 60.0);

        assert_eq!(truncate_with_ellipsis("abc", 1.0, &font), None);
    }

    #[test]
    fn capped_font_scales_exactly_across_paths() {
        // floor(41 * 0.6) = 24 caps the request at a value that only
        // doubles cleanly when the size is decided once in base units;
        // flooring in scaled units would give 49 instead of 48 at 2x.
        let mut region = region_in_box("가나다라마바사아자차카타", RectPx::new(0, 0, 105, 41));
        region.font_size = 100;
        region.wrap_mode = WrapMode::Char;

        let base = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        let doubled = layout_region(&region, 1000, 1000, 2, &fonts()).expect("layout");

        assert_eq!(doubled.font_size, base.font_size * 2.0);
        assert_eq!(doubled.line_height, base.line_height * 2.0);
        assert_eq!(doubled.box_rect, base.box_rect.scaled(2));

        let base_lines: Vec<&str> = base.lines.iter().map(|l| l.text.as_str()).collect();
        let doubled_lines: Vec<&str> = doubled.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(base_lines, doubled_lines);
        for (one, two) in base.lines.iter().zip(doubled.lines.iter()) {
            assert_eq!(two.x, one.x * 2.0);
            assert_eq!(two.y, one.y * 2.0);
            assert_eq!(two.width, one.width * 2.0);
        }
    }

    #[test]
    fn scaled_layout_keeps_the_same_line_breaks() {
        let text = "가나다라마바사아 alpha beta gamma delta";
        let mut region = region_in_box(text, RectPx::new(10, 10, 210, 110));
        region.font_size = 16;
        region.wrap_mode = WrapMode::Char;

        let base = layout_region(&region, 1000, 1000, 1, &fonts()).expect("layout");
        let doubled = layout_region(&region, 1000, 1000, 2, &fonts()).expect("layout");

        let base_lines: Vec<&str> = base.lines.iter().map(|l| l.text.as_str()).collect();
        let doubled_lines: Vec<&str> = doubled.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(base_lines, doubled_lines);
        assert_eq!(doubled.font_size, base.font_size * 2.0);
    }
}

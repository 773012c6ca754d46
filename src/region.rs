use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Wrapping strategy for a region. `Word` splits on whitespace, `Char`
/// breaks inside dense-script runs at character boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
    Word,
    Char,
}

impl WrapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WrapMode::Word => "word",
            WrapMode::Char => "char",
        }
    }

    pub fn parse(value: &str) -> Option<WrapMode> {
        match value.trim() {
            "word" => Some(WrapMode::Word),
            "char" => Some(WrapMode::Char),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }

    pub fn parse(value: &str) -> Option<TextAlign> {
        match value.trim() {
            "left" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" => Some(TextAlign::Right),
            _ => None,
        }
    }
}

/// Font weight level. Serialized as 0/1/2 in CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoldLevel {
    Normal,
    Bold,
    ExtraBold,
}

impl BoldLevel {
    pub fn as_u8(&self) -> u8 {
        match self {
            BoldLevel::Normal => 0,
            BoldLevel::Bold => 1,
            BoldLevel::ExtraBold => 2,
        }
    }

    pub fn from_u8(value: u8) -> BoldLevel {
        match value {
            0 => BoldLevel::Normal,
            1 => BoldLevel::Bold,
            _ => BoldLevel::ExtraBold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Rgba {
        Rgba { r, g, b, a }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

/// Axis-aligned rectangle in image pixels, stored as corner coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectPx {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl RectPx {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> RectPx {
        RectPx { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Clamp into `img_w` x `img_h`, right/bottom exclusive, keeping a
    /// minimum 2 px extent. Returns `None` when the image itself cannot
    /// hold a 2 px box.
    pub fn clamped_to(&self, img_w: u32, img_h: u32) -> Option<RectPx> {
        let img_w = img_w as i32;
        let img_h = img_h as i32;
        if img_w < 2 || img_h < 2 {
            return None;
        }
        let x1 = self.x1.clamp(0, img_w - 2);
        let y1 = self.y1.clamp(0, img_h - 2);
        // x1 <= img_w - 2 guarantees the lower bound never exceeds the
        // upper one.
        let x2 = self.x2.clamp(x1 + 2, img_w);
        let y2 = self.y2.clamp(y1 + 2, img_h);
        Some(RectPx::new(x1, y1, x2, y2))
    }

    pub fn scaled(&self, scale: i32) -> RectPx {
        RectPx::new(
            self.x1 * scale,
            self.y1 * scale,
            self.x2 * scale,
            self.y2 * scale,
        )
    }

    pub fn translated(&self, dx: i32, dy: i32) -> RectPx {
        RectPx::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }
}

/// Default style applied to new regions, sourced from settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDefaults {
    pub font_family: String,
    pub font_size: i32,
    pub color: Rgb,
    pub background: Rgba,
    pub margin: i32,
    pub wrap_mode: WrapMode,
    pub line_spacing: f32,
    pub text_align: TextAlign,
}

impl Default for StyleDefaults {
    fn default() -> Self {
        Self {
            font_family: "NanumGothic".to_string(),
            font_size: 18,
            color: Rgb::BLACK,
            background: Rgba::WHITE,
            margin: 2,
            wrap_mode: WrapMode::Word,
            line_spacing: 1.2,
            text_align: TextAlign::Center,
        }
    }
}

/// One piece of styled text with its placement on a target image.
/// Every field has an explicit value; there are no "maybe missing"
/// attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    pub text: String,
    /// Origin bounding box from OCR, informational only.
    pub source_box: RectPx,
    pub target_box: Option<RectPx>,
    pub is_positioned: bool,
    pub font_family: String,
    pub font_size: i32,
    pub bold_level: BoldLevel,
    pub color: Rgb,
    pub background: Rgba,
    pub stroke_color: Option<Rgb>,
    pub stroke_width: i32,
    pub margin: i32,
    pub wrap_mode: WrapMode,
    pub line_spacing: f32,
    pub text_align: TextAlign,
    pub image_filename: Option<String>,
    pub is_manual: bool,
    pub visible: bool,
}

impl TextRegion {
    pub fn new(text: impl Into<String>, defaults: &StyleDefaults) -> TextRegion {
        TextRegion {
            text: text.into(),
            source_box: RectPx::new(0, 0, 0, 0),
            target_box: None,
            is_positioned: false,
            font_family: defaults.font_family.clone(),
            font_size: defaults.font_size,
            bold_level: BoldLevel::Normal,
            color: defaults.color,
            background: defaults.background,
            stroke_color: None,
            stroke_width: 0,
            margin: defaults.margin,
            wrap_mode: defaults.wrap_mode,
            line_spacing: defaults.line_spacing,
            text_align: defaults.text_align,
            image_filename: None,
            is_manual: false,
            visible: true,
        }
    }

    /// Re-establish the stroke invariant: width 0 and no color imply
    /// each other.
    pub fn normalize(&mut self) {
        if self.stroke_width <= 0 {
            self.stroke_width = 0;
            self.stroke_color = None;
        } else if self.stroke_color.is_none() {
            self.stroke_width = 0;
        }
    }

    pub fn set_stroke(&mut self, color: Option<Rgb>, width: i32) {
        self.stroke_color = color;
        self.stroke_width = width.max(0);
        self.normalize();
    }

    /// Place the region on an image, clamping the box into bounds.
    pub fn set_target_box(&mut self, rect: RectPx, img_w: u32, img_h: u32) {
        match rect.clamped_to(img_w, img_h) {
            Some(clamped) => {
                self.target_box = Some(clamped);
                self.is_positioned = true;
            }
            None => {
                self.target_box = None;
                self.is_positioned = false;
            }
        }
    }

    pub fn effective_box(&self) -> Option<RectPx> {
        if self.is_positioned { self.target_box } else { None }
    }
}

/// The ordered collection of regions, owned by the interaction thread.
#[derive(Debug, Default)]
pub struct RegionSet {
    regions: Vec<TextRegion>,
}

impl RegionSet {
    pub fn new() -> RegionSet {
        RegionSet {
            regions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TextRegion> {
        self.regions.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TextRegion> {
        self.regions.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextRegion> {
        self.regions.iter()
    }

    pub fn push(&mut self, region: TextRegion) {
        self.regions.push(region);
    }

    /// One region per non-empty OCR line, unpositioned and automatic.
    /// Returns the number of regions added.
    pub fn extend_from_ocr(&mut self, lines: &[String], defaults: &StyleDefaults) -> usize {
        let mut added = 0;
        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut region = TextRegion::new(trimmed, defaults);
            region.is_manual = false;
            self.regions.push(region);
            added += 1;
        }
        added
    }

    pub fn add_manual(&mut self, text: impl Into<String>, defaults: &StyleDefaults) -> usize {
        let mut region = TextRegion::new(text, defaults);
        region.is_manual = true;
        self.regions.push(region);
        self.regions.len() - 1
    }

    /// Merge the given regions into the first of them, joining texts with
    /// newlines; the consumed regions are removed. Indices outside the set
    /// are ignored. Returns the index the merged region ends up at.
    pub fn merge(&mut self, indices: &[usize]) -> Option<usize> {
        let mut selected: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|idx| *idx < self.regions.len())
            .collect();
        selected.sort_unstable();
        selected.dedup();
        if selected.len() < 2 {
            return selected.first().copied();
        }
        let target = selected[0];
        let merged_text = selected
            .iter()
            .map(|idx| self.regions[*idx].text.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.regions[target].text = merged_text;
        for idx in selected.iter().skip(1).rev() {
            self.regions.remove(*idx);
        }
        Some(target)
    }

    pub fn delete(&mut self, index: usize) -> Option<TextRegion> {
        if index < self.regions.len() {
            Some(self.regions.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Regions that render onto the image with the given basename:
    /// positioned, visible and associated with it.
    pub fn for_image<'a>(&'a self, basename: &'a str) -> impl Iterator<Item = &'a TextRegion> {
        self.regions.iter().filter(move |region| {
            region.visible
                && region.is_positioned
                && region.target_box.is_some()
                && region.image_filename.as_deref() == Some(basename)
        })
    }

    pub fn move_box(&mut self, index: usize, dx: i32, dy: i32, img_w: u32, img_h: u32) {
        if let Some(region) = self.regions.get_mut(index) {
            if let Some(rect) = region.effective_box() {
                region.set_target_box(rect.translated(dx, dy), img_w, img_h);
            }
        }
    }

    pub fn resize_box(&mut self, index: usize, rect: RectPx, img_w: u32, img_h: u32) {
        if let Some(region) = self.regions.get_mut(index) {
            region.set_target_box(rect, img_w, img_h);
        }
    }
}

/// Coalesces continuous drag updates so layout recomputes at most once
/// per interval.
#[derive(Debug)]
pub struct DragThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl DragThrottle {
    pub fn new(interval: Duration) -> DragThrottle {
        DragThrottle {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for DragThrottle {
    fn default() -> Self {
        DragThrottle::new(Duration::from_millis(8))
    }
}

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use csv::StringRecord;

use crate::region::{
    BoldLevel, RectPx, Rgb, StyleDefaults, TextAlign, TextRegion, WrapMode,
};

const HEADERS: [&str; 19] = [
    "index",
    "text",
    "image",
    "x1",
    "y1",
    "x2",
    "y2",
    "font_size",
    "font_family",
    "color_b",
    "color_g",
    "color_r",
    "margin",
    "wrap_mode",
    "line_spacing",
    "bold",
    "align",
    "is_positioned",
    "is_manual",
];

/// Korean header aliases accepted on import, so older files load
/// unchanged.
fn canonical_header(name: &str) -> &str {
    match name.trim() {
        "번호" => "index",
        "텍스트" => "text",
        "이미지파일명" => "image",
        "폰트크기" => "font_size",
        "폰트" => "font_family",
        "색상B" => "color_b",
        "색상G" => "color_g",
        "색상R" => "color_r",
        "여백" => "margin",
        "줄바꿈모드" => "wrap_mode",
        "줄간격" => "line_spacing",
        "볼드" => "bold",
        "정렬" => "align",
        other => other,
    }
}

pub fn export_csv(path: &Path, regions: &[TextRegion]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create CSV: {}", path.display()))?;
    writer.write_record(HEADERS)?;

    for (index, region) in regions.iter().enumerate() {
        let (x1, y1, x2, y2) = match region.effective_box() {
            Some(rect) => (
                rect.x1.to_string(),
                rect.y1.to_string(),
                rect.x2.to_string(),
                rect.y2.to_string(),
            ),
            None => Default::default(),
        };
        writer.write_record([
            index.to_string(),
            region.text.clone(),
            region.image_filename.clone().unwrap_or_default(),
            x1,
            y1,
            x2,
            y2,
            region.font_size.to_string(),
            region.font_family.clone(),
            region.color.b.to_string(),
            region.color.g.to_string(),
            region.color.r.to_string(),
            region.margin.to_string(),
            region.wrap_mode.as_str().to_string(),
            region.line_spacing.to_string(),
            region.bold_level.as_u8().to_string(),
            region.text_align.as_str().to_string(),
            if region.is_positioned { "1" } else { "0" }.to_string(),
            if region.is_manual { "1" } else { "0" }.to_string(),
        ])?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to write CSV: {}", path.display()))
}

/// Load regions from a CSV file. The extended schema is matched by header
/// name; the legacy 2-column `(index, text)` form still loads, defaulting
/// every other field and marking rows manual. Malformed rows are skipped
/// with a log entry rather than aborting the import.
pub fn import_csv(path: &Path, defaults: &StyleDefaults) -> Result<Vec<TextRegion>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open CSV: {}", path.display()))?;

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record.with_context(|| "failed to read CSV header")?,
        None => return Ok(Vec::new()),
    };

    let columns: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(idx, name)| (canonical_header(name).to_string(), idx))
        .collect();
    let legacy = header.len() <= 2;

    let mut regions = Vec::new();
    for (row_idx, record) in records.enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(row = row_idx, %err, "skipping malformed CSV row");
                continue;
            }
        };
        let region = if legacy {
            parse_legacy_row(&record, defaults)
        } else {
            parse_extended_row(&record, &columns, defaults)
        };
        match region {
            Some(region) => regions.push(region),
            None => tracing::warn!(row = row_idx, "skipping CSV row without text"),
        }
    }
    Ok(regions)
}

fn parse_legacy_row(record: &StringRecord, defaults: &StyleDefaults) -> Option<TextRegion> {
    let text = record.get(1).filter(|text| !text.is_empty())?;
    let mut region = TextRegion::new(text, defaults);
    region.is_manual = true;
    Some(region)
}

fn parse_extended_row(
    record: &StringRecord,
    columns: &HashMap<String, usize>,
    defaults: &StyleDefaults,
) -> Option<TextRegion> {
    let get = |name: &str| -> Option<&str> {
        columns
            .get(name)
            .and_then(|idx| record.get(*idx))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let text = get("text")?;
    let mut region = TextRegion::new(text, defaults);
    region.is_manual = true;

    region.image_filename = get("image").map(str::to_string);

    let coords = (
        get("x1").and_then(|v| v.parse::<i32>().ok()),
        get("y1").and_then(|v| v.parse::<i32>().ok()),
        get("x2").and_then(|v| v.parse::<i32>().ok()),
        get("y2").and_then(|v| v.parse::<i32>().ok()),
    );
    if let (Some(x1), Some(y1), Some(x2), Some(y2)) = coords {
        if x2 > x1 && y2 > y1 {
            region.target_box = Some(RectPx::new(x1, y1, x2, y2));
            region.is_positioned = true;
        }
    }

    if let Some(size) = get("font_size").and_then(|v| v.parse::<i32>().ok()) {
        region.font_size = size;
    }
    if let Some(family) = get("font_family") {
        region.font_family = family.to_string();
    }

    let b = get("color_b").and_then(|v| v.parse::<u8>().ok());
    let g = get("color_g").and_then(|v| v.parse::<u8>().ok());
    let r = get("color_r").and_then(|v| v.parse::<u8>().ok());
    if let (Some(b), Some(g), Some(r)) = (b, g, r) {
        region.color = Rgb::new(r, g, b);
    }

    if let Some(margin) = get("margin").and_then(|v| v.parse::<i32>().ok()) {
        region.margin = margin;
    }
    if let Some(mode) = get("wrap_mode").and_then(WrapMode::parse) {
        region.wrap_mode = mode;
    }
    if let Some(spacing) = get("line_spacing").and_then(|v| v.parse::<f32>().ok()) {
        region.line_spacing = spacing;
    }
    if let Some(bold) = get("bold").and_then(|v| v.parse::<u8>().ok()) {
        region.bold_level = BoldLevel::from_u8(bold);
    }
    if let Some(align) = get("align").and_then(TextAlign::parse) {
        region.text_align = align;
    }
    // An explicit "0" unplaces the region even with valid coordinates;
    // "1" never conjures a position without a box.
    match get("is_positioned") {
        Some("0") => {
            region.is_positioned = false;
            region.target_box = None;
        }
        Some("1") => region.is_positioned = region.target_box.is_some(),
        _ => {}
    }
    if get("is_manual") == Some("0") {
        region.is_manual = false;
    }

    region.normalize();
    Some(region)
}

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use ttf_parser::Face;
use ttf_parser::name_id;

use crate::region::BoldLevel;

/// Width fallback when no font metrics are available: each character is
/// estimated at 0.6 em. Every wrap call site goes through the same
/// estimate so layout stays deterministic without real fonts.
const FALLBACK_CHAR_FACTOR: f32 = 0.6;

/// Parsed face data plus the advances needed for width measurement.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

/// A resolved font at a concrete pixel size. Always usable: a handle
/// without metrics measures via the character-count estimate.
#[derive(Clone)]
pub struct FontHandle {
    size: f32,
    metrics: Option<FontMetrics>,
}

impl FontHandle {
    pub fn builtin(size: f32) -> FontHandle {
        FontHandle {
            size: size.max(1.0),
            metrics: None,
        }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn is_builtin(&self) -> bool {
        self.metrics.is_none()
    }

    pub fn family(&self) -> Option<&str> {
        self.metrics.as_ref().and_then(|metrics| metrics.family())
    }

    pub fn font_data(&self) -> Option<&[u8]> {
        self.metrics.as_ref().map(|metrics| metrics.data())
    }

    pub fn with_size(&self, size: f32) -> FontHandle {
        FontHandle {
            size: size.max(1.0),
            metrics: self.metrics.clone(),
        }
    }

    /// Rendered pixel width of `text` at this handle's size.
    pub fn measure(&self, text: &str) -> f32 {
        measure_text_width_px(text, self.size, self.metrics.as_ref())
    }
}

pub fn measure_text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    if let Some(font) = font {
        if let Ok(face) = Face::parse(&font.data, font.face_index) {
            let mut advance = 0u32;
            for ch in text.chars() {
                if ch == '\n' {
                    continue;
                }
                if ch == ' ' {
                    advance = advance.saturating_add(font.space_advance as u32);
                    continue;
                }
                if let Some(glyph) = face.glyph_index(ch) {
                    let glyph_advance = face.glyph_hor_advance(glyph).unwrap_or(font.space_advance);
                    advance = advance.saturating_add(glyph_advance as u32);
                } else {
                    advance = advance.saturating_add(font.space_advance as u32);
                }
            }
            let units = font.units_per_em.max(1) as f32;
            return advance as f32 * (font_size / units);
        }
    }
    text.chars().filter(|ch| *ch != '\n').count() as f32 * font_size * FALLBACK_CHAR_FACTOR
}

fn load_font_metrics_from_data(data: &[u8]) -> Result<FontMetrics> {
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            return Ok(FontMetrics {
                data: Arc::new(data.to_vec()),
                units_per_em,
                space_advance,
                family,
                face_index: index,
            });
        }
    }
    Err(anyhow!("failed to parse font data"))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

struct FamilyCandidates {
    names: &'static [&'static str],
    base: &'static [&'static str],
    bold: &'static [&'static str],
    extra_bold: &'static [&'static str],
}

/// Known families and their candidate files, tried in order. Bundled
/// `fonts/` paths are resolved relative to the working directory first,
/// then the platform locations.
const KNOWN_FAMILIES: &[FamilyCandidates] = &[
    FamilyCandidates {
        names: &["NanumGothic", "나눔고딕"],
        base: &[
            "fonts/NanumGothic.ttf",
            "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
            "C:/Windows/Fonts/NanumGothic.ttf",
        ],
        bold: &[
            "fonts/NanumGothicBold.ttf",
            "/usr/share/fonts/truetype/nanum/NanumGothicBold.ttf",
            "C:/Windows/Fonts/NanumGothicBold.ttf",
        ],
        extra_bold: &[
            "fonts/NanumGothicExtraBold.ttf",
            "/usr/share/fonts/truetype/nanum/NanumGothicExtraBold.ttf",
            "C:/Windows/Fonts/NanumGothicExtraBold.ttf",
        ],
    },
    FamilyCandidates {
        names: &["Malgun Gothic", "맑은 고딕"],
        base: &["fonts/malgun.ttf", "C:/Windows/Fonts/malgun.ttf"],
        bold: &["C:/Windows/Fonts/malgunbd.ttf"],
        extra_bold: &[],
    },
    FamilyCandidates {
        names: &["Gulim", "굴림"],
        base: &[
            "fonts/gulim.ttc",
            "C:/Windows/Fonts/gulim.ttc",
            "C:/Windows/Fonts/NGULIM.TTF",
        ],
        bold: &["C:/Windows/Fonts/gulim.ttc"],
        extra_bold: &[],
    },
    FamilyCandidates {
        names: &["Arial"],
        base: &[
            "fonts/arial.ttf",
            "C:/Windows/Fonts/arial.ttf",
            "/Library/Fonts/Arial.ttf",
        ],
        bold: &["C:/Windows/Fonts/arialbd.ttf"],
        extra_bold: &[],
    },
    FamilyCandidates {
        names: &["Times New Roman"],
        base: &["fonts/times.ttf", "C:/Windows/Fonts/times.ttf"],
        bold: &["C:/Windows/Fonts/timesbd.ttf"],
        extra_bold: &[],
    },
    FamilyCandidates {
        names: &["Courier New"],
        base: &["fonts/cour.ttf", "C:/Windows/Fonts/cour.ttf"],
        bold: &["C:/Windows/Fonts/courbd.ttf"],
        extra_bold: &[],
    },
];

/// Tried when the family yields nothing loadable. Covers the dense-script
/// fallback fonts and common system locations.
const DEFAULT_FALLBACK_PATHS: &[&str] = &[
    "fonts/NanumGothic.ttf",
    "fonts/malgun.ttf",
    "fonts/gulim.ttc",
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "C:/Windows/Fonts/NanumGothic.ttf",
    "C:/Windows/Fonts/malgun.ttf",
    "C:/Windows/Fonts/gulim.ttc",
    "C:/Windows/Fonts/batang.ttc",
    "C:/Windows/Fonts/dotum.ttc",
    "/System/Library/Fonts/Helvetica.ttc",
];

/// Deterministic font resolution: custom registry first, then the known
/// family's candidates (weight variants before base), then the default
/// fallback list, finally the built-in estimating handle. Never fails.
pub struct FontResolver {
    custom: BTreeMap<String, PathBuf>,
    cache: RefCell<HashMap<PathBuf, Option<FontMetrics>>>,
}

impl FontResolver {
    pub fn new(custom: BTreeMap<String, PathBuf>) -> FontResolver {
        FontResolver {
            custom,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, family: &str, size: f32, bold: BoldLevel) -> FontHandle {
        for path in self.candidate_paths(family, bold) {
            if let Some(metrics) = self.load(&path) {
                return FontHandle {
                    size: size.max(1.0),
                    metrics: Some(metrics),
                };
            }
        }
        tracing::warn!(family, "no loadable font candidate, using built-in estimates");
        FontHandle::builtin(size)
    }

    fn candidate_paths(&self, family: &str, bold: BoldLevel) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(path) = self.custom.get(family) {
            paths.push(path.clone());
        }
        if let Some(candidates) = KNOWN_FAMILIES
            .iter()
            .find(|entry| entry.names.contains(&family))
        {
            // Extra-bold falls back to bold, bold to the base weight.
            if bold >= BoldLevel::ExtraBold {
                paths.extend(candidates.extra_bold.iter().map(PathBuf::from));
            }
            if bold >= BoldLevel::Bold {
                paths.extend(candidates.bold.iter().map(PathBuf::from));
            }
            paths.extend(candidates.base.iter().map(PathBuf::from));
        }
        paths.extend(DEFAULT_FALLBACK_PATHS.iter().map(PathBuf::from));
        paths
    }

    fn load(&self, path: &Path) -> Option<FontMetrics> {
        if let Some(cached) = self.cache.borrow().get(path) {
            return cached.clone();
        }
        let loaded = match std::fs::read(path) {
            Ok(data) => match load_font_metrics_from_data(&data) {
                Ok(metrics) => Some(metrics),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "failed to parse font");
                    None
                }
            },
            Err(_) => None,
        };
        self.cache
            .borrow_mut()
            .insert(path.to_path_buf(), loaded.clone());
        loaded
    }
}

impl Default for FontResolver {
    fn default() -> Self {
        FontResolver::new(BTreeMap::new())
    }
}

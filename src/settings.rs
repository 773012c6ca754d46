use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::region::{Rgb, Rgba, StyleDefaults, TextAlign, WrapMode};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

/// Environment variable that supplies the Vision API key directly,
/// overriding any `credentials` path from settings files.
pub const VISION_KEY_ENV: &str = "TEXT_OVERLAY_VISION_KEY";

#[derive(Debug, Clone)]
pub struct Settings {
    pub defaults: StyleDefaults,
    /// Custom fonts: display name to font file path.
    pub custom_fonts: BTreeMap<String, PathBuf>,
    /// Path to a file holding the Vision API key, or the key itself.
    pub vision_credentials: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            defaults: StyleDefaults::default(),
            custom_fonts: BTreeMap::new(),
            vision_credentials: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    overlay: Option<OverlaySettings>,
    vision: Option<VisionSettings>,
    fonts: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    font_family: Option<String>,
    font_size: Option<i32>,
    margin: Option<i32>,
    wrap_mode: Option<String>,
    line_spacing: Option<f32>,
    text_align: Option<String>,
    /// Text color as B,G,R.
    color: Option<[u8; 3]>,
    /// Background color as R,G,B,A.
    background: Option<[u8; 4]>,
}

#[derive(Debug, Default, Deserialize)]
struct VisionSettings {
    credentials: Option<String>,
}

/// Load settings in layering order: bundled defaults, then
/// `./settings.toml`, `./settings.local.toml`, the same pair under the
/// home directory, and finally an explicit extra path. Later files win
/// per field.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(overlay) = incoming.overlay {
            if let Some(family) = overlay.font_family {
                if !family.trim().is_empty() {
                    self.defaults.font_family = family;
                }
            }
            if let Some(size) = overlay.font_size {
                if size > 0 {
                    self.defaults.font_size = size;
                }
            }
            if let Some(margin) = overlay.margin {
                self.defaults.margin = margin;
            }
            if let Some(mode) = overlay.wrap_mode.as_deref().and_then(WrapMode::parse) {
                self.defaults.wrap_mode = mode;
            }
            if let Some(spacing) = overlay.line_spacing {
                if spacing > 0.0 {
                    self.defaults.line_spacing = spacing;
                }
            }
            if let Some(align) = overlay.text_align.as_deref().and_then(TextAlign::parse) {
                self.defaults.text_align = align;
            }
            if let Some([b, g, r]) = overlay.color {
                self.defaults.color = Rgb::new(r, g, b);
            }
            if let Some([r, g, b, a]) = overlay.background {
                self.defaults.background = Rgba::new(r, g, b, a);
            }
        }
        if let Some(vision) = incoming.vision {
            if let Some(credentials) = vision.credentials {
                if !credentials.trim().is_empty() {
                    self.vision_credentials = Some(credentials);
                }
            }
        }
        if let Some(fonts) = incoming.fonts {
            for (name, path) in fonts {
                if !path.trim().is_empty() {
                    self.custom_fonts.insert(name, PathBuf::from(path));
                }
            }
        }
    }

    /// Resolve the Vision API key: the environment variable wins, then
    /// `credentials` (read as a file when one exists at that path,
    /// otherwise taken verbatim).
    pub fn vision_api_key(&self) -> Result<Option<String>> {
        if let Ok(key) = std::env::var(VISION_KEY_ENV) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(Some(key));
            }
        }
        let Some(credentials) = &self.vision_credentials else {
            return Ok(None);
        };
        let path = expand_home(credentials);
        if path.exists() {
            let key = fs::read_to_string(&path)
                .with_context(|| format!("failed to read credentials: {}", path.display()))?;
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(anyhow!("credentials file is empty: {}", path.display()));
            }
            return Ok(Some(key));
        }
        Ok(Some(credentials.trim().to_string()))
    }
}

fn expand_home(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            if !home.trim().is_empty() {
                return Path::new(home.trim()).join(rest);
            }
        }
    }
    PathBuf::from(value)
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".text-overlay-rust"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;
    use crate::region::BoldLevel;

    #[test]
    fn defaults_match_bundled_file() {
        let parsed: SettingsFile =
            toml::from_str(DEFAULT_SETTINGS_TOML).expect("bundled settings parse");
        let mut settings = Settings::default();
        settings.merge(parsed);
        assert_eq!(settings.defaults, StyleDefaults::default());
        assert!(settings.custom_fonts.is_empty());
        assert!(settings.vision_credentials.is_none());
        // Bold is per-region, never a settings default.
        assert_eq!(BoldLevel::from_u8(0), BoldLevel::Normal);
    }

    #[test]
    fn home_settings_file_is_seeded() {
        with_temp_home(|home| {
            load_settings(None).expect("load");
            assert!(home.join(".text-overlay-rust/settings.toml").exists());
        });
    }

    #[test]
    fn extra_path_overrides_home_defaults() {
        with_temp_home(|home| {
            let extra = home.join("extra.toml");
            fs::write(
                &extra,
                concat!(
                    "[overlay]\n",
                    "font_size = 30\n",
                    "wrap_mode = \"char\"\n",
                    "color = [255, 0, 0]\n",
                    "[fonts]\n",
                    "\"My Font\" = \"/tmp/my-font.ttf\"\n",
                ),
            )
            .expect("write extra");

            let settings = load_settings(Some(&extra)).expect("load");
            assert_eq!(settings.defaults.font_size, 30);
            assert_eq!(settings.defaults.wrap_mode, WrapMode::Char);
            // Color array is B,G,R on disk.
            assert_eq!(settings.defaults.color, Rgb::new(0, 0, 255));
            // Untouched fields keep their defaults.
            assert_eq!(settings.defaults.font_family, "NanumGothic");
            assert_eq!(
                settings.custom_fonts.get("My Font"),
                Some(&PathBuf::from("/tmp/my-font.ttf"))
            );
        });
    }

    #[test]
    fn missing_extra_path_is_an_error() {
        with_temp_home(|home| {
            let missing = home.join("missing.toml");
            assert!(load_settings(Some(&missing)).is_err());
        });
    }

    #[test]
    fn credentials_file_is_read_when_present() {
        with_temp_home(|home| {
            let key_path = home.join("vision-key.txt");
            fs::write(&key_path, "abc123\n").expect("write key");
            let settings = Settings {
                vision_credentials: Some(key_path.to_string_lossy().into_owned()),
                ..Settings::default()
            };
            let key = settings.vision_api_key().expect("key");
            assert_eq!(key.as_deref(), Some("abc123"));
        });
    }

    #[test]
    fn literal_credentials_pass_through() {
        with_temp_home(|_| {
            let settings = Settings {
                vision_credentials: Some("raw-api-key".to_string()),
                ..Settings::default()
            };
            let key = settings.vision_api_key().expect("key");
            assert_eq!(key.as_deref(), Some("raw-api-key"));
        });
    }
}

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub mod csv_io;
pub mod export;
pub mod logging;
pub mod ocr;
pub mod overlay;
pub mod region;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use overlay::font::FontResolver;
pub use overlay::layout::{layout_region, RegionLayout};
pub use region::{RegionSet, StyleDefaults, TextRegion};

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Image to run OCR on; each detected line becomes a region.
    pub ocr_image: Option<String>,
    /// Vision API key or key file path, overriding settings.
    pub credentials: Option<String>,
    pub csv_in: Option<String>,
    pub csv_out: Option<String>,
    /// Target image the positioned regions belong to.
    pub image: Option<String>,
    /// Output path for the composited image.
    pub output: Option<String>,
    /// Render at double resolution and downsample.
    pub hires: bool,
    /// Decode-then-blend render path instead of data-URI embedding.
    pub legacy: bool,
    pub settings_path: Option<String>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let fonts = FontResolver::new(settings.custom_fonts.clone());
    let mut regions = RegionSet::new();
    let mut summary = Vec::new();

    if let Some(csv_in) = config.csv_in.as_deref() {
        let imported = csv_io::import_csv(Path::new(csv_in), &settings.defaults)?;
        let count = imported.len();
        for region in imported {
            regions.push(region);
        }
        summary.push(format!("imported {} regions from {}", count, csv_in));
    }

    if let Some(ocr_image) = config.ocr_image.as_deref() {
        let key = resolve_credentials(config.credentials.as_deref(), &settings)?
            .ok_or_else(|| anyhow!("OCR requires Vision API credentials (--credentials, settings [vision], or {})", settings::VISION_KEY_ENV))?;
        let lines = run_ocr(Path::new(ocr_image), key).await?;
        let added = regions.extend_from_ocr(&lines, &settings.defaults);
        // OCR'd regions belong to the image they were read from.
        let basename = file_basename(ocr_image);
        let total = regions.len();
        for index in total - added..total {
            if let Some(region) = regions.get_mut(index) {
                region.image_filename = Some(basename.clone());
            }
        }
        summary.push(format!("recognized {} regions in {}", added, ocr_image));
    }

    if let Some(csv_out) = config.csv_out.as_deref() {
        let all: Vec<TextRegion> = regions.iter().cloned().collect();
        csv_io::export_csv(Path::new(csv_out), &all)?;
        summary.push(format!("wrote {} regions to {}", all.len(), csv_out));
    }

    if let Some(image) = config.image.as_deref() {
        let output = config
            .output
            .as_deref()
            .ok_or_else(|| anyhow!("--image requires --output"))?;
        let written = export_image(&config, &regions, &fonts, image, output)?;
        summary.push(written);
    } else if config.output.is_some() {
        return Err(anyhow!("--output requires --image"));
    }

    if summary.is_empty() {
        return Err(anyhow!(
            "nothing to do (pass --ocr, --csv-in/--csv-out, or --image/--output)"
        ));
    }
    Ok(summary.join("\n"))
}

async fn run_ocr(image_path: &Path, api_key: String) -> Result<Vec<String>> {
    let mut receiver = ocr::spawn_ocr(image_path.to_path_buf(), api_key);
    match receiver.recv().await {
        Some(ocr::OcrEvent::Completed(lines)) => Ok(lines),
        Some(ocr::OcrEvent::Failed(err)) => {
            Err(anyhow!(err).context(format!("OCR failed for {}", image_path.display())))
        }
        None => Err(anyhow!("OCR task ended without a result")),
    }
}

fn export_image(
    config: &Config,
    regions: &RegionSet,
    fonts: &FontResolver,
    image: &str,
    output: &str,
) -> Result<String> {
    let image_bytes = std::fs::read(image)
        .with_context(|| format!("failed to read image: {}", image))?;
    let mime = export::mime_for_bytes(&image_bytes);
    let format = export::format_for_output(Path::new(output))?;
    let basename = file_basename(image);
    let selected: Vec<&TextRegion> = regions.for_image(&basename).collect();
    tracing::info!(
        image = %image,
        regions = selected.len(),
        hires = config.hires,
        legacy = config.legacy,
        "rendering"
    );

    let encoded = if config.legacy {
        export::export_legacy(&image_bytes, selected.iter().copied(), fonts, format)?
    } else if config.hires {
        export::export_supersampled(&image_bytes, mime, selected.iter().copied(), fonts, format)?
    } else {
        export::export_standard(&image_bytes, mime, selected.iter().copied(), fonts, format)?
    };

    std::fs::write(output, &encoded)
        .with_context(|| format!("failed to write image: {}", output))?;
    Ok(format!(
        "rendered {} regions onto {} -> {}",
        selected.len(),
        image,
        output
    ))
}

/// The key used to associate regions with an image is the file name,
/// not the full path.
fn file_basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn resolve_credentials(cli_value: Option<&str>, settings: &settings::Settings) -> Result<Option<String>> {
    if let Some(value) = cli_value {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        let path = PathBuf::from(value);
        if path.exists() {
            let key = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read credentials: {}", path.display()))?;
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(anyhow!("credentials file is empty: {}", path.display()));
            }
            return Ok(Some(key));
        }
        return Ok(Some(value.to_string()));
    }
    settings.vision_api_key()
}

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "text-overlay-rust",
    version,
    about = "Recognize, place and composite text regions onto images"
)]
struct Cli {
    /// Run OCR on this image; each detected line becomes a region
    #[arg(short = 'o', long = "ocr")]
    ocr: Option<String>,

    /// Vision API key or key file path (overrides settings)
    #[arg(short = 'k', long = "credentials")]
    credentials: Option<String>,

    /// Load regions from a CSV file (extended or legacy schema)
    #[arg(long = "csv-in")]
    csv_in: Option<String>,

    /// Write all regions to a CSV file
    #[arg(long = "csv-out")]
    csv_out: Option<String>,

    /// Target image to composite positioned regions onto
    #[arg(short = 'i', long = "image")]
    image: Option<String>,

    /// Output path for the composited image (png/jpg)
    #[arg(short = 'O', long = "output")]
    output: Option<String>,

    /// Render at double resolution and downsample
    #[arg(long = "hires")]
    hires: bool,

    /// Decode-then-blend render path instead of data-URI embedding
    #[arg(long = "legacy")]
    legacy: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    text_overlay_rust::logging::init(cli.verbose)?;

    let output = text_overlay_rust::run(text_overlay_rust::Config {
        ocr_image: cli.ocr,
        credentials: cli.credentials,
        csv_in: cli.csv_in,
        csv_out: cli.csv_out,
        image: cli.image,
        output: cli.output,
        hires: cli.hires,
        legacy: cli.legacy,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}

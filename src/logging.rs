use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Console logging for the CLI. Recovered failures (font fall-through,
/// skipped CSV rows) are warnings and always visible; `--verbose` adds
/// per-render debug detail.
pub fn init(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .try_init();
    Ok(())
}

//! Diagnostics logging setup.
//!
//! Every `tracing` event goes to a size-rotated debug log. A console layer
//! on stderr is added only when the terminal is not owned by the TUI.

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use super::rotating::{RotatingFile, SharedRotatingFile};
use crate::settings::DiagnosticsSettings;

/// Map a level name to a filter. Unknown names give INFO.
///
/// Accepts the names used in settings files (`WARNING`, `CRITICAL`) as
/// well as the `tracing` ones, in any case.
pub fn parse_level(name: &str) -> LevelFilter {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" | "critical" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Install the global subscriber.
///
/// `console` adds a stderr layer when the settings also allow it.
pub fn init(settings: &DiagnosticsSettings, console: bool) -> Result<()> {
    let level = parse_level(&settings.debug_log_level);
    let file = RotatingFile::open(&settings.debug_log_path, settings.max_bytes, settings.backup_count)
        .with_context(|| format!("Failed to open {}", settings.debug_log_path.display()))?;

    let file_layer = fmt::layer()
        .with_writer(SharedRotatingFile::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_filter(level);

    let console_layer = (console && settings.debug_to_console_enabled).then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(level)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

//! Terminal UI rendering using ratatui.
//!
//! Each view is implemented in its own submodule with a `render` function.
//!
//! ## Submodules
//!
//! - [`dashboard`]: Latest value and gauge for every sensor metric
//! - [`trends`]: Line chart of one metric over the selected time range
//! - [`gps`]: Live fix, satellites in view and raw NMEA
//! - [`trips`]: Trip recording, trip history, playback and the analysis overlay
//! - [`events`]: Status message log
//! - [`common`]: Shared components (header, tabs, status bar, help overlay)
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Rendering Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Tabs (common::render_tabs)           │
//! ├──────────────────────────────────────┤
//! │                                      │
//! │ View Content                         │
//! │ (dashboard/trends/gps/...::render)   │
//! │                                      │
//! ├──────────────────────────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    Overlays rendered on top:
//!    - trips::render_analysis
//!    - common::render_help
//! ```

pub mod common;
pub mod dashboard;
pub mod events;
pub mod gps;
pub mod theme;
pub mod trends;
pub mod trips;

pub use theme::Theme;

use ratatui::layout::Rect;

/// Sparkline characters (8 levels of height).
pub const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render sparkline levels (0-7) as text.
pub fn render_sparkline(levels: &[u8]) -> String {
    levels
        .iter()
        .map(|&l| SPARKLINE_CHARS[(l as usize).min(SPARKLINE_CHARS.len() - 1)])
        .collect()
}

/// A `width` x `height` rectangle centred in `area`, clipped to fit.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

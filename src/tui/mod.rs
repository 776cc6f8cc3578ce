pub mod config_overlay;
pub mod dialog_overlay;
pub mod footer;
pub mod header;
pub mod list;
pub mod menu_overlay;
pub mod render;
pub mod spinner;

use ratatui::layout::Rect;

/// A `width` × `height` rectangle centered in `area`, clamped to fit.
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

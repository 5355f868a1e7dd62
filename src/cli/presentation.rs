//! Text rendering for CLI results.

use crate::compositor::RenderedOverlay;
use crate::geometry::GesturePhase;
use crate::overlay::Overlay;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

const CONTENT_WIDTH: usize = 40;

fn truncate(content: &str) -> String {
    if content.chars().count() <= CONTENT_WIDTH {
        return content.to_string();
    }
    let head: String = content.chars().take(CONTENT_WIDTH - 3).collect();
    format!("{}...", head)
}

fn phase_label(phase: GesturePhase, editing: bool) -> String {
    match phase {
        GesturePhase::Idle if editing => "editing".to_string(),
        GesturePhase::Idle => "idle".to_string(),
        GesturePhase::DragArmed => "drag armed".to_string(),
        GesturePhase::Dragging => "dragging".to_string(),
        GesturePhase::ResizeArmed(handle) => format!("resize armed ({})", handle.as_str()),
        GesturePhase::Resizing(handle) => format!("resizing ({})", handle.as_str()),
    }
}

pub fn format_overlay_table(overlays: &[Overlay]) -> String {
    if overlays.is_empty() {
        return "No overlays".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Id", "Kind", "Position", "Size", "Content"]);
    for overlay in overlays {
        table.add_row(vec![
            overlay.id.to_string(),
            overlay.kind.to_string(),
            format!("{},{}", overlay.position.x, overlay.position.y),
            format!("{}x{}", overlay.size.width, overlay.size.height),
            truncate(&overlay.content),
        ]);
    }
    table.to_string()
}

pub fn format_render_list(rendered: &[RenderedOverlay]) -> String {
    if rendered.is_empty() {
        return "No overlays".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Id", "Kind", "Frame", "Font", "State", "Visible", "Content"]);
    for overlay in rendered {
        let frame = overlay.frame;
        table.add_row(vec![
            overlay.id.to_string(),
            overlay.kind.to_string(),
            format!(
                "{:.0},{:.0} {:.0}x{:.0}",
                frame.translate_x, frame.translate_y, frame.width, frame.height
            ),
            overlay
                .font_size
                .map(|size| format!("{:.1}", size))
                .unwrap_or_else(|| "-".to_string()),
            phase_label(overlay.phase, overlay.editing),
            if overlay.on_surface { "yes" } else { "off-surface" }.to_string(),
            truncate(&overlay.content),
        ]);
    }
    table.to_string()
}

use colored::{Color, Colorize};

use crate::status::{ServerStatus, StatusSnapshot};

/// How a status is drawn. No state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorStyle {
    pub glyph: &'static str,
    pub color: Color,
    pub label: &'static str,
}

pub fn indicator_style(status: ServerStatus) -> IndicatorStyle {
    match status {
        ServerStatus::Live => IndicatorStyle {
            glyph: "●",
            color: Color::Green,
            label: "Server Live",
        },
        ServerStatus::Waking => IndicatorStyle {
            glyph: "◐",
            color: Color::Yellow,
            label: "Server Waking",
        },
        ServerStatus::Offline => IndicatorStyle {
            glyph: "●",
            color: Color::Red,
            label: "Server Offline",
        },
        ServerStatus::Checking => IndicatorStyle {
            glyph: "○",
            color: Color::BrightBlack,
            label: "Checking...",
        },
    }
}

/// One status line, e.g. `● Server Live (12:00:31 UTC)`.
pub fn render_indicator(snapshot: &StatusSnapshot) -> String {
    let style = indicator_style(snapshot.status);
    format!(
        "{} {} {}",
        style.glyph.color(style.color),
        style.label.color(style.color).bold(),
        format!("({})", snapshot.updated_at.format("%H:%M:%S UTC")).dimmed()
    )
}

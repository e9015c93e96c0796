use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use crate::heatmap::{KeyHeat, Severity, KEYBOARD_LAYOUT};

pub fn severity_color(severity: Severity) -> Option<Color> {
    match severity {
        Severity::None => None,
        Severity::Low => Some(Color::Green),
        Severity::Medium => Some(Color::Rgb(255, 165, 0)),
        Severity::High => Some(Color::Red),
    }
}

fn key_label(key: char) -> String {
    match key {
        ' ' => "      space      ".to_string(),
        c => format!(" {} ", c.to_uppercase()),
    }
}

/// One line per keyboard row, staggered like a physical board.
pub fn keyboard_lines(heat: &[KeyHeat]) -> Vec<Line<'static>> {
    let mut keys = heat.iter();

    KEYBOARD_LAYOUT
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let mut spans = vec![Span::raw(" ".repeat(row_idx * 2))];
            for heat in keys.by_ref().take(row.chars().count()) {
                let mut style = Style::default().add_modifier(Modifier::DIM);
                if let Some(color) = severity_color(heat.severity) {
                    style = Style::default().fg(Color::Black).bg(color);
                }
                if heat.next {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                spans.push(Span::styled(key_label(heat.key), style));
            }
            Line::from(spans)
        })
        .collect()
}

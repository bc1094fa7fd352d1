use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};

/// Color palette
pub mod colors {
    use ratatui::style::Color;

    pub const PRIMARY: Color = Color::Rgb(78, 205, 196); // #4ECDC4
    pub const SUCCESS: Color = Color::Rgb(149, 225, 211); // #95E1D3
    pub const WARNING: Color = Color::Rgb(255, 217, 61); // #FFD93D
    pub const ERROR: Color = Color::Rgb(255, 107, 107); // #FF6B6B
    pub const DIMMED: Color = Color::Rgb(136, 136, 136); // #888
    pub const TEXT: Color = Color::Rgb(204, 204, 204); // #CCC
    pub const MOON: Color = Color::Rgb(200, 200, 255); // #C8C8FF
}

/// Width of the label column in value rows
pub const LABEL_WIDTH: usize = 14;

/// Top border with the title and version embedded
pub fn header_line(title: &str, version: &str, width: usize) -> Line<'static> {
    let title_part = format!("─── {} ", title);
    let version_part = format!("v{} ", version);
    let used = title_part.chars().count() + version_part.chars().count() + 2; // 2 for ╭ and ╮
    let remaining = width.saturating_sub(used);

    Line::from(vec![
        Span::styled("╭", Style::default().fg(colors::PRIMARY)),
        Span::styled(title_part, Style::default().fg(colors::PRIMARY)),
        Span::styled(version_part, Style::default().fg(colors::DIMMED)),
        Span::styled("─".repeat(remaining), Style::default().fg(colors::PRIMARY)),
        Span::styled("╮", Style::default().fg(colors::PRIMARY)),
    ])
}

/// Bottom border
pub fn footer_line(width: usize) -> Line<'static> {
    let inner = "─".repeat(width.saturating_sub(2));
    Line::from(vec![
        Span::styled("╰", Style::default().fg(colors::PRIMARY)),
        Span::styled(inner, Style::default().fg(colors::PRIMARY)),
        Span::styled("╯", Style::default().fg(colors::PRIMARY)),
    ])
}

pub fn section_title(title: &str, color: ratatui::style::Color) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

/// `label    value` row; extra spans are appended after the value
pub fn value_row(label: &str, value: String, extra: Vec<Span<'static>>) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            format!("{:<width$}", label, width = LABEL_WIDTH),
            Style::default().fg(colors::DIMMED),
        ),
        Span::styled(value, Style::default().fg(colors::TEXT)),
    ];
    spans.extend(extra);
    Line::from(spans)
}

mod components;
pub mod dashboard;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
    Frame,
};

use crate::station::DisplayFrame;
use components::colors;

/// Size of the virtual canvas the dashboard is laid out on
pub const CANVAS_WIDTH: u16 = 64;
pub const CANVAS_HEIGHT: u16 = 32;

/// Render the dashboard: draw on the full-size canvas, then copy whatever fits
pub fn render(f: &mut Frame, frame: &DisplayFrame) {
    let mut canvas = Buffer::empty(Rect::new(0, 0, CANVAS_WIDTH, CANVAS_HEIGHT));
    dashboard::draw(&mut canvas, frame);
    let area = f.area();
    blit(&canvas, f.buffer_mut(), area);
}

/// Copy `src` into `dst` at the top-left of `area`, clipping to `area`
pub fn blit(src: &Buffer, dst: &mut Buffer, area: Rect) {
    let width = src.area.width.min(area.width);
    let height = src.area.height.min(area.height);
    for y in 0..height {
        for x in 0..width {
            let from = (src.area.x + x, src.area.y + y);
            let to = (area.x + x, area.y + y);
            if let (Some(cell), Some(target)) = (src.cell(from), dst.cell_mut(to)) {
                *target = cell.clone();
            }
        }
    }
}

/// Full-screen error shown before a non-zero exit
pub fn render_fatal(f: &mut Frame, message: &str) {
    let area = f.area();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(colors::ERROR))
        .title(Span::styled(
            " Skywatch ",
            Style::default()
                .fg(colors::ERROR)
                .add_modifier(Modifier::BOLD),
        ));

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Unable to start the dashboard",
            Style::default()
                .fg(colors::TEXT)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(colors::ERROR),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to exit",
            Style::default().fg(colors::DIMMED),
        )),
    ];

    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

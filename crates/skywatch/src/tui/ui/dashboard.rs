use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use super::components::{colors, footer_line, header_line, section_title, value_row};
use crate::almanac::Horizontal;
use crate::sample::{compass_point, fields, Sample};
use crate::station::{DisplayFrame, Notice};
use crate::trend::{Trend, TrendResult};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rates above this magnitude get a double arrow
pub const FAST_RATE: f64 = 0.06;

/// Draw the whole dashboard into `buf`, which should be the full virtual canvas
pub fn draw(buf: &mut Buffer, frame: &DisplayFrame) {
    let area = buf.area;
    if area.width < 2 || area.height < 2 {
        return;
    }
    let width = area.width as usize;
    let border = Style::default().fg(colors::PRIMARY);

    buf.set_line(area.x, area.y, &header_line("Skywatch", VERSION, width), area.width);
    for y in area.y + 1..area.bottom() - 1 {
        buf.set_string(area.x, y, "│", border);
        buf.set_string(area.right() - 1, y, "│", border);
    }
    buf.set_line(area.x, area.bottom() - 1, &footer_line(width), area.width);

    let inner = Rect::new(
        area.x + 2,
        area.y + 1,
        area.width.saturating_sub(4),
        area.height.saturating_sub(2),
    );
    Paragraph::new(lines(frame)).render(inner, buf);
}

/// Dashboard content, top to bottom
pub fn lines(frame: &DisplayFrame) -> Vec<Line<'static>> {
    let mut lines = vec![status_line(frame), Line::from("")];

    lines.push(section_title("WEATHER", colors::PRIMARY));
    match &frame.sample {
        Some(sample) => weather_lines(&mut lines, sample, &frame.trend),
        None => lines.push(Line::from(Span::styled(
            "Waiting for data...",
            Style::default().fg(colors::DIMMED),
        ))),
    }

    lines.push(Line::from(""));
    lines.push(section_title("SUN", colors::WARNING));
    let almanac = &frame.almanac;
    lines.push(value_row(
        "Sunrise",
        time_of_day(almanac.sunrise),
        vec![label_span("  Sunset "), text_span(time_of_day(almanac.sunset))],
    ));
    lines.push(value_row(
        "Solar noon",
        time_of_day(almanac.solar_noon),
        vec![label_span("  Day length "), text_span(day_length(almanac.day_length))],
    ));
    lines.push(value_row("Position", sky_position(&almanac.sun), vec![]));

    lines.push(Line::from(""));
    lines.push(section_title("MOON", colors::MOON));
    lines.push(value_row(
        "Moonrise",
        time_of_day(almanac.moonrise),
        vec![label_span("  Moonset "), text_span(time_of_day(almanac.moonset))],
    ));
    lines.push(value_row(
        "Phase",
        almanac.moon_phase.name().to_string(),
        vec![text_span(format!(" ({:.0}% lit)", almanac.moon_illumination))],
    ));
    lines.push(value_row("Position", sky_position(&almanac.moon), vec![]));

    lines.push(Line::from(""));
    if let Some(notice) = &frame.notice {
        let color = match notice {
            Notice::Disconnected(_) => colors::WARNING,
            _ => colors::ERROR,
        };
        lines.push(Line::from(Span::styled(
            notice.message(),
            Style::default().fg(color),
        )));
    }
    lines.push(Line::from(Span::styled(
        "Press q or Ctrl+C to quit",
        Style::default().fg(colors::DIMMED),
    )));

    lines
}

fn status_line(frame: &DisplayFrame) -> Line<'static> {
    let (dot, color) = if frame.is_connected() {
        ("●", colors::SUCCESS)
    } else {
        ("○", colors::ERROR)
    };
    Line::from(vec![
        Span::styled(
            frame.timestamp.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
            Style::default().fg(colors::TEXT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(format!("{} {}", dot, frame.connection.label()), Style::default().fg(color)),
        Span::styled(
            format!("  [{}]", frame.session.label()),
            Style::default().fg(colors::DIMMED),
        ),
    ])
}

fn weather_lines(lines: &mut Vec<Line<'static>>, sample: &Sample, trend: &TrendResult) {
    lines.push(value_row(
        "Temperature",
        or_na(sample.get(fields::TEMPERATURE), |v| format!("{:.1}°F", v)),
        vec![
            label_span("  Feels like "),
            text_span(or_na(sample.get(fields::FEELS_LIKE), |v| format!("{:.1}°F", v))),
        ],
    ));
    lines.push(value_row(
        "Humidity",
        or_na(sample.get(fields::HUMIDITY), |v| format!("{:.0}%", v)),
        vec![
            label_span("  Dew point "),
            text_span(or_na(sample.get(fields::DEW_POINT), |v| format!("{:.1}°F", v))),
        ],
    ));
    lines.push(value_row("Wind", wind(sample), vec![]));
    lines.push(value_row(
        "Rain today",
        or_na(sample.get(fields::DAILY_RAIN), |v| format!("{:.2} in", v)),
        vec![],
    ));
    lines.push(barometer_row(sample.pressure(), trend));

    if let Some(uv) = sample.get(fields::UV) {
        lines.push(value_row("UV index", format!("{:.0}", uv), vec![]));
    }
    if let Some(solar) = sample.get(fields::SOLAR_RADIATION) {
        lines.push(value_row("Solar", format!("{:.1} W/m²", solar), vec![]));
    }

    lines.push(value_row(
        "Indoor",
        or_na(sample.get(fields::INDOOR_TEMPERATURE), |v| format!("{:.1}°F", v)),
        vec![text_span(or_na(sample.get(fields::INDOOR_HUMIDITY), |v| {
            format!("  {:.0}%", v)
        }))],
    ));
    if sample.contains(fields::TEMPERATURE_2) || sample.contains(fields::HUMIDITY_2) {
        lines.push(value_row(
            "Upstairs",
            or_na(sample.get(fields::TEMPERATURE_2), |v| format!("{:.1}°F", v)),
            vec![text_span(or_na(sample.get(fields::HUMIDITY_2), |v| {
                format!("  {:.0}%", v)
            }))],
        ));
    }

    let battery = match sample.get(fields::BATTERY) {
        Some(v) if v == 1.0 => Span::styled("Good", Style::default().fg(colors::SUCCESS)),
        Some(_) => Span::styled("Low", Style::default().fg(colors::ERROR)),
        None => text_span("N/A".to_string()),
    };
    lines.push(value_row("Battery", String::new(), vec![battery]));
}

/// Speed, compass direction, then gust / max gust / 10 minute average when present
pub fn wind(sample: &Sample) -> String {
    let Some(speed) = sample.get(fields::WIND_SPEED) else {
        return "N/A".to_string();
    };
    let mut text = format!("{:.1} mph", speed);
    if let Some(dir) = sample.get(fields::WIND_DIRECTION) {
        text.push_str(&format!(" {}", compass_point(dir)));
    }

    let mut extras = Vec::new();
    if let Some(gust) = sample.get(fields::WIND_GUST) {
        extras.push(format!("gust {:.1}", gust));
    }
    if let Some(max) = sample.get(fields::MAX_DAILY_GUST) {
        extras.push(format!("max {:.1}", max));
    }
    if let Some(avg) = sample.get(fields::WIND_DIRECTION_AVG_10M) {
        extras.push(format!("avg {}", compass_point(avg)));
    }
    if !extras.is_empty() {
        text.push_str(&format!(" ({})", extras.join(", ")));
    }
    text
}

fn barometer_row(pressure: Option<f64>, trend: &TrendResult) -> Line<'static> {
    let Some(pressure) = pressure else {
        return value_row("Barometer", "N/A".to_string(), vec![]);
    };
    let value = format!("{:.3} inHg", pressure);
    if trend.trend == Trend::InsufficientData {
        return value_row(
            "Barometer",
            value,
            vec![Span::styled(" (collecting data...)", Style::default().fg(colors::DIMMED))],
        );
    }
    let (arrow, color) = trend_arrow(trend);
    value_row(
        "Barometer",
        value,
        vec![
            Span::styled(format!(" {}", arrow), Style::default().fg(color)),
            text_span(format!(" ({:+.3}/hr)", trend.rate)),
        ],
    )
}

/// Arrow glyph and color for a classified trend
pub fn trend_arrow(trend: &TrendResult) -> (&'static str, ratatui::style::Color) {
    let fast = trend.rate.abs() > FAST_RATE;
    match trend.trend {
        Trend::Rising if fast => ("▲▲", colors::SUCCESS),
        Trend::Rising => ("▲", colors::SUCCESS),
        Trend::Falling if fast => ("▼▼", colors::ERROR),
        Trend::Falling => ("▼", colors::ERROR),
        Trend::Steady | Trend::InsufficientData => ("▷", colors::WARNING),
    }
}

fn or_na(value: Option<f64>, format: impl Fn(f64) -> String) -> String {
    value.map(format).unwrap_or_else(|| "N/A".to_string())
}

fn time_of_day(t: Option<DateTime<Tz>>) -> String {
    t.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn day_length(d: Option<Duration>) -> String {
    d.map(|d| format!("{}h {:02}m", d.num_hours(), d.num_minutes() % 60))
        .unwrap_or_else(|| "N/A".to_string())
}

fn sky_position(h: &Horizontal) -> String {
    format!("az {:5.1}°  alt {:5.1}°", h.azimuth, h.altitude)
}

fn label_span(text: &'static str) -> Span<'static> {
    Span::styled(text, Style::default().fg(colors::DIMMED))
}

fn text_span(text: String) -> Span<'static> {
    Span::styled(text, Style::default().fg(colors::TEXT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> Sample {
        Sample::new(Utc::now())
    }

    #[test]
    fn wind_appends_only_present_extras() {
        let s = sample().with(fields::WIND_SPEED, 5.6).with(fields::WIND_DIRECTION, 20.0);
        assert_eq!(wind(&s), "5.6 mph NNE");

        let s = s.with(fields::WIND_GUST, 8.0).with(fields::WIND_DIRECTION_AVG_10M, 45.0);
        assert_eq!(wind(&s), "5.6 mph NNE (gust 8.0, avg NE)");

        assert_eq!(wind(&sample()), "N/A");
    }

    #[test]
    fn arrows_follow_rate_magnitude() {
        let arrow = |rate| trend_arrow(&TrendResult::from_rate(rate)).0;
        assert_eq!(arrow(0.03), "▲");
        assert_eq!(arrow(0.10), "▲▲");
        assert_eq!(arrow(-0.05), "▼");
        assert_eq!(arrow(-0.07), "▼▼");
        assert_eq!(arrow(0.01), "▷");
    }

    #[test]
    fn day_length_formats_hours_and_minutes() {
        assert_eq!(day_length(Some(Duration::minutes(16 * 60 + 38))), "16h 38m");
        assert_eq!(day_length(None), "N/A");
    }
}

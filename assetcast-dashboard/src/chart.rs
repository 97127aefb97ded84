//! Inline SVG line chart of real vs predicted closes.

use assetcast_core::analytics::format_currency;

use crate::DashboardData;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 420.0;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_Y: f64 = 30.0;

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Maps data coordinates into the plot area.
struct Frame {
    slots: usize,
    lo: f64,
    hi: f64,
}

impl Frame {
    fn x(&self, i: usize) -> f64 {
        let span = (self.slots.max(2) - 1) as f64;
        MARGIN_LEFT + (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) * i as f64 / span
    }

    fn y(&self, v: f64) -> f64 {
        let range = self.hi - self.lo;
        let t = if range > 0.0 { (v - self.lo) / range } else { 0.5 };
        HEIGHT - MARGIN_Y - (HEIGHT - 2.0 * MARGIN_Y) * t
    }
}

fn polyline(frame: &Frame, values: &[f64], class: &str, color: &str) -> String {
    let points: Vec<String> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| format!("{:.1},{:.1}", frame.x(i), frame.y(*v)))
        .collect();
    format!(
        r#"<polyline class="{class}" fill="none" stroke="{color}" stroke-width="1.5" points="{}"/>"#,
        points.join(" ")
    )
}

/// SVG chart for `data`; a placeholder when there is nothing to plot.
pub fn render_chart(data: &DashboardData) -> String {
    let finite = data
        .actual
        .iter()
        .chain(&data.predicted)
        .chain(std::iter::once(&data.forecast))
        .copied()
        .filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if data.dates.is_empty() || !lo.is_finite() {
        return format!(
            r#"<svg width="{WIDTH}" height="{HEIGHT}" role="img"><text x="50%" y="50%" text-anchor="middle">No data</text></svg>"#
        );
    }

    // One extra slot on the right for the next-day forecast.
    let frame = Frame {
        slots: data.dates.len() + 1,
        lo,
        hi,
    };
    let cur = &data.currency_symbol;
    let first = data.dates[0];
    let last = data.dates[data.dates.len() - 1];
    let fx = frame.x(data.dates.len());
    let fy = frame.y(data.forecast);
    let bottom = HEIGHT - MARGIN_Y;

    let mut svg = format!(
        r#"<svg viewBox="0 0 {WIDTH} {HEIGHT}" width="100%" role="img" aria-label="{}">"#,
        escape_html(&data.ticker)
    );
    svg.push_str(&format!(
        r##"<line x1="{MARGIN_LEFT}" y1="{bottom}" x2="{x2}" y2="{bottom}" stroke="#999"/><line x1="{MARGIN_LEFT}" y1="{MARGIN_Y}" x2="{MARGIN_LEFT}" y2="{bottom}" stroke="#999"/>"##,
        x2 = WIDTH - MARGIN_RIGHT,
    ));
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y_hi:.1}" text-anchor="end" font-size="12">{hi_label}</text><text x="{x}" y="{y_lo:.1}" text-anchor="end" font-size="12">{lo_label}</text>"#,
        x = MARGIN_LEFT - 6.0,
        y_hi = frame.y(hi) + 4.0,
        y_lo = frame.y(lo) + 4.0,
        hi_label = escape_html(&format_currency(hi, cur)),
        lo_label = escape_html(&format_currency(lo, cur)),
    ));
    svg.push_str(&format!(
        r#"<text x="{MARGIN_LEFT}" y="{y}" font-size="12">{first}</text><text x="{x_last:.1}" y="{y}" text-anchor="end" font-size="12">{last}</text>"#,
        y = HEIGHT - 8.0,
        x_last = frame.x(data.dates.len() - 1),
    ));
    svg.push_str(&polyline(&frame, &data.actual, "actual", "#1f77b4"));
    svg.push_str(&polyline(&frame, &data.predicted, "predicted", "#ff7f0e"));
    if data.forecast.is_finite() {
        svg.push_str(&format!(
            r##"<circle class="forecast" cx="{fx:.1}" cy="{fy:.1}" r="4" fill="#ff7f0e"><title>Next day: {}</title></circle>"##,
            escape_html(&format_currency(data.forecast, cur))
        ));
    }
    svg.push_str("</svg>");
    svg
}

//! Inline SVG output for [`Chart`].
//!
//! Axes with a handful of ticks, one polyline per run of present values and
//! a legend in the top-left corner. Absent bucket values break the line.

use std::fmt::Write;

use super::{Chart, Line};

const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 40.0;
const Y_TICKS: usize = 5;
const X_TICKS: usize = 6;

/// Escape text for inclusion in HTML or SVG.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Plot-area geometry for one chart.
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    x_start: i64,
    x_span: f64,
    y_start: f64,
    y_span: f64,
}

impl Frame {
    fn new(chart: &Chart) -> Self {
        let x_start = chart.x_range.start.timestamp();
        let x_span = (chart.x_range.end.timestamp() - x_start).max(1) as f64;
        let y_span = if chart.y_range.span() > 0.0 { chart.y_range.span() } else { 1.0 };
        Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width: (chart.width as f64 - MARGIN_LEFT - MARGIN_RIGHT).max(1.0),
            height: (chart.height as f64 - MARGIN_TOP - MARGIN_BOTTOM).max(1.0),
            x_start,
            x_span,
            y_start: chart.y_range.start,
            y_span,
        }
    }

    fn x(&self, epoch_secs: i64) -> f64 {
        self.left + (epoch_secs - self.x_start) as f64 / self.x_span * self.width
    }

    /// Values outside the y-range are pinned to the plot edge.
    fn y(&self, value: f64) -> f64 {
        let frac = ((value - self.y_start) / self.y_span).clamp(0.0, 1.0);
        self.top + (1.0 - frac) * self.height
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// Render `chart` as an `<svg>` element. `id` must be unique in the page.
pub fn chart_to_svg(chart: &Chart, id: &str) -> String {
    let frame = Frame::new(chart);
    let clip = format!("clip-{}", escape(id));
    let mut out = String::new();

    let _ = writeln!(
        out,
        r#"<svg class="chart" viewBox="0 0 {w} {h}" width="{w}" height="{h}" role="img" aria-label="{title}">"#,
        w = chart.width,
        h = chart.height,
        title = escape(&chart.title),
    );
    let _ = writeln!(
        out,
        r#"<defs><clipPath id="{clip}"><rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}"/></clipPath></defs>"#,
        frame.left, frame.top, frame.width, frame.height,
    );

    write_axes(&mut out, chart, &frame);

    let _ = writeln!(out, r#"<g clip-path="url(#{clip})">"#);
    for line in &chart.lines {
        write_line(&mut out, line, &frame);
    }
    out.push_str("</g>\n");

    if chart.is_empty() {
        let _ = writeln!(
            out,
            r#"<text class="empty" x="{:.1}" y="{:.1}" text-anchor="middle">no data</text>"#,
            frame.left + frame.width / 2.0,
            frame.top + frame.height / 2.0,
        );
    }

    write_legend(&mut out, chart, &frame);
    out.push_str("</svg>\n");
    out
}

fn write_axes(out: &mut String, chart: &Chart, frame: &Frame) {
    let _ = writeln!(
        out,
        r#"<path class="axis" d="M{l:.1},{t:.1} V{b:.1} H{r:.1}" fill="none"/>"#,
        l = frame.left,
        t = frame.top,
        b = frame.bottom(),
        r = frame.right(),
    );

    for i in 0..Y_TICKS {
        let value = chart.y_range.start + chart.y_range.span() * i as f64 / (Y_TICKS - 1) as f64;
        let y = frame.y(value);
        let _ = writeln!(
            out,
            r#"<line class="grid" x1="{l:.1}" y1="{y:.1}" x2="{r:.1}" y2="{y:.1}"/><text class="tick" x="{tx:.1}" y="{ty:.1}" text-anchor="end">{label}</text>"#,
            l = frame.left,
            r = frame.right(),
            tx = frame.left - 6.0,
            ty = y + 4.0,
            label = escape(&chart.y_format.format(value)),
        );
    }

    let span = chart.x_range.end - chart.x_range.start;
    for i in 0..X_TICKS {
        let ts = chart.x_range.start + span * i as i32 / (X_TICKS - 1) as i32;
        let x = frame.x(ts.timestamp());
        let _ = writeln!(
            out,
            r#"<text class="tick" x="{x:.1}" y="{y:.1}" text-anchor="middle">{label}</text>"#,
            y = frame.bottom() + 18.0,
            label = escape(&ts.format("%a %I%p").to_string()),
        );
    }
}

fn write_line(out: &mut String, line: &Line, frame: &Frame) {
    let color = escape(&line.color);
    let mut run: Vec<(f64, f64)> = Vec::new();

    let flush = |run: &mut Vec<(f64, f64)>, out: &mut String| {
        match run.as_slice() {
            [] => {}
            [(x, y)] => {
                let _ = writeln!(out, r#"<circle cx="{x:.1}" cy="{y:.1}" r="2" fill="{color}"/>"#);
            }
            points => {
                let coords: Vec<String> = points.iter().map(|(x, y)| format!("{x:.1},{y:.1}")).collect();
                let _ = writeln!(
                    out,
                    r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="2"/>"#,
                    coords.join(" ")
                );
            }
        }
        run.clear();
    };

    for point in &line.points {
        match point.fact_value {
            Some(v) => run.push((frame.x(point.timestamp.timestamp()), frame.y(v))),
            None => flush(&mut run, out),
        }
    }
    flush(&mut run, out);
}

fn write_legend(out: &mut String, chart: &Chart, frame: &Frame) {
    for (i, entry) in chart.legend.iter().enumerate() {
        let y = frame.top + 14.0 + 18.0 * i as f64;
        let x = frame.left + 10.0;
        let _ = writeln!(
            out,
            r#"<rect x="{x:.1}" y="{:.1}" width="12" height="3" fill="{color}"/><text class="legend" x="{:.1}" y="{:.1}">{label}</text>"#,
            y - 4.0,
            x + 18.0,
            y,
            color = escape(&entry.color),
            label = escape(&entry.label),
        );
    }
}

//! Server-rendered HTML dashboard.
//!
//! One `<section>` per configured panel with its chart drawn as inline SVG.
//! No scripts and no external assets; the page reloads itself every minute.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::dashboard::{Dashboard, Panel};
use crate::render::svg::{chart_to_svg, escape};

use super::Reply;

const TITLE: &str = "sys-monitor";

const STYLE: &str = r#"
:root {
  --bg: #0d1117;
  --surface: #161b22;
  --border: #30363d;
  --text: #e6edf3;
  --text-muted: #8b949e;
  --red: #f85149;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
}

* { margin: 0; padding: 0; box-sizing: border-box; }
body {
  background: var(--bg);
  color: var(--text);
  font-family: var(--font);
  font-size: 14px;
  line-height: 1.5;
  padding: 24px;
}

header { display: flex; justify-content: space-between; align-items: baseline; margin-bottom: 24px; }
header h1 { font-size: 20px; font-weight: 600; }
header .updated { color: var(--text-muted); font-size: 12px; }

.card {
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 20px;
  margin-bottom: 16px;
}
.card h2 { font-size: 16px; font-weight: 600; margin-bottom: 12px; }
.card .error { color: var(--red); font-size: 12px; margin-bottom: 8px; }

svg.chart { max-width: 100%; height: auto; }
svg.chart .axis { stroke: var(--text-muted); }
svg.chart .grid { stroke: var(--border); stroke-dasharray: 2 4; }
svg.chart .tick, svg.chart .legend { fill: var(--text-muted); font-size: 11px; }
svg.chart .empty { fill: var(--text-muted); font-size: 14px; }
"#;

/// `GET /`: every panel rendered at `now`. Always 200; failed panels carry
/// an error caption above an empty chart.
pub fn render_dashboard(dashboard: &Dashboard, now: DateTime<Utc>) -> Reply {
    let panels = dashboard.panels(now);
    Reply::html(render_page(&panels, now.with_timezone(&dashboard.timezone())))
}

fn render_page(panels: &[Panel], now: DateTime<Tz>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta http-equiv="refresh" content="60">
<title>{TITLE}</title>
<style>{STYLE}</style>
</head>
<body>
<header><h1>{TITLE}</h1><span class="updated">updated {}</span></header>
"#,
        now.format("%Y-%m-%d %H:%M:%S %Z"),
    );

    for (i, panel) in panels.iter().enumerate() {
        write_panel(&mut out, i, panel);
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn write_panel(out: &mut String, index: usize, panel: &Panel) {
    let _ = writeln!(
        out,
        r#"<section class="card" id="panel-{index}"><h2>{}</h2>"#,
        escape(&panel.chart.title)
    );
    if let Some(err) = &panel.error {
        let _ = writeln!(out, r#"<p class="error">{}</p>"#, escape(&err.to_string()));
    }
    out.push_str(&chart_to_svg(&panel.chart, &format!("panel-{index}")));
    out.push_str("</section>\n");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

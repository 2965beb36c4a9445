//! Presentational line charts built from resampled series.
//!
//! [`ChartRenderer::render`] turns one or more [`BucketedSeries`] into a
//! [`Chart`]: a fixed time window on the x-axis, a y-axis shaped by the
//! [`ChartKind`], one colored line per fact and a legend. [`svg`] draws a
//! chart for the HTML page.

pub mod svg;

use std::collections::BTreeMap;

use anyhow::{Result, ensure};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::facts::{BucketPoint, BucketedSeries, MAX_LOOKBACK_DAYS, Timestamp, max_lookback};

/// Eight-color qualitative palette (ColorBrewer "Dark2").
pub const DARK2: [&str; 8] = [
    "#1b9e77", "#d95f02", "#7570b3", "#e7298a", "#66a61e", "#e6ab02", "#a6761d", "#666666",
];

/// Default fixed y-range for temperature charts, in °F.
pub const DEFAULT_TEMPERATURE_RANGE: (f64, f64) = (32.0, 212.0);

/// Where the legend sits on every chart.
pub const LEGEND_LOCATION: &str = "top_left";

// ---------------------------------------------------------------------------
// Chart model
// ---------------------------------------------------------------------------

/// What a chart measures, which decides its y-axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    /// Degrees Fahrenheit on a generous fixed range.
    Temperature,
    /// Fractions clamped to `[0, 1]`, shown as percentages.
    Percent,
    /// Anything else, auto-ranged.
    #[default]
    Count,
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temperature => write!(f, "temperature"),
            Self::Percent => write!(f, "percent"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// Y-axis tick label style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickFormat {
    /// Whole degrees, e.g. `72°f`.
    Degrees,
    /// Fraction as percent, e.g. `0.45` -> `45%`.
    Percent,
    Plain,
}

impl TickFormat {
    pub fn format(&self, value: f64) -> String {
        match self {
            Self::Degrees => format!("{}°f", value.trunc() as i64),
            Self::Percent => format!("{:.0}%", value * 100.0),
            Self::Plain if (value - value.round()).abs() < 1e-9 => format!("{}", value.round() as i64),
            Self::Plain => format!("{value:.2}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    pub start: f64,
    pub end: f64,
}

impl AxisRange {
    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// One fact drawn on a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub fact_name: String,
    pub color: String,
    pub points: Vec<BucketPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

/// A fully laid-out chart, ready to draw or serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub kind: ChartKind,
    pub width: u32,
    pub height: u32,
    pub x_range: TimeRange,
    pub y_range: AxisRange,
    pub y_format: TickFormat,
    pub lines: Vec<Line>,
    pub legend: Vec<LegendEntry>,
    pub legend_location: &'static str,
}

impl Chart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// Map fact names to palette colors.
///
/// Names are sorted and deduplicated first, so the same set of facts always
/// gets the same colors regardless of the order they are passed in. The
/// i-th name takes `palette[i]`, wrapping when there are more facts than
/// colors. An empty palette falls back to [`DARK2`].
pub fn assign_colors<S: AsRef<str>>(fact_names: &[S], palette: &[String]) -> BTreeMap<String, String> {
    let mut names: Vec<&str> = fact_names.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names.dedup();

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let color = if palette.is_empty() {
                DARK2[i % DARK2.len()].to_string()
            } else {
                palette[i % palette.len()].clone()
            };
            (name.to_string(), color)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Settings shared by every chart on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// How far back the x-axis reaches from "now".
    pub lookback: Duration,
    /// Zone used for the x-axis bounds.
    pub timezone: Tz,
    pub palette: Vec<String>,
    /// Fixed y-range for [`ChartKind::Temperature`].
    pub temperature_range: (f64, f64),
    pub width: u32,
    pub height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::hours(24),
            timezone: chrono_tz::America::New_York,
            palette: DARK2.iter().map(|c| c.to_string()).collect(),
            temperature_range: DEFAULT_TEMPERATURE_RANGE,
            width: 900,
            height: 400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartRenderer {
    config: RenderConfig,
}

impl ChartRenderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        ensure!(config.lookback > Duration::zero(), "chart lookback must be positive");
        ensure!(
            config.lookback <= max_lookback(),
            "chart lookback must be at most {MAX_LOOKBACK_DAYS} days"
        );
        ensure!(!config.palette.is_empty(), "chart palette must not be empty");
        ensure!(
            config.temperature_range.0 < config.temperature_range.1,
            "temperature range must be increasing"
        );
        ensure!(config.width > 0 && config.height > 0, "chart size must be non-zero");
        Ok(Self { config })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Build a chart for `series` as of `now`.
    ///
    /// Empty input produces a chart with no lines but valid axes.
    pub fn render(&self, title: &str, kind: ChartKind, series: &[BucketedSeries], now: DateTime<Utc>) -> Chart {
        let names: Vec<&str> = series.iter().map(|s| s.fact_name.as_str()).collect();
        let colors = assign_colors(&names, &self.config.palette);

        let mut lines: Vec<Line> = series
            .iter()
            .map(|s| Line {
                fact_name: s.fact_name.clone(),
                color: colors.get(&s.fact_name).cloned().unwrap_or_default(),
                points: s.points.clone(),
            })
            .collect();
        lines.sort_by(|a, b| a.fact_name.cmp(&b.fact_name));

        let legend = lines
            .iter()
            .map(|l| LegendEntry {
                label: l.fact_name.clone(),
                color: l.color.clone(),
            })
            .collect();

        let (y_range, y_format) = match kind {
            ChartKind::Percent => (AxisRange { start: 0.0, end: 1.0 }, TickFormat::Percent),
            ChartKind::Temperature => {
                let (start, end) = self.config.temperature_range;
                (AxisRange { start, end }, TickFormat::Degrees)
            }
            ChartKind::Count => (auto_range(series), TickFormat::Plain),
        };

        let tz = self.config.timezone;
        Chart {
            title: title.to_string(),
            kind,
            width: self.config.width,
            height: self.config.height,
            x_range: TimeRange {
                start: now
                    .checked_sub_signed(self.config.lookback)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
                    .with_timezone(&tz),
                end: now.with_timezone(&tz),
            },
            y_range,
            y_format,
            lines,
            legend,
            legend_location: LEGEND_LOCATION,
        }
    }
}

/// Range covering all present values with 5% headroom on each side.
fn auto_range(series: &[BucketedSeries]) -> AxisRange {
    let mut values = series.iter().flat_map(BucketedSeries::present_values).peekable();
    if values.peek().is_none() {
        return AxisRange { start: 0.0, end: 1.0 };
    }

    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if (max - min).abs() < f64::EPSILON {
        return AxisRange {
            start: min - 1.0,
            end: max + 1.0,
        };
    }
    let pad = (max - min) * 0.05;
    AxisRange {
        start: min - pad,
        end: max + pad,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn series(name: &str, values: &[Option<f64>]) -> BucketedSeries {
        let start = now().with_timezone(&New_York) - Duration::hours(1);
        BucketedSeries {
            fact_name: name.to_string(),
            points: values
                .iter()
                .enumerate()
                .map(|(i, v)| BucketPoint {
                    timestamp: start + Duration::minutes(10 * i as i64),
                    fact_value: *v,
                })
                .collect(),
        }
    }

    fn renderer() -> ChartRenderer {
        ChartRenderer::new(RenderConfig::default()).unwrap()
    }

    fn palette() -> Vec<String> {
        DARK2.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn colors_follow_alphabetical_order() {
        let colors = assign_colors(&["gpu_temp_f", "cpu_temp_f", "rpi_temp_f"], &palette());
        assert_eq!(colors["cpu_temp_f"], DARK2[0]);
        assert_eq!(colors["gpu_temp_f"], DARK2[1]);
        assert_eq!(colors["rpi_temp_f"], DARK2[2]);
    }

    #[test]
    fn colors_are_stable_under_permutation() {
        let a = assign_colors(&["b", "a", "c"], &palette());
        let b = assign_colors(&["c", "b", "a"], &palette());
        assert_eq!(a, b);
    }

    #[test]
    fn colors_wrap_and_fall_back() {
        let short = vec!["#000".to_string(), "#fff".to_string()];
        let colors = assign_colors(&["a", "b", "c"], &short);
        assert_eq!(colors["c"], "#000");

        let fallback = assign_colors(&["a"], &[]);
        assert_eq!(fallback["a"], DARK2[0]);
    }

    #[test]
    fn duplicate_names_share_one_color() {
        let colors = assign_colors(&["a", "a", "b"], &palette());
        assert_eq!(colors.len(), 2);
        assert_eq!(colors["b"], DARK2[1]);
    }

    #[test]
    fn percent_chart_is_clamped_to_unit_range() {
        let chart = renderer().render(
            "Usage Pct",
            ChartKind::Percent,
            &[series("cpu_use_pct", &[Some(0.2), Some(1.4)])],
            now(),
        );
        assert_eq!(chart.y_range, AxisRange { start: 0.0, end: 1.0 });
        assert_eq!(chart.y_format, TickFormat::Percent);
    }

    #[test]
    fn temperature_chart_uses_fixed_range() {
        let chart = renderer().render(
            "Temperatures",
            ChartKind::Temperature,
            &[series("cpu_temp_f", &[Some(120.0)])],
            now(),
        );
        assert_eq!(chart.y_range, AxisRange { start: 32.0, end: 212.0 });
        assert_eq!(chart.y_format, TickFormat::Degrees);
    }

    #[test]
    fn count_chart_is_auto_ranged() {
        let chart = renderer().render(
            "Queue Counts",
            ChartKind::Count,
            &[series("moomoo_queue_new", &[Some(10.0), None, Some(30.0)])],
            now(),
        );
        assert!((chart.y_range.start - 9.0).abs() < 1e-9);
        assert!((chart.y_range.end - 31.0).abs() < 1e-9);
    }

    #[test]
    fn flat_count_chart_gets_headroom() {
        let chart = renderer().render("Flat", ChartKind::Count, &[series("x", &[Some(5.0), Some(5.0)])], now());
        assert_eq!(chart.y_range, AxisRange { start: 4.0, end: 6.0 });
    }

    #[test]
    fn empty_input_renders_empty_shell() {
        let chart = renderer().render("Temperatures", ChartKind::Count, &[], now());
        assert!(chart.is_empty());
        assert!(chart.legend.is_empty());
        assert_eq!(chart.y_range, AxisRange { start: 0.0, end: 1.0 });
        assert_eq!(chart.x_range.end - chart.x_range.start, Duration::hours(24));
    }

    #[test]
    fn x_axis_spans_lookback_in_display_zone() {
        let chart = renderer().render("T", ChartKind::Count, &[], now());
        assert_eq!(chart.x_range.end.timezone(), New_York);
        assert_eq!(chart.x_range.end.with_timezone(&Utc), now());
        assert_eq!(chart.x_range.start.with_timezone(&Utc), now() - Duration::hours(24));
    }

    #[test]
    fn lines_and_legend_are_sorted_by_name() {
        let chart = renderer().render(
            "Temperatures",
            ChartKind::Temperature,
            &[series("rpi_temp_f", &[Some(1.0)]), series("cpu_temp_f", &[Some(2.0)])],
            now(),
        );
        let labels: Vec<&str> = chart.legend.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["cpu_temp_f", "rpi_temp_f"]);
        assert_eq!(chart.lines[0].color, DARK2[0]);
        assert_eq!(chart.legend_location, "top_left");
    }

    #[test]
    fn tick_formats() {
        assert_eq!(TickFormat::Degrees.format(72.9), "72°f");
        assert_eq!(TickFormat::Percent.format(0.45), "45%");
        assert_eq!(TickFormat::Plain.format(12.0), "12");
        assert_eq!(TickFormat::Plain.format(1.5), "1.50");
    }

    #[test]
    fn renderer_rejects_bad_config() {
        let mut config = RenderConfig::default();
        config.palette.clear();
        assert!(ChartRenderer::new(config).is_err());

        let config = RenderConfig {
            temperature_range: (100.0, 50.0),
            ..RenderConfig::default()
        };
        assert!(ChartRenderer::new(config).is_err());
    }

    #[test]
    fn renderer_rejects_lookback_past_limit() {
        let config = RenderConfig {
            lookback: Duration::hours(i64::from(u32::MAX)),
            ..RenderConfig::default()
        };
        assert!(ChartRenderer::new(config).is_err());

        let config = RenderConfig {
            lookback: max_lookback(),
            ..RenderConfig::default()
        };
        let chart = ChartRenderer::new(config).unwrap().render("t", ChartKind::Count, &[], now());
        assert_eq!(chart.x_range.end.with_timezone(&Utc) - chart.x_range.start.with_timezone(&Utc), max_lookback());
    }
}

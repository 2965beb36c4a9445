/// End-to-end pipeline tests: store rows through resampling into charts.
///
/// Everything runs against the in-memory store so the behavior under test
/// matches what PostgreSQL produces with minute truncation and averaging.
use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;

use sys_monitor::config::{MonitorConfig, PanelConfig};
use sys_monitor::dashboard::Dashboard;
use sys_monitor::facts::{FactError, FactSample, QueryWindow};
use sys_monitor::render::{ChartKind, ChartRenderer, DARK2, RenderConfig};
use sys_monitor::resample::{ResampleConfig, Resampler};
use sys_monitor::store::{FactStore, MemoryStore};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

fn resampler() -> Resampler {
    Resampler::new(ResampleConfig::default()).unwrap()
}

// ---------------------------------------------------------------------------
// Store + resampler
// ---------------------------------------------------------------------------

#[test]
fn minute_averages_then_interval_means() {
    let store = MemoryStore::new(Tz::UTC)
        .with_fact(at(0, 0), "cpu_temp_f", 60.0)
        .with_fact(at(0, 4), "cpu_temp_f", 70.0)
        .with_fact(at(0, 12), "cpu_temp_f", 80.0);
    let window = QueryWindow::new(["cpu_temp_f"], at(0, 0), at(0, 30));

    let samples = store.fetch(&window).unwrap();
    assert_eq!(samples.len(), 3);

    let series = resampler().resample(&samples);
    assert_eq!(series.len(), 1);
    let points: Vec<(DateTime<Utc>, Option<f64>)> = series[0]
        .points
        .iter()
        .map(|p| (p.timestamp.with_timezone(&Utc), p.fact_value))
        .collect();
    assert_eq!(points, vec![(at(0, 0), Some(65.0)), (at(0, 10), Some(80.0))]);
}

#[test]
fn duplicate_rows_are_averaged() {
    let store = MemoryStore::new(Tz::UTC)
        .with_fact(at(1, 0), "hd_use_pct", 0.5)
        .with_fact(at(1, 0), "hd_use_pct", 0.7);
    let samples = store.fetch(&QueryWindow::new(["hd_use_pct"], at(0, 0), at(2, 0))).unwrap();

    assert_eq!(samples.len(), 1);
    assert!((samples[0].fact_value - 0.6).abs() < 1e-9);

    let series = resampler().resample(&samples);
    assert!((series[0].points[0].fact_value.unwrap() - 0.6).abs() < 1e-9);
}

#[test]
fn series_keep_interval_spacing_with_gaps() {
    let store = MemoryStore::new(Tz::UTC)
        .with_fact(at(0, 1), "cpu_use_pct", 0.1)
        .with_fact(at(0, 41), "cpu_use_pct", 0.3);
    let samples = store.fetch(&QueryWindow::new(["cpu_use_pct"], at(0, 0), at(1, 0))).unwrap();
    let series = resampler().resample(&samples);

    let points = &series[0].points;
    assert_eq!(points.len(), 5);
    for pair in points.windows(2) {
        assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(10));
    }
    assert_eq!(series[0].present_values().count(), 2);
}

#[test]
fn malformed_fact_name_never_reaches_store() {
    struct CountingStore(std::sync::atomic::AtomicUsize);
    impl FactStore for CountingStore {
        fn fetch(&self, window: &QueryWindow) -> Result<Vec<FactSample>, FactError> {
            window.validate()?;
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    let store = CountingStore(Default::default());
    let err = store
        .fetch(&QueryWindow::new(["cpu_temp_f'; --"], at(0, 0), at(1, 0)))
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(store.0.load(std::sync::atomic::Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

#[test]
fn empty_fact_set_renders_empty_chart() {
    let store = MemoryStore::new(Tz::UTC).with_fact(at(0, 0), "cpu_temp_f", 70.0);
    let samples = store.fetch(&QueryWindow::new(Vec::<String>::new(), at(0, 0), at(1, 0))).unwrap();
    assert!(samples.is_empty());

    let chart = ChartRenderer::new(RenderConfig::default())
        .unwrap()
        .render("Nothing", ChartKind::Count, &resampler().resample(&samples), at(1, 0));
    assert!(chart.is_empty());
    assert!(chart.legend.is_empty());
    assert!(chart.y_range.span() > 0.0);
    assert!(chart.x_range.start < chart.x_range.end);
}

#[test]
fn colors_are_stable_across_panels() {
    let mut config = MonitorConfig::default();
    config.panels = vec![
        PanelConfig::new("A", ChartKind::Temperature, &["gpu_temp_f", "cpu_temp_f"]),
        PanelConfig::new("B", ChartKind::Temperature, &["cpu_temp_f", "gpu_temp_f"]),
    ];
    let now = Utc::now();
    let store = MemoryStore::new(Tz::UTC)
        .with_fact(now - Duration::minutes(30), "cpu_temp_f", 110.0)
        .with_fact(now - Duration::minutes(30), "gpu_temp_f", 100.0);
    let dashboard = Dashboard::new(store, &config).unwrap();

    let panels = dashboard.panels(now);
    assert_eq!(panels[0].chart.lines, panels[1].chart.lines);
    assert_eq!(panels[0].chart.lines[0].fact_name, "cpu_temp_f");
    assert_eq!(panels[0].chart.lines[0].color, DARK2[0]);
    assert_eq!(panels[0].chart.lines[1].color, DARK2[1]);
}

#[test]
fn configured_interval_changes_bucket_width() {
    let mut config = MonitorConfig::default();
    config.resample.interval_mins = 5;
    let now = at(12, 0);
    let store = MemoryStore::new(Tz::UTC)
        .with_fact(at(11, 0), "cpu_temp_f", 100.0)
        .with_fact(at(11, 30), "cpu_temp_f", 110.0);
    let dashboard = Dashboard::new(store, &config).unwrap();

    let series = dashboard
        .series(&["cpu_temp_f".to_string()], now, Duration::hours(2))
        .unwrap();
    assert_eq!(series[0].points.len(), 7);
}

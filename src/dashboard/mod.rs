//! The query → resample → render pipeline behind every page and command.
//!
//! A [`Dashboard`] is immutable after construction and shared between HTTP
//! worker threads. Each call fetches fresh samples; nothing is cached.

use std::collections::BTreeMap;

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::config::{MonitorConfig, PanelConfig};
use crate::facts::{
    BucketedSeries, FactError, FactSample, LatestValue, MAX_LOOKBACK_DAYS, QueryWindow, max_lookback,
    validate_fact_name,
};
use crate::render::{Chart, ChartRenderer};
use crate::resample::{Resampler, latest_per_fact};
use crate::store::{FactStore, PostgresStore};

/// Outcome of one dashboard panel.
///
/// A failed query still yields an (empty) chart so the rest of the page
/// renders; `error` carries what went wrong.
#[derive(Debug, Clone)]
pub struct Panel {
    pub chart: Chart,
    pub error: Option<FactError>,
}

pub struct Dashboard {
    store: Box<dyn FactStore>,
    resampler: Resampler,
    renderer: ChartRenderer,
    panels: Vec<PanelConfig>,
    latest_facts: Vec<String>,
    chart_lookback: Duration,
    latest_lookback: Duration,
}

impl Dashboard {
    /// Build a dashboard over an arbitrary store.
    pub fn new<S: FactStore + 'static>(store: S, config: &MonitorConfig) -> Result<Self> {
        let resampler = Resampler::new(config.resample_config()).context("invalid [resample] settings")?;
        let renderer = ChartRenderer::new(config.render_config()?).context("invalid [display] settings")?;

        for panel in &config.panels {
            for fact in &panel.facts {
                validate_fact_name(fact).with_context(|| format!("panel {:?}", panel.title))?;
            }
        }
        let latest_facts = config.latest_facts();
        for fact in &latest_facts {
            validate_fact_name(fact).context("[latest] facts")?;
        }
        ensure!(
            config.latest_lookback() <= max_lookback(),
            "[latest] lookback must be at most {MAX_LOOKBACK_DAYS} days"
        );

        Ok(Self {
            store: Box::new(store),
            resampler,
            renderer,
            panels: config.panels.clone(),
            latest_facts,
            chart_lookback: config.chart_lookback(),
            latest_lookback: config.latest_lookback(),
        })
    }

    /// Build a dashboard over the configured PostgreSQL store.
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let store = PostgresStore::new(
            config.store_url()?,
            config.timezone()?,
            std::time::Duration::from_secs(config.store.connect_timeout_secs),
            std::time::Duration::from_secs(config.store.query_timeout_secs),
        )?;
        Self::new(store, config)
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn tracked_facts(&self) -> &[String] {
        &self.latest_facts
    }

    pub fn chart_lookback(&self) -> Duration {
        self.chart_lookback
    }

    /// Zone that charts and the page header are shown in.
    pub fn timezone(&self) -> Tz {
        self.renderer.config().timezone
    }

    /// Raw minute-averaged samples for `facts` over `lookback`.
    pub fn samples(&self, facts: &[String], now: DateTime<Utc>, lookback: Duration) -> Result<Vec<FactSample>, FactError> {
        let window = QueryWindow::lookback(facts.iter().cloned(), now, lookback)?;
        self.store.fetch(&window)
    }

    /// Resampled series for `facts` over `lookback`.
    pub fn series(&self, facts: &[String], now: DateTime<Utc>, lookback: Duration) -> Result<Vec<BucketedSeries>, FactError> {
        let samples = self.samples(facts, now, lookback)?;
        Ok(self.resampler.resample(&samples))
    }

    /// Render a single panel, propagating store failures.
    pub fn render_panel(&self, panel: &PanelConfig, now: DateTime<Utc>) -> Result<Chart, FactError> {
        let series = self.series(&panel.facts, now, self.chart_lookback)?;
        Ok(self.renderer.render(&panel.title, panel.kind, &series, now))
    }

    /// Render every configured panel. One panel failing does not affect the
    /// others; it degrades to an empty chart.
    pub fn panels(&self, now: DateTime<Utc>) -> Vec<Panel> {
        self.panels
            .iter()
            .map(|panel| match self.render_panel(panel, now) {
                Ok(chart) => Panel { chart, error: None },
                Err(e) => {
                    tracing::warn!(message = "panel query failed", panel = %panel.title, error = %e);
                    Panel {
                        chart: self.renderer.render(&panel.title, panel.kind, &[], now),
                        error: Some(e),
                    }
                }
            })
            .collect()
    }

    /// Newest sample per tracked fact within the latest-lookback window.
    pub fn latest(&self, now: DateTime<Utc>) -> Result<BTreeMap<String, LatestValue>, FactError> {
        let samples = self.samples(&self.latest_facts, now, self.latest_lookback)?;
        Ok(latest_per_fact(&samples))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

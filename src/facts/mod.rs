//! Typed records for facts flowing from the store to the charts.
//!
//! A *fact* is a named, timestamped numeric measurement such as
//! `cpu_temp_f` or `memory_use_pct`. The store returns [`FactSample`] rows,
//! the resampler turns them into [`BucketedSeries`], and `/latest.json`
//! reports one [`LatestValue`] per fact.

pub mod error;

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;

pub use error::FactError;

/// Instant normalized to the display time zone.
pub type Timestamp = DateTime<Tz>;

/// Longest fact name accepted by [`validate_fact_name`].
pub const MAX_FACT_NAME_LEN: usize = 128;

/// Longest lookback a window, chart or command may ask for (about ten years).
pub const MAX_LOOKBACK_DAYS: i64 = 3660;

/// [`MAX_LOOKBACK_DAYS`] as a duration.
pub fn max_lookback() -> Duration {
    Duration::days(MAX_LOOKBACK_DAYS)
}

static FACT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.:\-]*$").expect("fact name regex must compile")
});

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One row returned by the fact store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactSample {
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
    pub fact_name: String,
    pub fact_value: f64,
}

impl FactSample {
    pub fn new(timestamp: Timestamp, fact_name: impl Into<String>, fact_value: f64) -> Self {
        Self {
            timestamp,
            fact_name: fact_name.into(),
            fact_value,
        }
    }
}

/// A single interval boundary of a [`BucketedSeries`].
///
/// `fact_value` is `None` when no sample fell into the interval, so charts
/// can draw a gap instead of a false line segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketPoint {
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
    pub fact_value: Option<f64>,
}

/// Regularly spaced series for one fact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketedSeries {
    pub fact_name: String,
    pub points: Vec<BucketPoint>,
}

impl BucketedSeries {
    /// Values that are present, in time order.
    pub fn present_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().filter_map(|p| p.fact_value)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Most recent sample of a fact, keyed by fact name in `/latest.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestValue {
    pub ts: Timestamp,
    pub fact_value: f64,
}

// ---------------------------------------------------------------------------
// Query window
// ---------------------------------------------------------------------------

/// What a single store call fetches: a set of fact names and a time range.
///
/// Only `lower_bound` narrows the store query; `upper_bound` is the instant
/// the window was built at ("now").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    facts: BTreeSet<String>,
    lower_bound: DateTime<Utc>,
    upper_bound: DateTime<Utc>,
}

impl QueryWindow {
    pub fn new<I, S>(facts: I, lower_bound: DateTime<Utc>, upper_bound: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            facts: facts.into_iter().map(Into::into).collect(),
            lower_bound,
            upper_bound,
        }
    }

    /// Window covering `[now - lookback, now]`.
    ///
    /// A negative lookback, one longer than [`max_lookback`], or one reaching
    /// past the representable calendar is a [`FactError::MalformedQuery`].
    pub fn lookback<I, S>(facts: I, now: DateTime<Utc>, lookback: Duration) -> Result<Self, FactError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if lookback < Duration::zero() || lookback > max_lookback() {
            return Err(FactError::MalformedQuery(format!(
                "lookback of {}h is outside 0..={}d",
                lookback.num_hours(),
                MAX_LOOKBACK_DAYS
            )));
        }
        let lower_bound = now
            .checked_sub_signed(lookback)
            .ok_or_else(|| FactError::MalformedQuery("lookback reaches before the earliest instant".to_string()))?;
        Ok(Self::new(facts, lower_bound, now))
    }

    pub fn facts(&self) -> &BTreeSet<String> {
        &self.facts
    }

    pub fn lower_bound(&self) -> DateTime<Utc> {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> DateTime<Utc> {
        self.upper_bound
    }

    /// An empty fact set is valid and always yields an empty result.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Reject windows that must never reach the store.
    pub fn validate(&self) -> Result<(), FactError> {
        for name in &self.facts {
            validate_fact_name(name)?;
        }
        if self.lower_bound > self.upper_bound {
            return Err(FactError::MalformedQuery(format!(
                "lower bound {} is after upper bound {}",
                self.lower_bound.to_rfc3339(),
                self.upper_bound.to_rfc3339()
            )));
        }
        Ok(())
    }
}

/// Check that a fact name is non-empty, bounded and made of identifier-like
/// characters.
pub fn validate_fact_name(name: &str) -> Result<(), FactError> {
    if name.is_empty() {
        return Err(FactError::MalformedQuery("empty fact name".to_string()));
    }
    if name.len() > MAX_FACT_NAME_LEN {
        return Err(FactError::MalformedQuery(format!(
            "fact name longer than {MAX_FACT_NAME_LEN} characters"
        )));
    }
    if !FACT_NAME_RE.is_match(name) {
        return Err(FactError::MalformedQuery(format!(
            "fact name {name:?} contains unsupported characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

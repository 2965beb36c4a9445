//! Fact store clients.
//!
//! A [`FactStore`] answers one question: which samples exist for these fact
//! names since this instant? Implementations must:
//!
//! - validate the [`QueryWindow`] before touching the network
//! - return nothing (not an error) for an empty fact set
//! - truncate timestamps to the minute and average values at the source
//! - order rows by timestamp, then fact name
//! - express timestamps in the configured display zone
//!
//! [`PostgresStore`] talks to the real `computer_facts` table.
//! [`MemoryStore`] applies the same rules to rows held in memory.

pub mod pg;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::facts::{FactError, FactSample, QueryWindow};
use crate::resample::floor_utc;

pub use pg::PostgresStore;

/// Source of raw fact samples.
pub trait FactStore: Send + Sync {
    /// Fetch minute-averaged samples for the window's facts.
    fn fetch(&self, window: &QueryWindow) -> Result<Vec<FactSample>, FactError>;
}

impl<T: FactStore + ?Sized> FactStore for Box<T> {
    fn fetch(&self, window: &QueryWindow) -> Result<Vec<FactSample>, FactError> {
        (**self).fetch(window)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// A raw measurement as stored in `computer_facts`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFact {
    pub ts_utc: DateTime<Utc>,
    pub fact_name: String,
    pub fact_value: f64,
}

/// Fact store backed by a vector of rows.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    rows: Vec<StoredFact>,
    timezone: Tz,
}

impl MemoryStore {
    pub fn new(timezone: Tz) -> Self {
        Self {
            rows: Vec::new(),
            timezone,
        }
    }

    /// Append a raw row.
    pub fn insert(&mut self, ts_utc: DateTime<Utc>, fact_name: impl Into<String>, fact_value: f64) {
        self.rows.push(StoredFact {
            ts_utc,
            fact_name: fact_name.into(),
            fact_value,
        });
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_fact(mut self, ts_utc: DateTime<Utc>, fact_name: impl Into<String>, fact_value: f64) -> Self {
        self.insert(ts_utc, fact_name, fact_value);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FactStore for MemoryStore {
    fn fetch(&self, window: &QueryWindow) -> Result<Vec<FactSample>, FactError> {
        window.validate()?;
        if window.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: &BTreeSet<String> = window.facts();
        let minute = Duration::minutes(1);

        // (minute, fact_name) -> (sum, count); BTreeMap keeps ORDER BY 1, 2
        let mut groups: BTreeMap<(DateTime<Utc>, &str), (f64, usize)> = BTreeMap::new();
        for row in &self.rows {
            if row.ts_utc < window.lower_bound() || !wanted.contains(&row.fact_name) {
                continue;
            }
            let slot = groups
                .entry((floor_utc(row.ts_utc, minute), row.fact_name.as_str()))
                .or_insert((0.0, 0));
            slot.0 += row.fact_value;
            slot.1 += 1;
        }

        let samples: Vec<FactSample> = groups
            .into_iter()
            .map(|((ts, name), (sum, count))| {
                FactSample::new(ts.with_timezone(&self.timezone), name, sum / count as f64)
            })
            .collect();

        tracing::debug!(
            message = "fetched facts from memory store",
            facts = window.facts().len(),
            rows = samples.len(),
        );

        Ok(samples)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

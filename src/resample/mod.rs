//! Resampling of irregular fact samples onto a fixed time grid.
//!
//! Each fact is partitioned out, timestamps are floored to the interval
//! boundary, values sharing a boundary are averaged, and every boundary
//! between the first and last observed one is emitted. Boundaries without
//! samples carry `None` rather than being dropped or zero-filled.
//!
//! Boundaries are aligned to the UNIX epoch. For any zone whose UTC offset
//! is a whole multiple of the interval this is the same as flooring local
//! wall-clock time.

use std::collections::BTreeMap;

use anyhow::{Result, ensure};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::facts::{BucketPoint, BucketedSeries, FactSample, LatestValue, Timestamp};

/// Default bucket width.
pub const DEFAULT_INTERVAL_MINS: i64 = 10;

/// Settings for a [`Resampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleConfig {
    /// Width of one bucket. Must be a positive whole number of seconds.
    pub interval: Duration,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::minutes(DEFAULT_INTERVAL_MINS),
        }
    }
}

/// Floor a UTC instant to a multiple of `step` since the epoch.
///
/// `step` is expected to be at least one second; sub-second components of
/// `ts` are discarded.
pub fn floor_utc(ts: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let step_secs = step.num_seconds().max(1);
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(step_secs), 0).unwrap_or(ts)
}

/// Buckets samples into regular per-fact series.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    interval: Duration,
}

impl Resampler {
    pub fn new(config: ResampleConfig) -> Result<Self> {
        ensure!(
            config.interval > Duration::zero(),
            "resample interval must be positive"
        );
        ensure!(
            config.interval.subsec_nanos() == 0,
            "resample interval must be a whole number of seconds"
        );
        Ok(Self {
            interval: config.interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Floor `ts` to its interval boundary, keeping its zone.
    ///
    /// Idempotent: a boundary floors to itself.
    pub fn floor(&self, ts: &Timestamp) -> Timestamp {
        floor_utc(ts.with_timezone(&Utc), self.interval).with_timezone(&ts.timezone())
    }

    /// Produce one series per distinct fact name, ordered by name.
    ///
    /// Empty input yields an empty vector. Duplicate rows each count toward
    /// the bucket mean.
    pub fn resample(&self, samples: &[FactSample]) -> Vec<BucketedSeries> {
        let step = self.interval.num_seconds();

        // fact -> (zone, boundary epoch secs -> (sum, count))
        let mut partitions: BTreeMap<&str, (Tz, BTreeMap<i64, (f64, usize)>)> = BTreeMap::new();
        for sample in samples {
            let boundary = floor_utc(sample.timestamp.with_timezone(&Utc), self.interval).timestamp();
            let (_, buckets) = partitions
                .entry(sample.fact_name.as_str())
                .or_insert_with(|| (sample.timestamp.timezone(), BTreeMap::new()));
            let slot = buckets.entry(boundary).or_insert((0.0, 0));
            slot.0 += sample.fact_value;
            slot.1 += 1;
        }

        partitions
            .into_iter()
            .map(|(fact_name, (tz, buckets))| BucketedSeries {
                fact_name: fact_name.to_string(),
                points: fill_boundaries(&buckets, step, tz),
            })
            .collect()
    }
}

/// Walk from the first to the last boundary, emitting means or gaps.
fn fill_boundaries(buckets: &BTreeMap<i64, (f64, usize)>, step: i64, tz: Tz) -> Vec<BucketPoint> {
    let (Some((&first, _)), Some((&last, _))) = (buckets.first_key_value(), buckets.last_key_value())
    else {
        return Vec::new();
    };

    let mut points = Vec::with_capacity(((last - first) / step + 1) as usize);
    let mut boundary = first;
    while boundary <= last {
        let Some(ts) = DateTime::from_timestamp(boundary, 0) else {
            break;
        };
        points.push(BucketPoint {
            timestamp: ts.with_timezone(&tz),
            fact_value: buckets.get(&boundary).map(|(sum, n)| sum / *n as f64),
        });
        boundary += step;
    }
    points
}

/// Most recent sample per fact.
///
/// When two samples share the latest timestamp, the later one in `samples`
/// wins.
pub fn latest_per_fact(samples: &[FactSample]) -> BTreeMap<String, LatestValue> {
    let mut latest: BTreeMap<String, LatestValue> = BTreeMap::new();
    for sample in samples {
        match latest.get_mut(&sample.fact_name) {
            Some(current) if current.ts > sample.timestamp => {}
            Some(current) => {
                current.ts = sample.timestamp;
                current.fact_value = sample.fact_value;
            }
            None => {
                latest.insert(
                    sample.fact_name.clone(),
                    LatestValue {
                        ts: sample.timestamp,
                        fact_value: sample.fact_value,
                    },
                );
            }
        }
    }
    latest
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

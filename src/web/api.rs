//! JSON API handlers.
//!
//! Each handler corresponds to an endpoint and returns a [`Reply`] with a
//! JSON body. Store failures propagate as [`crate::facts::FactError`] so the
//! router can pick the status code.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dashboard::Dashboard;
use crate::facts::LatestValue;

use super::Reply;

// ---------------------------------------------------------------------------
// JSON response types
// ---------------------------------------------------------------------------

/// `/latest.json` body: fact name to its newest sample.
type LatestResponse = BTreeMap<String, LatestValue>;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    panels: usize,
    tracked_facts: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn json_reply<T: Serialize>(data: &T) -> Result<Reply> {
    let body = serde_json::to_string(data).context("failed to serialize JSON response")?;
    Ok(Reply::json(200, body))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /latest.json`: newest sample per tracked fact.
pub fn get_latest(dashboard: &Dashboard, now: DateTime<Utc>) -> Result<Reply> {
    let latest: LatestResponse = dashboard.latest(now)?;
    json_reply(&latest)
}

/// `GET /health`: answers without touching the store.
pub fn get_health(dashboard: &Dashboard) -> Result<Reply> {
    json_reply(&HealthResponse {
        status: "ok",
        panels: dashboard.panel_count(),
        tracked_facts: dashboard.tracked_facts().len(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

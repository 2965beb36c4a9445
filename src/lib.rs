//! Monitoring dashboard over a PostgreSQL table of timestamped facts.
//!
//! Facts are named numeric measurements (`cpu_temp_f`, `memory_use_pct`, ...)
//! written by collectors elsewhere. This crate reads them back, resamples
//! them onto a fixed interval and serves them as SVG line charts and a small
//! JSON API.

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod facts;
pub mod render;
pub mod resample;
pub mod store;
pub mod web;

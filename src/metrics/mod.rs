//! Metrics recorded through the `metrics` facade
//!
//! The library only records; installing an exporter is up to the binary.
//!
//! * `counters`: connect attempts and failures, health checks, releases
//! * `histograms`: connect and health check latency
//! * `gauges`: live sessions

pub mod counters;
pub mod gauges;
pub mod histograms;
pub mod labels;

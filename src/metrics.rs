//! Metrics and telemetry for the query layer
//!
//! Prometheus instruments for the request planner, fronted by the
//! [`PlannerMetrics`] trait so the planner core stays decoupled from the
//! metrics backend: production wires in [`PrometheusMetrics`], tests inject
//! [`NoopMetrics`] or a recording sink of their own.

use lazy_static::lazy_static;
use prometheus::{register_histogram, Histogram};

lazy_static! {
    /// Chosen-archive indicator per planned bucket: archive index times
    /// bucket size. 0 means raw data, higher values mean rollups (or bigger
    /// buckets landing on rollups).
    pub static ref PLAN_CHOSEN_ARCHIVE: Histogram = register_histogram!(
        "vireo_plan_chosen_archive",
        "Chosen-archive indicator per planned bucket (archive index x bucket size)",
        vec![0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 64.0, 256.0]
    )
    .unwrap();

    /// Total points a planned batch will fetch from storage
    pub static ref PLAN_POINTS_FETCHED: Histogram = register_histogram!(
        "vireo_plan_points_fetched",
        "Points fetched from storage for a planned batch",
        prometheus::exponential_buckets(100.0, 10.0, 7).unwrap()
    )
    .unwrap();

    /// Total points a planned batch will return to the caller.
    ///
    /// Best effort: accounts for runtime consolidation but not for
    /// summarising functions applied downstream.
    pub static ref PLAN_POINTS_RETURNED: Histogram = register_histogram!(
        "vireo_plan_points_returned",
        "Points returned to the caller for a planned batch",
        prometheus::exponential_buckets(100.0, 10.0, 7).unwrap()
    )
    .unwrap();
}

/// Sink for the planner's three instruments
///
/// All methods default to no-ops so test sinks only override what they
/// record.
pub trait PlannerMetrics: Send + Sync {
    /// One planned bucket's chosen-archive indicator
    fn observe_chosen_archive(&self, indicator: u32) {
        let _ = indicator;
    }

    /// Total points a planned batch will fetch
    fn observe_points_fetched(&self, points: u64) {
        let _ = points;
    }

    /// Total points a planned batch will return
    fn observe_points_returned(&self, points: u64) {
        let _ = points;
    }
}

/// Prometheus-backed sink feeding the registered histograms
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

impl PlannerMetrics for PrometheusMetrics {
    fn observe_chosen_archive(&self, indicator: u32) {
        PLAN_CHOSEN_ARCHIVE.observe(f64::from(indicator));
    }

    fn observe_points_fetched(&self, points: u64) {
        PLAN_POINTS_FETCHED.observe(points as f64);
    }

    fn observe_points_returned(&self, points: u64) {
        PLAN_POINTS_RETURNED.observe(points as f64);
    }
}

/// Sink that drops every observation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl PlannerMetrics for NoopMetrics {}

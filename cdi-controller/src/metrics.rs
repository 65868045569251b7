#![allow(clippy::expect_used)] // it is safe to unwrap static metrics

use std::iter::repeat;
use std::ops::Mul;

use clippy_utilities::NumericCast;
use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounterVec, Opts, Registry};
use tracing::error;

/// Returns a vector of time buckets for the reconcile duration histogram.
fn exponential_time_bucket(start: f64, factor: f64, count: usize) -> Vec<f64> {
    repeat(factor)
        .enumerate()
        .take(count)
        .map(|(i, f)| start.mul(f.powi(i.numeric_cast())))
        .collect::<Vec<_>>()
}

lazy_static! {
    pub(crate) static ref REGISTRY: Registry = Registry::new();
    pub(crate) static ref RECONCILE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cdi_reconcile_duration_seconds",
            "Duration of a DataVolume/StorageProfile reconcile loop in seconds",
        )
        .buckets(exponential_time_bucket(0.1, 2.0, 10))
    )
    .expect("failed to create cdi_reconcile_duration_seconds histogram");
    pub(crate) static ref RECONCILE_FAILED_COUNT: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "cdi_reconcile_failed_count",
            "Number of failed reconciles, by reason"
        ),
        &["reason"]
    )
    .expect("failed to create cdi_reconcile_failed_count counter");
    /// Number of StorageProfiles whose `ClaimPropertySets` are missing an accessMode or
    /// volumeMode entry (spec.md §4.4)
    pub(crate) static ref INCOMPLETE_PROFILE_GAUGE: Gauge = Gauge::with_opts(Opts::new(
        "cdi_incomplete_profiles",
        "Number of StorageProfiles with an incomplete ClaimPropertySet"
    ))
    .expect("failed to create cdi_incomplete_profiles gauge");
}

/// init metrics
pub(crate) fn init() {
    REGISTRY
        .register(Box::new(RECONCILE_DURATION.clone()))
        .expect("failed to register cdi_reconcile_duration_seconds histogram");
    REGISTRY
        .register(Box::new(RECONCILE_FAILED_COUNT.clone()))
        .expect("failed to register cdi_reconcile_failed_count counter");
    REGISTRY
        .register(Box::new(INCOMPLETE_PROFILE_GAUGE.clone()))
        .expect("failed to register cdi_incomplete_profiles gauge");
}

/// metrics handler
#[allow(clippy::unused_async)] // required by axum
pub(crate) async fn metrics() -> String {
    let mut buf = Vec::new();
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    if let Err(err) = encoder.encode(&metric_families, &mut buf) {
        error!("failed to encode custom metrics: {}", err);
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

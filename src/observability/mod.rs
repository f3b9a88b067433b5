use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::time::Duration;
use tracing::info;

use crate::models::{LoadReport, LoadTrigger};

/// Metric instruments for the cache loader
#[derive(Clone)]
pub struct LoaderMetrics {
    pub meter: Meter,

    pub load_attempts: Counter<u64>,
    pub load_failures: Counter<u64>,
    pub load_skipped_guard: Counter<u64>,
    pub divisions_written: Counter<u64>,
    pub records_skipped: Counter<u64>,
    pub index_entries: Counter<u64>,
    pub load_duration: Histogram<f64>,
}

impl LoaderMetrics {
    /// Install a local meter provider as the global one and build the instruments
    pub fn new() -> Self {
        let provider = SdkMeterProvider::builder().build();
        global::set_meter_provider(provider.clone());

        let meter = provider.meter("location-cache");
        info!("OpenTelemetry configured: local loader metrics");

        Self::build_with_instruments(meter)
    }

    /// Build instruments on an existing meter without touching the global provider
    pub fn with_meter(meter: Meter) -> Self {
        Self::build_with_instruments(meter)
    }

    fn build_with_instruments(meter: Meter) -> Self {
        let load_attempts = meter
            .u64_counter("location_load_attempts_total")
            .with_description("Load generations started")
            .build();
        let load_failures = meter
            .u64_counter("location_load_failures_total")
            .with_description("Load generations that ended in an error")
            .build();
        let load_skipped_guard = meter
            .u64_counter("location_load_short_circuit_total")
            .with_description("Load requests answered by the guard flag")
            .build();
        let divisions_written = meter
            .u64_counter("location_divisions_written_total")
            .with_description("Division records written to the cache")
            .build();
        let records_skipped = meter
            .u64_counter("location_records_skipped_total")
            .with_description("Division records dropped for lacking a code")
            .build();
        let index_entries = meter
            .u64_counter("location_index_entries_total")
            .with_description("Name index memberships added")
            .build();
        let load_duration = meter
            .f64_histogram("location_load_duration_seconds")
            .with_description("Time taken by a full load generation")
            .build();

        Self {
            meter,
            load_attempts,
            load_failures,
            load_skipped_guard,
            divisions_written,
            records_skipped,
            index_entries,
            load_duration,
        }
    }

    pub fn record_attempt(&self, trigger: LoadTrigger) {
        self.load_attempts
            .add(1, &[KeyValue::new("trigger", trigger.to_string())]);
    }

    pub fn record_short_circuit(&self, trigger: LoadTrigger) {
        self.load_skipped_guard
            .add(1, &[KeyValue::new("trigger", trigger.to_string())]);
    }

    pub fn record_failure(&self, trigger: LoadTrigger, stage: &'static str) {
        self.load_failures.add(
            1,
            &[
                KeyValue::new("trigger", trigger.to_string()),
                KeyValue::new("stage", stage),
            ],
        );
    }

    pub fn record_report(&self, report: &LoadReport, elapsed: Duration) {
        for (level, count) in [
            ("province", report.provinces),
            ("district", report.districts),
            ("ward", report.wards),
        ] {
            self.divisions_written
                .add(count as u64, &[KeyValue::new("level", level)]);
        }
        self.records_skipped.add(report.skipped as u64, &[]);
        self.index_entries.add(report.index_entries as u64, &[]);
        self.load_duration.record(elapsed.as_secs_f64(), &[]);
    }
}

impl Default for LoaderMetrics {
    fn default() -> Self {
        Self::with_meter(global::meter("location-cache"))
    }
}

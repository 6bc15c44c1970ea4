use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::BTreeSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    judge_duration: Histogram<u64>,
    fallback_counter: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("pose_judge");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("compare_requests_total")
            .with_description("Total number of comparison requests")
            .build();

        // Model round trips take seconds, not milliseconds.
        let boundaries = generate_boundaries(&[
            (500, 2_000, 250),
            (2_000, 10_000, 1_000),
            (10_000, 60_000, 10_000),
        ]);

        let judge_duration = meter
            .u64_histogram("judge_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of model judging calls in milliseconds")
            .build();

        let fallback_counter = meter
            .u64_counter("fallback_verdicts_total")
            .with_description("Verdicts replaced by the fallback verdict")
            .build();

        Ok(Metrics {
            request_counter,
            judge_duration,
            fallback_counter,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_judge_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.judge_duration.record(duration_ms, &attributes);
    }

    pub fn record_fallback(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.fallback_counter.add(1, &attributes);
    }
}

/// Builds histogram bucket bounds from `(start, end, step)` segments,
/// dropping duplicates where segments meet.
fn generate_boundaries(segments: &[(u64, u64, usize)]) -> Vec<f64> {
    segments
        .iter()
        .flat_map(|&(start, end, step)| (start..=end).step_by(step.max(1)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|x| x as f64)
        .collect()
}

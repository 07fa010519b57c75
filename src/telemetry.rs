use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    inference_duration: Histogram<u64>,
    detection_counter: Counter<u64>,
    failure_counter: Counter<u64>,
    _provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("traffic_vision");
        global::set_meter_provider(provider.clone());

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of detection requests")
            .build();

        let boundaries = generate_boundaries((15, 30, 60, 500, 1000));

        let inference_duration = meter
            .u64_histogram("inference_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of detect and render in milliseconds")
            .build();

        let detection_counter = meter
            .u64_counter("detections_total")
            .with_description("Total number of detected objects")
            .build();

        let failure_counter = meter
            .u64_counter("flow_failures_total")
            .with_description("Failed upload or capture flows by error kind")
            .build();

        Ok(Metrics {
            request_counter,
            inference_duration,
            detection_counter,
            failure_counter,
            _provider: provider,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_inference_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.inference_duration.record(duration_ms, &attributes);
    }

    pub fn record_detections(&self, count: usize, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.detection_counter.add(count as u64, &attributes);
    }

    pub fn record_failure(&self, route: &str, kind: &str) {
        let attributes = vec![
            KeyValue::new("route", route.to_string()),
            KeyValue::new("kind", kind.to_string()),
        ];
        self.failure_counter.add(1, &attributes);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 10;
    let middle_step: usize = 2;
    let end_step: usize = 20;
    let tail_step: usize = 100;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (2, 22, 26, 46, 146);
        let get = generate_boundaries(parts);
        let expected = vec![2.0, 12.0, 22.0, 24.0, 26.0, 46.0, 146.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_recorded_metrics_are_exported() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("upload");
        metrics.record_detections(2, "upload");
        metrics.record_failure("capture", "DeviceUnavailable");

        let names: Vec<String> = metrics
            .registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(names.iter().any(|n| n.starts_with("requests_total")));
        assert!(names.iter().any(|n| n.starts_with("flow_failures_total")));
    }
}

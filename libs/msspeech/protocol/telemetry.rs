use crate::protocol::constants::*;
use crate::protocol::timestamp;
use serde_json::{json, Map, Value};

/// Microphone usage for the current turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MicrophoneMetric {
    pub start: Option<String>,
    pub end: Option<String>,
    pub error: Option<String>,
}

impl MicrophoneMetric {
    fn to_json(&self) -> Value {
        let mut metric = Map::new();
        metric.insert(TELEMETRY_METRIC_NAME.to_string(), json!(TELEMETRY_MICROPHONE));
        if let Some(start) = &self.start {
            metric.insert(TELEMETRY_START.to_string(), json!(start));
        }
        if let Some(end) = &self.end {
            metric.insert(TELEMETRY_END.to_string(), json!(end));
        }
        if let Some(error) = &self.error {
            metric.insert(TELEMETRY_ERROR.to_string(), json!(error));
        }
        Value::Object(metric)
    }
}

/// Per-turn telemetry
///
/// Arrival timestamps are keyed by the path exactly as received. The whole
/// accumulator is consumed by `take_report` once the turn has ended.
#[derive(Debug, Default)]
pub struct Telemetry {
    received: Map<String, Value>,
    microphone: MicrophoneMetric,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&mut self, path: &str) {
        self.record_received_at(path, timestamp::now());
    }

    pub fn record_received_at(&mut self, path: &str, at: String) {
        let arrivals = self
            .received
            .entry(path.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = arrivals {
            list.push(Value::String(at));
        }
    }

    pub fn record_stream_start(&mut self) {
        self.microphone.start = Some(timestamp::now());
    }

    /// Close the microphone record. A clean end clears any earlier error
    pub fn record_stream_end(&mut self, error: Option<String>) {
        self.microphone.end = Some(timestamp::now());
        self.microphone.error = error;
    }

    pub fn microphone(&self) -> &MicrophoneMetric {
        &self.microphone
    }

    /// Arrival timestamps recorded for `path`
    pub fn arrivals(&self, path: &str) -> usize {
        self.received
            .get(path)
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Serialize the telemetry body and start over with an empty accumulator
    pub fn take_report(&mut self) -> Value {
        let Telemetry { received, microphone } = std::mem::take(self);
        json!({
            TELEMETRY_RECEIVED_MESSAGES: Value::Object(received),
            TELEMETRY_METRICS: [microphone.to_json()],
        })
    }
}

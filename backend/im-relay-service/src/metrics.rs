//! Prometheus metrics for the relay pipeline
//!
//! Tracks message outcomes, which write failed, live forwarding and open connections.

use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static::lazy_static! {
    /// Inbound messages by terminal outcome
    static ref RELAY_MESSAGES: IntCounterVec = register_int_counter_vec!(
        "im_relay_messages_total",
        "Inbound chat messages by terminal outcome",
        &["outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Persistence failures split by the write that failed
    static ref RELAY_PERSIST_FAILURES: IntCounterVec = register_int_counter_vec!(
        "im_relay_persist_failures_total",
        "Persistence failures by stage (history/cache)",
        &["stage"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Live forwarding to the receiver
    static ref RELAY_FORWARD: IntCounterVec = register_int_counter_vec!(
        "im_relay_forward_total",
        "Accepted messages by receiver delivery result",
        &["result"]
    ).expect("Prometheus metrics registration should succeed at startup");

    static ref RELAY_CONNECTIONS: IntGauge = register_int_gauge!(
        "im_relay_connections",
        "Currently registered WebSocket connections"
    ).expect("Prometheus metrics registration should succeed at startup");
}

pub fn record_outcome(outcome: &str) {
    RELAY_MESSAGES.with_label_values(&[outcome]).inc();
}

pub fn record_persist_failure(stage: &str) {
    RELAY_PERSIST_FAILURES.with_label_values(&[stage]).inc();
}

pub fn record_forward(delivered: bool) {
    let result = if delivered { "delivered" } else { "offline" };
    RELAY_FORWARD.with_label_values(&[result]).inc();
}

pub fn set_connections(count: usize) {
    RELAY_CONNECTIONS.set(count as i64);
}

/// Render the default registry in the Prometheus text format.
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_relay_metrics() {
        record_outcome("ok");
        record_forward(true);
        record_persist_failure("cache");
        set_connections(3);

        let text = gather_text().unwrap();
        assert!(text.contains("im_relay_messages_total"));
        assert!(text.contains("im_relay_forward_total"));
        assert!(text.contains("im_relay_persist_failures_total"));
        assert!(text.contains("im_relay_connections"));
    }
}

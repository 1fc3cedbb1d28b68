//! Lightweight metrics helpers for the forwarder.
//!
//! Thin wrappers around the `metrics` facade. No exporter is embedded; whatever
//! recorder the host installs receives these series (without one they are no-ops).
//!
//! Provided metrics:
//! * `forwarder_requests_total` (counter; method, outcome, status)
//! * `forwarder_request_duration_seconds` (histogram; method)
//! * `forwarder_backend_attempts_total` (counter; backend, result)
//! * `forwarder_failovers_total` (counter; backend the sweep moved on to)
use std::time::Duration;

use ::metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::Lazy;

pub const FORWARDER_REQUESTS_TOTAL: &str = "forwarder_requests_total";
pub const FORWARDER_REQUEST_DURATION_SECONDS: &str = "forwarder_request_duration_seconds";
pub const FORWARDER_BACKEND_ATTEMPTS_TOTAL: &str = "forwarder_backend_attempts_total";
pub const FORWARDER_FAILOVERS_TOTAL: &str = "forwarder_failovers_total";

static DESCRIBED: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        FORWARDER_REQUESTS_TOTAL,
        Unit::Count,
        "Inbound requests handled, by outcome (relayed, redirect, failed)."
    );
    describe_histogram!(
        FORWARDER_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Time from receiving a request to producing its response."
    );
    describe_counter!(
        FORWARDER_BACKEND_ATTEMPTS_TOTAL,
        Unit::Count,
        "Outbound attempts per backend origin, by transport result."
    );
    describe_counter!(
        FORWARDER_FAILOVERS_TOTAL,
        Unit::Count,
        "Attempts made against a non-first origin after an earlier one was unreachable."
    );
});

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    Lazy::force(&DESCRIBED);
}

pub fn increment_forwarded_total(method: &str, outcome: &'static str, status: u16) {
    counter!(
        FORWARDER_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_forward_duration(method: &str, duration: Duration) {
    histogram!(
        FORWARDER_REQUEST_DURATION_SECONDS,
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn increment_backend_attempt_total(backend: &str, result: &'static str) {
    counter!(
        FORWARDER_BACKEND_ATTEMPTS_TOTAL,
        "backend" => backend.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn increment_failover_total(backend: &str) {
    counter!(FORWARDER_FAILOVERS_TOTAL, "backend" => backend.to_string()).increment(1);
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions.
//!
//! The gateway, connection manager, and HTTP layer record through the
//! metrics-rs facade; this module only names and documents the series.

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

/// Register all Courier metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "courier_deliveries_total",
        "Delivery attempts by provider and outcome (sent, fallback, link)"
    );
    describe_counter!(
        "courier_fallbacks_total",
        "Automated sends that degraded to a compose link"
    );
    describe_counter!(
        "courier_reconnects_total",
        "Reconnects scheduled by the connection manager"
    );
    describe_gauge!(
        "courier_connection_phase",
        "Connection phase: 0 disconnected, 1 connecting, 2 awaiting pairing, 3 connected"
    );
    describe_histogram!(
        "courier_send_duration_seconds",
        Unit::Seconds,
        "Time spent in a transport send"
    );
    describe_counter!(
        "courier_http_requests_total",
        "HTTP API requests by route and status"
    );
}

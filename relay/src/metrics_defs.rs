//! Metrics definitions for the relay.

use shared::metrics_defs::{MetricDef, MetricType};

pub const DEVICE_REQUESTS: MetricDef = MetricDef {
    name: "relay.devices.requests",
    metric_type: MetricType::Counter,
    description: "Number of requests served by the device listing route",
};

pub const UNAUTHORIZED_REQUESTS: MetricDef = MetricDef {
    name: "relay.devices.unauthorized",
    metric_type: MetricType::Counter,
    description: "Number of device listing requests rejected for a missing or wrong bearer token",
};

pub const UPSTREAM_FAILURES: MetricDef = MetricDef {
    name: "relay.upstream.failures",
    metric_type: MetricType::Counter,
    description: "Number of failed calls to the Tailscale API",
};

pub const UPSTREAM_DURATION: MetricDef = MetricDef {
    name: "relay.upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a Tailscale API device listing in seconds",
};

pub const SKIPPED_DEVICES: MetricDef = MetricDef {
    name: "relay.devices.skipped",
    metric_type: MetricType::Counter,
    description: "Number of upstream devices dropped because they had no address",
};

pub const ALL_METRICS: &[MetricDef] = &[
    DEVICE_REQUESTS,
    UNAUTHORIZED_REQUESTS,
    UPSTREAM_FAILURES,
    UPSTREAM_DURATION,
    SKIPPED_DEVICES,
];

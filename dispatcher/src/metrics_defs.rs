use shared::metrics_defs::{MetricDef, MetricType};

pub const DISPATCH_CYCLES: MetricDef = MetricDef {
    name: "dispatch.cycles",
    metric_type: MetricType::Counter,
    description: "Completed dispatch cycles. Tagged with trigger.",
};

pub const DISPATCH_CYCLES_INFLIGHT: MetricDef = MetricDef {
    name: "dispatch.cycles.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of dispatch cycles currently running",
};

pub const PROBE_REQUESTS: MetricDef = MetricDef {
    name: "probe.requests",
    metric_type: MetricType::Counter,
    description: "Outbound probe calls. Tagged with outcome: success, http_error, transport_error.",
};

pub const PROBE_DURATION: MetricDef = MetricDef {
    name: "probe.duration",
    metric_type: MetricType::Histogram,
    description: "Outbound probe duration in seconds",
};

pub const CONTROL_AUTH_REJECTED: MetricDef = MetricDef {
    name: "control.auth.rejected",
    metric_type: MetricType::Counter,
    description: "Control surface requests rejected by authentication. Tagged with reason.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    DISPATCH_CYCLES,
    DISPATCH_CYCLES_INFLIGHT,
    PROBE_REQUESTS,
    PROBE_DURATION,
    CONTROL_AUTH_REJECTED,
];

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with path, status.",
};

pub const PLATFORM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "platform.request.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of deployment platform API calls in seconds. Tagged with operation.",
};

pub const SERVICES_UPDATED: MetricDef = MetricDef {
    name: "services.updated",
    metric_type: MetricType::Counter,
    description: "Number of services updated and redeployed",
};

pub const SERVICE_UPDATE_FAILURES: MetricDef = MetricDef {
    name: "services.update_failed",
    metric_type: MetricType::Counter,
    description: "Number of services whose update failed. Tagged with step.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    PLATFORM_REQUEST_DURATION,
    SERVICES_UPDATED,
    SERVICE_UPDATE_FAILURES,
];

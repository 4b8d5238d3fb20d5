use metrics::{describe_counter, describe_gauge, describe_histogram, Label, Unit};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub(crate) enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl Display for MetricType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricType::Counter => write!(f, "Counter"),
            MetricType::Gauge => write!(f, "Gauge"),
            MetricType::Histogram => write!(f, "Histogram"),
        }
    }
}

pub(crate) struct StaticMetric {
    pub(crate) metric_name: &'static str,
    unit: Unit,
    description: &'static str,
    metric_type: MetricType,
}

impl StaticMetric {
    fn describe(&self) {
        match self.metric_type {
            MetricType::Counter => describe_counter!(self.metric_name, self.unit, self.description),
            MetricType::Gauge => describe_gauge!(self.metric_name, self.unit, self.description),
            MetricType::Histogram => describe_histogram!(self.metric_name, self.unit, self.description),
        }
    }

    pub(crate) fn increment(&self, labels: Vec<Label>) {
        debug_assert_eq!(self.metric_type, MetricType::Counter);
        metrics::counter!(self.metric_name, labels).increment(1);
    }

    pub(crate) fn gauge(&self, value: f64, labels: Vec<Label>) {
        debug_assert_eq!(self.metric_type, MetricType::Gauge);
        metrics::gauge!(self.metric_name, labels).set(value);
    }

    pub(crate) fn histogram(&self, value: f64, labels: Vec<Label>) {
        debug_assert_eq!(self.metric_type, MetricType::Histogram);
        metrics::histogram!(self.metric_name, labels).record(value);
    }
}

pub(crate) const REQUESTS_ISSUED: StaticMetric = StaticMetric {
    metric_name: "central.request.issued.count",
    unit: Unit::Count,
    description: "The number of registered requests",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUESTS_REJECTED: StaticMetric = StaticMetric {
    metric_name: "central.request.rejected.count",
    unit: Unit::Count,
    description: "The number of requests rejected before registration",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUESTS_RESOLVED: StaticMetric = StaticMetric {
    metric_name: "central.request.resolved.count",
    unit: Unit::Count,
    description: "The number of requests resolved by a radio event or a scan window",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUESTS_TIMED_OUT: StaticMetric = StaticMetric {
    metric_name: "central.request.timed_out.count",
    unit: Unit::Count,
    description: "The number of requests failed by the timeout supervisor",
    metric_type: MetricType::Counter,
};

pub(crate) const REQUEST_DURATION: StaticMetric = StaticMetric {
    metric_name: "central.request.duration",
    unit: Unit::Milliseconds,
    description: "The time between request registration and its resolution",
    metric_type: MetricType::Histogram,
};

pub(crate) const EVENTS_DISPATCHED: StaticMetric = StaticMetric {
    metric_name: "central.event.dispatched.count",
    unit: Unit::Count,
    description: "The number of radio events handled by the dispatcher",
    metric_type: MetricType::Counter,
};

pub(crate) const EVENTS_UNMATCHED: StaticMetric = StaticMetric {
    metric_name: "central.event.unmatched.count",
    unit: Unit::Count,
    description: "The number of radio events without a pending request or session",
    metric_type: MetricType::Counter,
};

pub(crate) const ACTIVE_SESSIONS: StaticMetric = StaticMetric {
    metric_name: "central.session.active.count",
    unit: Unit::Count,
    description: "The number of established sessions",
    metric_type: MetricType::Gauge,
};

pub(crate) const SESSIONS_ABRUPTED: StaticMetric = StaticMetric {
    metric_name: "central.session.abrupted.count",
    unit: Unit::Count,
    description: "The number of sessions dropped by an abrupt disconnection",
    metric_type: MetricType::Counter,
};

pub(crate) const CALLBACKS_PANICKED: StaticMetric = StaticMetric {
    metric_name: "central.callback.panicked.count",
    unit: Unit::Count,
    description: "The number of continuations and abruption handlers that panicked",
    metric_type: MetricType::Counter,
};

pub(crate) fn describe_metrics() {
    REQUESTS_ISSUED.describe();
    REQUESTS_REJECTED.describe();
    REQUESTS_RESOLVED.describe();
    REQUESTS_TIMED_OUT.describe();
    REQUEST_DURATION.describe();
    EVENTS_DISPATCHED.describe();
    EVENTS_UNMATCHED.describe();
    ACTIVE_SESSIONS.describe();
    SESSIONS_ABRUPTED.describe();
    CALLBACKS_PANICKED.describe();
}

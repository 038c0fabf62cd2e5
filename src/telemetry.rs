use serde_repr::Serialize_repr;
use std::collections::BTreeMap;

/// Custom properties attached to a telemetry item.
pub type Properties = BTreeMap<String, String>;

/// Importance of a trace message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr)]
#[repr(u8)]
pub enum SeverityLevel {
    /// Diagnostic detail.
    Verbose = 0,
    /// Normal operation.
    Information = 1,
    /// Something unexpected that the application recovered from.
    Warning = 2,
    /// A failure of the current operation.
    Error = 3,
    /// A failure that requires immediate attention.
    Critical = 4,
}

impl From<tracing::Level> for SeverityLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => SeverityLevel::Verbose,
            tracing::Level::INFO => SeverityLevel::Information,
            tracing::Level::WARN => SeverityLevel::Warning,
            _ => SeverityLevel::Error,
        }
    }
}

/// A single measured value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Name of the metric.
    pub name: String,
    /// Measured value.
    pub value: f64,
    /// Custom properties.
    pub properties: Properties,
}

/// Pre-aggregated summary of many measurements of the same metric.
///
/// Every optional field distinguishes "not set" (`None`) from zero. Unset fields are not sent.
///
/// ```
/// use application_insights_telemetry::SampledMetric;
///
/// let summary = SampledMetric::new("request.duration", 1250.0)
///     .with_count(10)
///     .with_max(410.0);
/// assert_eq!(None, summary.min);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SampledMetric {
    /// Name of the metric.
    pub name: String,
    /// Sum of all samples.
    pub sum: f64,
    /// Number of samples.
    pub count: Option<i32>,
    /// Largest sample.
    pub max: Option<f64>,
    /// Smallest sample.
    pub min: Option<f64>,
    /// Standard deviation of the samples.
    pub std_dev: Option<f64>,
}

impl SampledMetric {
    /// Create a summary with only a name and a sum.
    pub fn new(name: impl Into<String>, sum: f64) -> Self {
        Self {
            name: name.into(),
            sum,
            count: None,
            max: None,
            min: None,
            std_dev: None,
        }
    }

    /// Set the number of samples.
    pub fn with_count(mut self, count: i32) -> Self {
        self.count = Some(count);
        self
    }

    /// Set the largest sample.
    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Set the smallest sample.
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Set the standard deviation.
    pub fn with_std_dev(mut self, std_dev: f64) -> Self {
        self.std_dev = Some(std_dev);
        self
    }
}

/// A [`SampledMetric`] together with its custom properties.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledMetricSummary {
    /// The aggregated values.
    pub metric: SampledMetric,
    /// Custom properties.
    pub properties: Properties,
}

/// A named discrete event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTelemetry {
    /// Name of the event.
    pub name: String,
    /// Custom properties.
    pub properties: Properties,
}

/// A log-style message.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceTelemetry {
    /// Message text.
    pub message: String,
    /// Severity of the message.
    pub severity_level: SeverityLevel,
    /// Custom properties.
    pub properties: Properties,
}

/// A validated telemetry item, as handed to a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    /// See [`TelemetryClient::track_metric`](crate::TelemetryClient::track_metric).
    Metric(MetricSample),
    /// See [`TelemetryClient::track_sampled_metric`](crate::TelemetryClient::track_sampled_metric).
    SampledMetric(SampledMetricSummary),
    /// See [`TelemetryClient::track_event`](crate::TelemetryClient::track_event).
    Event(EventTelemetry),
    /// See [`TelemetryClient::track_trace`](crate::TelemetryClient::track_trace).
    Trace(TraceTelemetry),
}

impl Telemetry {
    /// Name of the metric or event, or the trace message.
    pub fn name(&self) -> &str {
        match self {
            Telemetry::Metric(metric) => &metric.name,
            Telemetry::SampledMetric(summary) => &summary.metric.name,
            Telemetry::Event(event) => &event.name,
            Telemetry::Trace(trace) => &trace.message,
        }
    }

    /// Custom properties of the item.
    pub fn properties(&self) -> &Properties {
        match self {
            Telemetry::Metric(metric) => &metric.properties,
            Telemetry::SampledMetric(summary) => &summary.properties,
            Telemetry::Event(event) => &event.properties,
            Telemetry::Trace(trace) => &trace.properties,
        }
    }
}

use crate::{
    models::{Data, DataPoint, DataPointType, EventData, MessageData, MetricData, Properties},
    Telemetry,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::SystemTime;

pub(crate) fn time_to_string(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_empty(properties: Properties) -> Option<Properties> {
    Some(properties).filter(|x| !x.is_empty())
}

impl Telemetry {
    /// Name of the envelope that carries this kind of item.
    pub(crate) fn envelope_name(&self) -> &'static str {
        match self {
            Telemetry::Metric(_) | Telemetry::SampledMetric(_) => {
                "Microsoft.ApplicationInsights.Metric"
            }
            Telemetry::Event(_) => "Microsoft.ApplicationInsights.Event",
            Telemetry::Trace(_) => "Microsoft.ApplicationInsights.Message",
        }
    }
}

impl From<Telemetry> for Data {
    fn from(telemetry: Telemetry) -> Data {
        match telemetry {
            Telemetry::Metric(sample) => Data::Metric(MetricData {
                ver: 2,
                metrics: vec![DataPoint {
                    ns: None,
                    name: sample.name,
                    kind: DataPointType::Measurement,
                    value: sample.value,
                }],
                properties: non_empty(sample.properties),
            }),
            Telemetry::SampledMetric(summary) => {
                let metric = summary.metric;
                Data::Metric(MetricData {
                    ver: 2,
                    metrics: vec![DataPoint {
                        ns: None,
                        name: metric.name,
                        kind: DataPointType::Aggregation {
                            count: metric.count,
                            min: metric.min,
                            max: metric.max,
                            std_dev: metric.std_dev,
                        },
                        value: metric.sum,
                    }],
                    properties: non_empty(summary.properties),
                })
            }
            Telemetry::Event(event) => Data::Event(EventData {
                ver: 2,
                name: event.name,
                properties: non_empty(event.properties),
            }),
            Telemetry::Trace(trace) => Data::Message(MessageData {
                ver: 2,
                message: trace.message,
                severity_level: Some(trace.severity_level),
                properties: non_empty(trace.properties),
            }),
        }
    }
}

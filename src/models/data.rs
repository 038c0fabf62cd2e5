use crate::models::{EventData, MessageData, MetricData, Sanitize};
use serde::Serialize;

/// Data struct to contain both B and C sections.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "baseType", content = "baseData")]
pub(crate) enum Data {
    #[serde(rename = "EventData")]
    Event(EventData),
    #[serde(rename = "MessageData")]
    Message(MessageData),
    #[serde(rename = "MetricData")]
    Metric(MetricData),
}

impl Sanitize for Data {
    fn sanitize(&mut self) {
        match self {
            Data::Event(data) => data.sanitize(),
            Data::Message(data) => data.sanitize(),
            Data::Metric(data) => data.sanitize(),
        }
    }
}

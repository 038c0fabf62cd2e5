use crate::models::{DataPoint, Properties, Sanitize};
use serde::Serialize;

/// An instance of the Metric item is a list of measurements (single data points) and/or
/// aggregations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetricData {
    /// Schema version
    pub(crate) ver: i32,

    /// List of metrics. Only one metric in the list is currently supported by Application Insights
    /// storage. If multiple data points were sent only the first one will be used.
    pub(crate) metrics: Vec<DataPoint>,

    /// Collection of custom properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) properties: Option<Properties>,
}

impl Sanitize for MetricData {
    fn sanitize(&mut self) {
        for metric in self.metrics.iter_mut() {
            metric.sanitize();
        }
        if let Some(properties) = self.properties.as_mut() {
            properties.sanitize();
        }
    }
}

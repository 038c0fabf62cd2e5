use crate::models::{sanitize::truncate, Properties, Sanitize};
use serde::Serialize;

/// Instances of Event represent structured event records that can be grouped and searched by their
/// properties. Event data item also creates a metric of event count by name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventData {
    /// Schema version
    pub(crate) ver: i32,

    /// Event name. Keep it low cardinality to allow proper grouping and useful metrics.
    pub(crate) name: String,

    /// Collection of custom properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) properties: Option<Properties>,
}

impl Sanitize for EventData {
    fn sanitize(&mut self) {
        truncate(&mut self.name, 512);
        if let Some(properties) = self.properties.as_mut() {
            properties.sanitize();
        }
    }
}

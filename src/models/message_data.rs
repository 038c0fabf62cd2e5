use crate::models::{sanitize::truncate, Properties, Sanitize};
use crate::SeverityLevel;
use serde::Serialize;

/// Instances of Message represent printf-like trace statements that are text-searched. Log4Net,
/// NLog and other text-based log file entries are translated into intances of this type. The
/// message does not have measurements.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageData {
    /// Schema version
    pub(crate) ver: i32,

    /// Trace message
    pub(crate) message: String,

    /// Trace severity level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) severity_level: Option<SeverityLevel>,

    /// Collection of custom properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) properties: Option<Properties>,
}

impl Sanitize for MessageData {
    fn sanitize(&mut self) {
        truncate(&mut self.message, 32768);
        if let Some(properties) = self.properties.as_mut() {
            properties.sanitize();
        }
    }
}

use crate::models::{context_tag_keys::Tags, Data, Sanitize};
use serde::Serialize;

/// System variables for a telemetry item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope {
    pub(crate) name: &'static str,
    pub(crate) time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) sample_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) i_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tags: Option<Tags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<Data>,
}

impl Sanitize for Envelope {
    fn sanitize(&mut self) {
        if let Some(tags) = self.tags.as_mut() {
            tags.sanitize();
        }
        if let Some(data) = self.data.as_mut() {
            data.sanitize();
        }
    }
}

use crate::models::sanitize::truncate;
use crate::models::Sanitize;
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ContextTagKey(&'static str);

impl ContextTagKey {
    const fn new(key: &'static str) -> Self {
        ContextTagKey(key)
    }
}

impl Serialize for ContextTagKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0)
    }
}

pub(crate) type Tags = BTreeMap<ContextTagKey, String>;

/// Application version. Information in the application context fields is always about the
/// application that is sending the telemetry.
pub(crate) const APPLICATION_VERSION: ContextTagKey = ContextTagKey::new("ai.application.ver");

/// Name of the role the application is a part of. Maps directly to the role name in azure.
pub(crate) const CLOUD_ROLE: ContextTagKey = ContextTagKey::new("ai.cloud.role");

/// Name of the instance where the application is running. Computer name for on-premisis, instance
/// name for Azure.
pub(crate) const CLOUD_ROLE_INSTANCE: ContextTagKey = ContextTagKey::new("ai.cloud.roleInstance");

/// SDK version. See
/// https://github.com/Microsoft/ApplicationInsights-Home/blob/master/SDK-AUTHORING.md#sdk-version-specification
/// for information.
pub(crate) const INTERNAL_SDK_VERSION: ContextTagKey = ContextTagKey::new("ai.internal.sdkVersion");

impl Sanitize for Tags {
    fn sanitize(&mut self) {
        for (key, value) in self.iter_mut() {
            truncate(
                value,
                match *key {
                    APPLICATION_VERSION => 1024,
                    CLOUD_ROLE => 256,
                    CLOUD_ROLE_INSTANCE => 256,
                    INTERNAL_SDK_VERSION => 64,
                    _ => 1024,
                },
            );
        }
    }
}

//! Settings lookup.
//!
//! The client never reads process-wide state on its own. Everything it needs is pulled from a
//! [`ConfigurationProvider`] handed to its constructor.

use crate::Error;
use std::collections::{BTreeMap, HashMap};

/// Setting that holds the instrumentation key.
pub const INSTRUMENTATION_KEY_SETTING: &str = "ApplicationInsights.InstrumentationKey";

/// Optional setting that overrides the ingestion endpoint, e.g. `https://westeurope-5.in.applicationinsights.azure.com/`.
pub const ENDPOINT_ADDRESS_SETTING: &str = "ApplicationInsights.EndpointAddress";

/// A source of named string settings.
pub trait ConfigurationProvider {
    /// Returns the value of setting `key`, or `None` if it is not set.
    fn get(&self, key: &str) -> Option<String>;
}

impl<P: ConfigurationProvider + ?Sized> ConfigurationProvider for &P {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

impl<S: std::hash::BuildHasher> ConfigurationProvider for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigurationProvider for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

/// Reads settings from environment variables.
///
/// A setting is looked up by its exact name first and then by its normalized name, which is
/// upper-cased with every `.` replaced by `_`. `ApplicationInsights.InstrumentationKey` can
/// therefore be provided as `APPLICATIONINSIGHTS_INSTRUMENTATIONKEY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl ConfigurationProvider for Environment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .or_else(|_| std::env::var(normalize_env_key(key)))
            .ok()
    }
}

fn normalize_env_key(key: &str) -> String {
    key.chars()
        .map(|c| if c == '.' { '_' } else { c.to_ascii_uppercase() })
        .collect()
}

#[cfg(feature = "config")]
#[cfg_attr(docsrs, doc(cfg(feature = "config")))]
impl ConfigurationProvider for ::config::Config {
    fn get(&self, key: &str) -> Option<String> {
        self.get_string(key).ok()
    }
}

/// Resolve the instrumentation key a client should use.
///
/// Returns `explicit` unless it is blank. Otherwise returns the non-blank value of
/// [`INSTRUMENTATION_KEY_SETTING`] from `config`, or fails with [`Error::Configuration`].
pub fn resolve_instrumentation_key(
    explicit: &str,
    config: &dyn ConfigurationProvider,
) -> Result<String, Error> {
    if !explicit.trim().is_empty() {
        return Ok(explicit.to_string());
    }

    config
        .get(INSTRUMENTATION_KEY_SETTING)
        .filter(|key| !key.trim().is_empty())
        .ok_or(Error::Configuration {
            setting: INSTRUMENTATION_KEY_SETTING,
        })
}

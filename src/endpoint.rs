use std::{borrow::Cow, convert::TryInto};

pub(crate) const DEFAULT_BREEZE_ENDPOINT: &str = "https://dc.services.visualstudio.com";
const TRACK_PATH: &str = "v2/track";

/// Turns a configured ingestion endpoint into the URI telemetry is posted to.
pub(crate) fn track_endpoint(base: &str) -> Result<http::Uri, http::uri::InvalidUri> {
    let base = sanitize_url(base);
    format!("{}/{}", base, TRACK_PATH).as_str().try_into()
}

fn sanitize_url(url: &str) -> Cow<'_, str> {
    let mut new_url: Cow<str> = url.trim().into();
    if !new_url.starts_with("https://") {
        new_url = new_url.replace("http://", "https://").into();
    }

    match new_url {
        Cow::Borrowed(url) => Cow::Borrowed(url.trim_end_matches('/')),
        Cow::Owned(url) => Cow::Owned(url.trim_end_matches('/').to_string()),
    }
}

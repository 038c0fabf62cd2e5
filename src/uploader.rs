use crate::{models::Envelope, Error};
use backon::{ExponentialBuilder, FuturesTimerSleeper, Retryable};
use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};
use http::{Request, Response, Uri};
use opentelemetry_http::HttpClient;
use serde::Deserialize;
use std::{io::Write, time::Duration};

const STATUS_OK: u16 = 200;
const STATUS_PARTIAL_CONTENT: u16 = 206;
const STATUS_REQUEST_TIMEOUT: u16 = 408;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;
const STATUS_APPLICATION_INACTIVE: u16 = 439; // Quota
const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;
const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Transmission {
    items_received: usize,
    items_accepted: usize,
    errors: Vec<TransmissionItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransmissionItem {
    status_code: u16,
}

/// Backoff used between attempts of the same upload.
pub(crate) fn default_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(30))
        .with_max_times(3)
        .with_jitter()
}

/// Sends telemetry items to the server, retrying transient failures.
pub(crate) async fn send<C: HttpClient + ?Sized>(
    client: &C,
    endpoint: &Uri,
    items: Vec<Envelope>,
    backoff: ExponentialBuilder,
) -> Result<(), Error> {
    if items.is_empty() {
        return Ok(());
    }
    let payload = Bytes::from(serialize_request_body(&items)?);
    let payload = &payload;

    let send_once = move || async move {
        let request = Request::post(endpoint)
            .header(http::header::CONTENT_TYPE, "application/x-json-stream")
            .header(http::header::CONTENT_ENCODING, "gzip")
            .body(payload.clone())
            .expect("request should be valid");
        let response = client
            .send_bytes(request)
            .await
            .map_err(Error::UploadConnection)?;
        handle_response(response)
    };

    send_once
        .retry(backoff)
        .sleep(FuturesTimerSleeper)
        .when(Error::is_retryable)
        .notify(|err: &Error, after: Duration| {
            tracing::debug!(
                target: "application_insights",
                error = %err,
                retry_after = ?after,
                "upload failed, retrying"
            );
        })
        .await
}

/// Serializes the items as newline delimited JSON and compresses them.
fn serialize_request_body(items: &[Envelope]) -> Result<Vec<u8>, Error> {
    let mut serialized = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            serialized.push(b'\n');
        }
        serde_json::to_writer(&mut serialized, item).map_err(Error::UploadSerializeRequest)?;
    }

    let mut gzip_encoder = GzEncoder::new(Vec::new(), Compression::default());
    gzip_encoder
        .write_all(&serialized)
        .map_err(Error::UploadCompressRequest)?;
    gzip_encoder.finish().map_err(Error::UploadCompressRequest)
}

fn upload_error(status: u16, retryable: bool, message: impl Into<String>) -> Error {
    Error::Upload {
        status,
        retryable,
        message: message.into(),
    }
}

fn handle_response(response: Response<Bytes>) -> Result<(), Error> {
    match response.status().as_u16() {
        STATUS_OK => Ok(()),
        status @ STATUS_PARTIAL_CONTENT => {
            let content: Transmission = serde_json::from_slice(response.body())
                .map_err(|err| upload_error(status, false, err.to_string()))?;
            if content.items_received == content.items_accepted {
                Ok(())
            } else if content.errors.iter().any(can_retry_item) {
                // Resending the whole batch would duplicate the accepted items.
                Err(upload_error(
                    status,
                    false,
                    "some items may be retried, but partial retries are not supported",
                ))
            } else {
                Err(upload_error(
                    status,
                    false,
                    format!("no retry possible, response: {:?}", content),
                ))
            }
        }
        status @ (STATUS_REQUEST_TIMEOUT
        | STATUS_TOO_MANY_REQUESTS
        | STATUS_APPLICATION_INACTIVE
        | STATUS_SERVICE_UNAVAILABLE) => Err(upload_error(status, true, "retry possible")),
        status @ STATUS_INTERNAL_SERVER_ERROR => {
            match serde_json::from_slice::<Transmission>(response.body()) {
                Ok(content) if !content.errors.iter().any(can_retry_item) => {
                    Err(upload_error(status, false, "no retry possible"))
                }
                _ => Err(upload_error(status, true, "some items may be retried")),
            }
        }
        status => Err(upload_error(
            status,
            false,
            format!(
                "no retry possible, response: {}",
                String::from_utf8_lossy(response.body())
            ),
        )),
    }
}

/// Determines that a telemetry item can be re-send corresponding to this submission status
/// descriptor.
fn can_retry_item(item: &TransmissionItem) -> bool {
    item.status_code == STATUS_PARTIAL_CONTENT
        || item.status_code == STATUS_REQUEST_TIMEOUT
        || item.status_code == STATUS_TOO_MANY_REQUESTS
        || item.status_code == STATUS_APPLICATION_INACTIVE
        || item.status_code == STATUS_INTERNAL_SERVER_ERROR
        || item.status_code == STATUS_SERVICE_UNAVAILABLE
}

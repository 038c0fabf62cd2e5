use std::error::Error as StdError;

/// Errors that occur while constructing a client or uploading telemetry.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No instrumentation key was passed explicitly and the configuration did not contain one
    /// either. The client cannot be used.
    #[error("instrumentation key was not configured with setting {setting}")]
    Configuration {
        /// Name of the setting that was looked up.
        setting: &'static str,
    },

    /// The configured ingestion endpoint is not a valid URI.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] http::uri::InvalidUri),

    /// The background thread that uploads telemetry could not be started.
    #[error("starting telemetry channel failed with {0}")]
    ChannelStart(std::io::Error),

    /// Application Insights telemetry data failed to serialize to JSON. Telemetry reporting failed
    /// because of this.
    ///
    /// Note: This is an error in this crate. If you spot this, please open an issue.
    #[error("serializing upload request failed with {0}")]
    UploadSerializeRequest(serde_json::Error),

    /// Application Insights telemetry data failed to compress. Telemetry reporting failed because
    /// of this.
    #[error("compressing upload request failed with {0}")]
    UploadCompressRequest(std::io::Error),

    /// Could not complete the HTTP request to Application Insights to send telemetry data.
    /// Telemetry reporting failed because of this.
    #[error("sending upload request failed with {0}")]
    UploadConnection(Box<dyn StdError + Send + Sync + 'static>),

    /// Application Insights rejected at least some of the reported telemetry data.
    #[error("upload failed with {status}: {message}")]
    Upload {
        /// HTTP status code of the response.
        status: u16,
        /// Whether sending the same items again may succeed.
        retryable: bool,
        /// Details about the failure.
        message: String,
    },
}

impl Error {
    /// Returns `true` if the upload that produced this error may succeed when attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::UploadConnection(_) => true,
            Error::Upload { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// A tracking operation was called with an argument that does not satisfy its precondition.
///
/// Nothing was forwarded to the transport. The call can be repeated with corrected arguments.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("argument `{argument}` must not be empty or whitespace")]
pub struct InvalidArgumentError {
    argument: &'static str,
}

impl InvalidArgumentError {
    pub(crate) fn new(argument: &'static str) -> Self {
        Self { argument }
    }

    /// Name of the offending argument.
    pub fn argument(&self) -> &'static str {
        self.argument
    }
}

/// Returns `value` if it contains anything besides whitespace.
pub(crate) fn ensure_not_blank<'a>(
    value: &'a str,
    argument: &'static str,
) -> Result<&'a str, InvalidArgumentError> {
    if value.trim().is_empty() {
        Err(InvalidArgumentError::new(argument))
    } else {
        Ok(value)
    }
}

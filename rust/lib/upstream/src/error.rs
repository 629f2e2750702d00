use itinerary_core::ServiceError;

/// Upstream client error.
///
/// Every variant is recoverable: callers turn it into a degraded page
/// state (an error row, a logged failure) and keep going.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Upstream answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Server { status: u16, body: String },

    /// Request could not be sent or the response could not be read.
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    /// Credential acquisition failed.
    #[error("auth: {0}")]
    Auth(String),

    /// Body is not JSON or lacks the expected shape. `raw` keeps the
    /// original text so it can be relayed for debugging.
    #[error("decode: {message}")]
    Decode { message: String, raw: String },

    /// The sales order has no detail key to look up.
    #[error("missing key: {0}")]
    MissingKey(String),
}

impl ApiError {
    /// Shorthand for a shape error with no raw body.
    pub fn shape(message: impl Into<String>) -> Self {
        ApiError::Decode {
            message: message.into(),
            raw: String::new(),
        }
    }
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Server { status, .. } => {
                ServiceError::Upstream(format!("upstream answered with status {}", status))
            }
            ApiError::Network(e) => ServiceError::Upstream(format!("upstream request failed: {}", e)),
            ApiError::Auth(msg) => ServiceError::Upstream(format!("upstream login failed: {}", msg)),
            ApiError::Decode { message, .. } => {
                ServiceError::UpstreamFormat(format!("invalid upstream response: {}", message))
            }
            ApiError::MissingKey(msg) => ServiceError::MissingKey(msg),
        }
    }
}

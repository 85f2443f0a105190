//! HTTP client for the intake API.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the wire types do not pull in `reqwest`.

mod intake;

pub use intake::IntakeClient;

use reqwest::StatusCode;

use crate::objects::ApiErrorBody;

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the call with a structured error body.
    #[error("api error: status {status}, {message} ({code})", message = .body.message, code = .body.code)]
    Api { status: StatusCode, body: ApiErrorBody },

    /// The server returned a non-2xx status without a parseable error body.
    #[error("unexpected response: status {status}, body: {body}")]
    Unexpected { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Whether repeating the call with the same idempotency key may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Api { body, .. } => body.code == crate::objects::ErrorCode::Internal,
            ClientError::Unexpected { status, .. } => status.is_server_error(),
            ClientError::Json(_) | ClientError::Url(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ErrorCode;

    fn api_error(code: ErrorCode) -> ClientError {
        ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            body: ApiErrorBody {
                code,
                message: "rejected".to_string(),
            },
        }
    }

    #[test]
    fn internal_errors_are_retryable() {
        assert!(api_error(ErrorCode::Internal).is_retryable());
        assert!(!api_error(ErrorCode::FailedPrecondition).is_retryable());
    }

    #[test]
    fn unexpected_status_retries_only_server_errors() {
        let bad_gateway = ClientError::Unexpected {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        let not_found = ClientError::Unexpected {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
        };
        assert!(bad_gateway.is_retryable());
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn api_error_message_includes_code() {
        let message = api_error(ErrorCode::FailedPrecondition).to_string();
        assert!(message.contains("failed_precondition"));
        assert!(message.contains("rejected"));
    }
}

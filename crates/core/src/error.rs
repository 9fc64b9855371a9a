use serde::{Deserialize, Serialize};

/// Error classification shared by every layer.
///
/// Each kind has two origins. Transport kinds come from HTTP status codes;
/// `Validation` is also raised by the engine for malformed datasets. Only the
/// transport origin is ever retried, and only for `Network`, `Server` and
/// `RateLimit` (see [`ErrorKind::is_retryable`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No HTTP status: connection refused, DNS, timeout, unreadable body.
    #[serde(rename = "network_error")]
    Network,
    /// HTTP 401, or no API key configured (pre-flight, never sent).
    #[serde(rename = "authentication_error")]
    Auth,
    /// HTTP 429.
    #[serde(rename = "rate_limit_error")]
    RateLimit,
    /// HTTP 5xx.
    #[serde(rename = "server_error")]
    Server,
    /// HTTP 400/422, or a dataset/selection the engine refuses.
    #[serde(rename = "validation_error")]
    Validation,
    /// Any other status, or a response we could not make sense of.
    #[serde(rename = "unknown_error")]
    Unknown,
    /// Caller aborted the call between attempts or during a backoff wait.
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network_error",
            ErrorKind::Auth => "authentication_error",
            ErrorKind::RateLimit => "rate_limit_error",
            ErrorKind::Server => "server_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Unknown => "unknown_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Map an HTTP status (or its absence) to a kind.
    pub fn classify(status: Option<u16>) -> Self {
        match status {
            None => ErrorKind::Network,
            Some(401) => ErrorKind::Auth,
            Some(429) => ErrorKind::RateLimit,
            Some(s) if s >= 500 => ErrorKind::Server,
            Some(400) | Some(422) => ErrorKind::Validation,
            Some(_) => ErrorKind::Unknown,
        }
    }

    /// Transient kinds. `Auth`, `Validation`, `Unknown` and `Cancelled` are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Server | ErrorKind::RateLimit)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whatever the failure carried beyond its status code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ErrorCause {
    /// Parsed error body returned by the server.
    Body(serde_json::Value),
    /// Transport-level error text (reqwest, I/O).
    Transport(String),
}

/// A classified failure with a message ready to show to the user verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
    pub cause: Option<ErrorCause>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), status_code: None, cause: None }
    }

    /// Domain validation failure (engine, formatter, malformed response).
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Build from an HTTP failure. `detail` is the server's own message
    /// (`error.message` in the body) or the status text.
    pub fn from_status(status: u16, detail: &str, body: Option<serde_json::Value>) -> Self {
        let kind = ErrorKind::classify(Some(status));
        Self {
            kind,
            message: user_message(kind, detail, Some(status)),
            status_code: Some(status),
            cause: body.map(ErrorCause::Body),
        }
    }

    /// The request never produced a status code.
    pub fn network(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            kind: ErrorKind::Network,
            message: user_message(ErrorKind::Network, &detail, None),
            status_code: None,
            cause: Some(ErrorCause::Transport(detail)),
        }
    }

    /// Pre-flight failure: no API key configured.
    pub fn missing_key(hint: &str) -> Self {
        Self::new(
            ErrorKind::Auth,
            format!("API key is not configured. {}", hint),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Request was cancelled.")
    }

    pub fn with_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Retry eligibility: transient kind, or any 5xx regardless of kind.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable() || self.status_code.is_some_and(|s| s >= 500)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// Human-readable message for a classified failure.
pub fn user_message(kind: ErrorKind, detail: &str, status: Option<u16>) -> String {
    let status = status.map(|s| s.to_string()).unwrap_or_else(|| "n/a".to_string());
    match kind {
        ErrorKind::Network => format!(
            "Network connection error, check your connection and try again. Details: {}",
            detail
        ),
        ErrorKind::Auth => format!(
            "Authentication failed, check that your API key is correct. Details: {}",
            detail
        ),
        ErrorKind::RateLimit => format!(
            "Request rate limit exceeded, try again later. Details: {}",
            detail
        ),
        ErrorKind::Server => format!(
            "AI service error ({}), try again later. Details: {}",
            status, detail
        ),
        ErrorKind::Validation => format!(
            "Invalid request parameters, check your input. Details: {}",
            detail
        ),
        ErrorKind::Cancelled => format!("Request was cancelled. Details: {}", detail),
        ErrorKind::Unknown => format!("Unknown error ({}). Details: {}", status, detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(ErrorKind::classify(None), ErrorKind::Network);
        assert_eq!(ErrorKind::classify(Some(401)), ErrorKind::Auth);
        assert_eq!(ErrorKind::classify(Some(429)), ErrorKind::RateLimit);
        assert_eq!(ErrorKind::classify(Some(500)), ErrorKind::Server);
        assert_eq!(ErrorKind::classify(Some(503)), ErrorKind::Server);
        assert_eq!(ErrorKind::classify(Some(400)), ErrorKind::Validation);
        assert_eq!(ErrorKind::classify(Some(422)), ErrorKind::Validation);
        assert_eq!(ErrorKind::classify(Some(403)), ErrorKind::Unknown);
        assert_eq!(ErrorKind::classify(Some(404)), ErrorKind::Unknown);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Server.is_retryable());
        assert!(ErrorKind::RateLimit.is_retryable());
        assert!(!ErrorKind::Auth.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_5xx_retryable_even_when_kind_is_terminal() {
        let mut err = ApiError::from_status(502, "bad gateway", None);
        err.kind = ErrorKind::Unknown;
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_status_message_and_cause() {
        let body = serde_json::json!({"error": {"message": "slow down"}});
        let err = ApiError::from_status(429, "slow down", Some(body.clone()));
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.status_code, Some(429));
        assert!(err.message.contains("rate limit"));
        assert!(err.message.contains("slow down"));
        assert_eq!(err.cause, Some(ErrorCause::Body(body)));
    }

    #[test]
    fn test_server_message_includes_status() {
        let err = ApiError::from_status(503, "unavailable", None);
        assert!(err.message.contains("(503)"));
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&ErrorKind::Auth).unwrap();
        assert_eq!(json, "\"authentication_error\"");
        for kind in [
            ErrorKind::Network,
            ErrorKind::Auth,
            ErrorKind::RateLimit,
            ErrorKind::Server,
            ErrorKind::Validation,
            ErrorKind::Unknown,
            ErrorKind::Cancelled,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json.as_str(), Some(kind.as_str()));
        }
    }

    #[test]
    fn test_missing_key_is_auth_without_status() {
        let err = ApiError::missing_key("Set PRICELENS_DEEPSEEK_KEY");
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.status_code.is_none());
        assert!(!err.is_retryable());
    }
}

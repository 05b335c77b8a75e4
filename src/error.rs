//! Error types for the SDK.
//!
//! Every failure is a single [`SdkError`] tagged with an [`ErrorKind`]. HTTP
//! failures are sorted into kinds by [`classify`]; transport failures that never
//! produced a status become [`ErrorKind::Connection`] or [`ErrorKind::Timeout`].

use serde_json::Value;
use std::fmt;
use thiserror::Error;

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 401 from the service.
    Authentication,
    /// 429 from the service; may carry `retry_after`.
    RateLimit,
    /// Any other 4xx, or a request rejected before it was sent.
    Validation,
    /// 5xx, or any other unexpected status.
    Api,
    /// The request never got an HTTP response (DNS, refused, reset).
    Connection,
    /// The configured deadline passed.
    Timeout,
    /// A successful response whose body could not be decoded.
    Decode,
    /// Invalid client configuration.
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::RateLimit => "rate_limit",
            Self::Validation => "validation",
            Self::Api => "api",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Decode => "decode",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("{}", render(.status_code, .message))]
pub struct SdkError {
    kind: ErrorKind,
    message: String,
    status_code: Option<u16>,
    response: Option<Value>,
    retry_after: Option<u64>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

fn render(status_code: &Option<u16>, message: &str) -> String {
    match status_code {
        Some(code) => format!("[{code}] {message}"),
        None => message.to_string(),
    }
}

impl SdkError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            status_code: None,
            response: None,
            retry_after: None,
            source: None,
        }
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, msg)
    }

    pub fn rate_limit(msg: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self {
            retry_after,
            ..Self::new(ErrorKind::RateLimit, msg)
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, msg)
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, msg)
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    #[must_use]
    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// The decoded error body returned by the service, if any.
    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    /// Seconds the service asked us to wait. Only set on rate-limit errors.
    pub fn retry_after(&self) -> Option<u64> {
        self.retry_after
    }

    pub fn is_authentication(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind == ErrorKind::RateLimit
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_connection(&self) -> bool {
        self.kind == ErrorKind::Connection
    }
}

/// Map an HTTP status and its decoded error body to an [`SdkError`].
///
/// 401 is authentication, 429 is rate limiting, the rest of 4xx is validation
/// and everything else is an API error. The body is attached unchanged.
pub fn classify(status_code: u16, payload: Value) -> SdkError {
    let message = error_message(&payload);

    let err = match status_code {
        401 => SdkError::authentication(message),
        429 => SdkError::rate_limit(message, retry_after(&payload)),
        400..=499 => SdkError::validation(message),
        _ => SdkError::api(message),
    };

    err.with_status(status_code).with_response(payload)
}

fn error_message(payload: &Value) -> String {
    match payload.get("error") {
        Some(Value::Object(detail)) => match detail.get("message") {
            Some(message) => scalar_text(message),
            None => UNKNOWN_ERROR.to_string(),
        },
        Some(other) => scalar_text(other),
        None => UNKNOWN_ERROR.to_string(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => UNKNOWN_ERROR.to_string(),
        Value::String(s) if s.is_empty() => UNKNOWN_ERROR.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn retry_after(payload: &Value) -> Option<u64> {
    match payload.get("retry_after")? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.ceil() as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        let base = if err.is_timeout() {
            SdkError::timeout(format!("Request timed out: {err}"))
        } else if err.is_builder() {
            SdkError::config(format!("Invalid request: {err}"))
        } else {
            SdkError::connection(format!("Failed to connect: {err}"))
        };
        base.with_source(err)
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::decode(format!("Invalid JSON: {err}")).with_source(err)
    }
}

impl From<toml::de::Error> for SdkError {
    fn from(err: toml::de::Error) -> Self {
        SdkError::config(format!("TOML parse error: {err}")).with_source(err)
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        SdkError::config(format!("IO error: {err}")).with_source(err)
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;

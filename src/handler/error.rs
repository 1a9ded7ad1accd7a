//! Errors raised inside the middleware pipeline.

use std::error::Error as StdError;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::status;
use crate::error::SocketError;
use crate::protocol::Data;

/// An error carrying an HTTP-like status.
///
/// `expose` marks errors whose message is safe to show the peer; it defaults
/// to `true` for client errors (status below 500).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    status: u16,
    message: String,
    expose: bool,
    data: Option<Value>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HttpError {
    /// Create an error with a status and message.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            expose: status < status::INTERNAL_SERVER_ERROR,
            data: None,
            source: None,
        }
    }

    /// Create an error whose message is the status reason phrase.
    pub fn from_status(code: u16) -> Self {
        Self::new(code, status::reason(code).unwrap_or("Unknown Error"))
    }

    /// Wrap an unexpected failure as a 500.
    pub fn internal(err: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            status: status::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
            expose: false,
            data: None,
            source: Some(Box::new(err)),
        }
    }

    /// Override the expose flag.
    pub fn with_expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    /// Attach custom data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Status code.
    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the message is safe to expose.
    #[inline]
    pub fn expose(&self) -> bool {
        self.expose
    }

    /// Custom data, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Message followed by the chain of causes.
    pub fn stack(&self) -> String {
        let mut stack = format!("HttpError [{}]: {}", self.status, self.message);
        let mut cause = self.source.as_deref().and_then(|e| e.source());
        while let Some(err) = cause {
            stack.push_str(&format!("\n    caused by: {err}"));
            cause = err.source();
        }
        stack
    }
}

impl From<SocketError> for HttpError {
    fn from(err: SocketError) -> Self {
        Self::internal(err)
    }
}

/// A pipeline rejection.
///
/// Middleware is expected to fail with an [`HttpError`]; raising any other
/// value is a middleware bug and trips an assertion in the error handler.
#[derive(Debug)]
pub enum PipelineError {
    /// A proper error.
    Http(HttpError),
    /// A value that is not an error.
    NonError(Data),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Http(err) => write!(f, "{err}"),
            PipelineError::NonError(value) => write!(f, "non-error thrown: {value:?}"),
        }
    }
}

impl From<HttpError> for PipelineError {
    fn from(err: HttpError) -> Self {
        PipelineError::Http(err)
    }
}

impl From<SocketError> for PipelineError {
    fn from(err: SocketError) -> Self {
        PipelineError::Http(HttpError::from(err))
    }
}

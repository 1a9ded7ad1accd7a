//! Outbound HTTP-shaped calls and parsing of their replies.
//!
//! [`HttpCall`] packages `(headers?, url, ...body)` for a `http<VERB>`
//! event; [`parse_reply`] reads the peer's ack arguments back as
//! `(headers?, status, ...body)`.

use serde_json::Value;

use crate::error::{Result, SocketError};
use crate::protocol::{Data, Headers, Payload};

use super::request::{is_method, HTTP_PREFIX};

/// Verbs with dedicated sugar on the socket.
pub const METHODS: [&str; 7] = ["HEAD", "OPTIONS", "GET", "PUT", "PATCH", "POST", "DELETE"];

/// Event name for a method: `http` + the method upper-cased.
///
/// Methods that would not read back as a request are rejected.
pub fn event_name(method: &str) -> Result<String> {
    if !is_method(method) {
        return Err(SocketError::InvalidMethod(method.to_string()));
    }
    Ok(format!("{HTTP_PREFIX}{}", method.to_ascii_uppercase()))
}

/// An outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpCall {
    pub headers: Headers,
    pub url: String,
    pub body: Vec<Data>,
}

impl HttpCall {
    /// Request for `url` with no headers or body.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replace all headers.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Append one body argument.
    pub fn body(mut self, value: impl Into<Data>) -> Self {
        self.body.push(value.into());
        self
    }

    /// Serialize a value as one JSON body argument.
    pub fn json<T: serde::Serialize>(self, value: &T) -> Result<Self> {
        Ok(self.body(serde_json::to_value(value)?))
    }

    /// Positional event arguments, name first. Headers are left out when empty.
    pub fn into_args(self, method: &str) -> Result<Vec<Data>> {
        let mut args = Vec::with_capacity(self.body.len() + 3);
        args.push(Data::from(event_name(method)?));
        if !self.headers.is_empty() {
            args.push(Data::from(self.headers));
        }
        args.push(Data::from(self.url));
        args.extend(self.body);
        Ok(args)
    }
}

/// The peer's answer to an [`HttpCall`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub headers: Headers,
    pub status: u16,
    pub body: Payload,
}

impl HttpReply {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, if it is a single string.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Payload::Single(d) => d.as_str(),
            _ => None,
        }
    }

    /// Deserialize a single JSON body.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let value = self.body.as_json().cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}

/// Read ack arguments as `(headers?, status, ...body)`.
pub fn parse_reply(mut args: Vec<Data>) -> Result<HttpReply> {
    let headers = match args.first().and_then(Data::as_object) {
        Some(map) => {
            let map = map.clone();
            args.remove(0);
            map
        }
        None => Headers::new(),
    };

    if args.is_empty() {
        return Err(SocketError::MalformedReply("missing status".into()));
    }
    let first = args.remove(0);
    let status = first
        .as_json()
        .and_then(Value::as_u64)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| SocketError::MalformedReply(format!("status is not a number: {first:?}")))?;

    Ok(HttpReply {
        headers,
        status,
        body: Payload::from_args(args),
    })
}

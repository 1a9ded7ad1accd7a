//! Reading an event's positional arguments as a request.
//!
//! An event is HTTP-shaped when its name is `http<METHOD>` (prefix matched
//! case-insensitively) and its arguments read as
//! `(headers?, url, ...body)`:
//!
//! | argument | meaning                                              |
//! |----------|------------------------------------------------------|
//! | 0        | `http<METHOD>`                                       |
//! | 1        | header map if it is a JSON object, otherwise the URL |
//! | next     | URL (must be a string)                               |
//! | rest     | body: none is null, one is the value, more stay a sequence |
//!
//! Anything else parses as [`ParsedEvent::NotHttpShaped`] and is delivered
//! to plain listeners.
//!
//! # Example
//!
//! ```
//! use nsp_socket::handler::{parse_request, ParsedEvent};
//! use nsp_socket::protocol::{Data, Payload};
//! use serde_json::json;
//!
//! let args = vec![Data::from("httpGET"), Data::from("/foo")];
//! let ParsedEvent::Request(req) = parse_request(&args) else { panic!() };
//! assert_eq!(req.method, "GET");
//! assert_eq!(req.url, "/foo");
//! assert!(req.headers.is_empty());
//! assert_eq!(req.body, Payload::Null);
//! ```

use serde_json::Value;

use crate::protocol::{Data, Headers, Payload};

/// Event-name prefix marking an HTTP-shaped event.
pub const HTTP_PREFIX: &str = "http";

/// Method that never gets a response body.
pub const HEAD: &str = "HEAD";

/// Fields read out of an HTTP-shaped event.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Payload,
}

/// Outcome of reading an event as a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// Deliver to plain listeners.
    NotHttpShaped,
    /// Run through the middleware pipeline.
    Request(ParsedRequest),
}

/// Whether `method` is a non-empty HTTP token (RFC 7230 `tchar`s only).
pub fn is_method(method: &str) -> bool {
    !method.is_empty() && method.bytes().all(is_tchar)
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

/// Split `http<METHOD>` into the method, if the name has that shape.
pub fn http_method(name: &str) -> Option<&str> {
    let prefix = name.get(..HTTP_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(HTTP_PREFIX) {
        return None;
    }
    let method = &name[HTTP_PREFIX.len()..];
    is_method(method).then_some(method)
}

/// Read positional event arguments (name first, reply excluded) as a request.
pub fn parse_request(args: &[Data]) -> ParsedEvent {
    let Some(method) = args.first().and_then(Data::as_str).and_then(http_method) else {
        return ParsedEvent::NotHttpShaped;
    };

    let (headers, url_idx) = match args.get(1).and_then(Data::as_object) {
        Some(map) => (map.clone(), 2),
        None => (Headers::new(), 1),
    };

    let Some(url) = args.get(url_idx).and_then(Data::as_str) else {
        return ParsedEvent::NotHttpShaped;
    };

    let body = Payload::from_args(args[url_idx + 1..].to_vec());

    ParsedEvent::Request(ParsedRequest {
        method: method.to_string(),
        url: url.to_string(),
        headers,
        body,
    })
}

/// The synthetic request seen by middleware.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    url: String,
    original_url: String,
    headers: Headers,
    body: Payload,
}

impl Request {
    pub(crate) fn new(parsed: ParsedRequest) -> Self {
        Self {
            original_url: parsed.url.clone(),
            method: parsed.method,
            url: parsed.url,
            headers: parsed.headers,
            body: parsed.body,
        }
    }

    /// Request method, as sent.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Current URL (middleware may rewrite it).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Rewrite the URL; `original_url` is kept.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// URL as received.
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// URL path without the query string.
    pub fn path(&self) -> &str {
        self.url.split_once('?').map_or(self.url.as_str(), |(p, _)| p)
    }

    /// Raw query string without the `?`.
    pub fn querystring(&self) -> &str {
        self.url.split_once('?').map_or("", |(_, q)| q)
    }

    /// All headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Request body.
    pub fn body(&self) -> &Payload {
        &self.body
    }

    /// Take the body, leaving null.
    pub fn take_body(&mut self) -> Payload {
        std::mem::take(&mut self.body)
    }

    /// Whether the method is HEAD.
    pub fn is_head(&self) -> bool {
        self.method == HEAD
    }
}

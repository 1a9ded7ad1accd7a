//! Positional argument values carried by packets.
//!
//! Event arguments are either JSON values or binary blobs. Binary blobs are
//! what turns an EVENT into a BINARY_EVENT (and an ACK into a BINARY_ACK).
//!
//! # Example
//!
//! ```
//! use nsp_socket::protocol::{Data, Payload};
//! use serde_json::json;
//!
//! let args = vec![Data::from(json!({"a": 1}))];
//! assert_eq!(Payload::from_args(args), Payload::Single(json!({"a": 1}).into()));
//! assert_eq!(Payload::from_args(vec![]), Payload::Null);
//! ```

use bytes::Bytes;
use serde_json::{Map, Value};

/// Header map used by HTTP-shaped events.
pub type Headers = Map<String, Value>;

/// One positional argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Any JSON value.
    Json(Value),
    /// Raw bytes (zero-copy via `bytes::Bytes`).
    Binary(Bytes),
}

impl Data {
    /// JSON `null`.
    pub fn null() -> Self {
        Data::Json(Value::Null)
    }

    /// Borrow as a string if this is a JSON string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a JSON object (a "plain object" in header position).
    #[inline]
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Data::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Borrow the JSON value, if any.
    #[inline]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Data::Json(v) => Some(v),
            Data::Binary(_) => None,
        }
    }

    /// Borrow the binary payload, if any.
    #[inline]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Data::Binary(b) => Some(b),
            Data::Json(_) => None,
        }
    }

    /// Whether this argument is binary.
    #[inline]
    pub fn is_binary(&self) -> bool {
        matches!(self, Data::Binary(_))
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Data::Json(value)
    }
}

impl From<Bytes> for Data {
    fn from(bytes: Bytes) -> Self {
        Data::Binary(bytes)
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data::Binary(Bytes::from(bytes))
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Data::Json(Value::String(s.to_string()))
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Data::Json(Value::String(s))
    }
}

impl From<u16> for Data {
    fn from(n: u16) -> Self {
        Data::Json(Value::from(n))
    }
}

impl From<Headers> for Data {
    fn from(map: Headers) -> Self {
        Data::Json(Value::Object(map))
    }
}

/// Check whether any argument needs binary framing.
pub fn has_binary(args: &[Data]) -> bool {
    args.iter().any(Data::is_binary)
}

/// Trailing positional arguments collapsed by count:
/// none is `Null`, one is `Single`, more stay a sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// No arguments.
    #[default]
    Null,
    /// Exactly one argument.
    Single(Data),
    /// Two or more arguments, in order.
    Multiple(Vec<Data>),
}

impl Payload {
    /// Collapse positional arguments.
    pub fn from_args(mut args: Vec<Data>) -> Self {
        match args.len() {
            0 => Payload::Null,
            1 => Payload::Single(args.remove(0)),
            _ => Payload::Multiple(args),
        }
    }

    /// Spread back into positional arguments.
    pub fn into_args(self) -> Vec<Data> {
        match self {
            Payload::Null => Vec::new(),
            Payload::Single(d) => vec![d],
            Payload::Multiple(v) => v,
        }
    }

    /// Whether there is no payload.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null)
    }

    /// Borrow the JSON value of a single-argument payload.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Single(d) => d.as_json(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_from_args() {
        assert_eq!(Payload::from_args(vec![]), Payload::Null);
        assert_eq!(
            Payload::from_args(vec![Data::from("a")]),
            Payload::Single(Data::from("a"))
        );
        assert_eq!(
            Payload::from_args(vec![Data::from("a"), Data::from(json!(2))]),
            Payload::Multiple(vec![Data::from("a"), Data::from(json!(2))])
        );
    }

    #[test]
    fn test_payload_into_args_spreads() {
        let p = Payload::Multiple(vec![Data::from("x"), Data::from("y")]);
        assert_eq!(p.into_args().len(), 2);
        assert!(Payload::Null.into_args().is_empty());
    }

    #[test]
    fn test_object_detection() {
        assert!(Data::from(json!({"x": "1"})).as_object().is_some());
        assert!(Data::from(json!(["x"])).as_object().is_none());
        assert!(Data::from("x").as_object().is_none());
        assert!(Data::null().as_object().is_none());
    }

    #[test]
    fn test_has_binary() {
        assert!(!has_binary(&[Data::from("a"), Data::from(json!(1))]));
        assert!(has_binary(&[
            Data::from("a"),
            Data::from(Bytes::from_static(b"raw"))
        ]));
    }
}

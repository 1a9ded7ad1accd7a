//! The synthetic response and the sink that turns it into ack arguments.
//!
//! A finished response is written back through the event's reply handle as
//! positional arguments:
//!
//! ```text
//! [headers,] status [, body...]
//! ```
//!
//! - headers are left out entirely when empty
//! - a sequence body is spread after the status
//! - a streaming body is read to the end first and sent as bytes
//! - no body sends only `[headers,] status`

use std::fmt;

use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::status;
use crate::ack::ReplyHandle;
use crate::error::Result;
use crate::protocol::{Data, Headers, Payload};

/// Streaming body source.
pub type BodyStream = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// A response body.
pub enum Body {
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// Structured value.
    Json(Value),
    /// Several values, spread positionally in the reply.
    Sequence(Vec<Data>),
    /// Read to completion before replying.
    Stream(BodyStream),
}

impl Body {
    /// Wrap an async reader.
    pub fn stream(reader: impl AsyncRead + Send + Sync + Unpin + 'static) -> Self {
        Body::Stream(Box::new(reader))
    }

    /// Build from a request/reply payload; `Null` gives no body.
    pub fn from_payload(payload: Payload) -> Option<Self> {
        match payload {
            Payload::Null => None,
            Payload::Single(Data::Json(v)) => Some(Body::Json(v)),
            Payload::Single(Data::Binary(b)) => Some(Body::Bytes(b)),
            Payload::Multiple(v) => Some(Body::Sequence(v)),
        }
    }

    /// Whether this is a streaming body.
    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Body::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Body::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Body::Sequence(v) => f.debug_tuple("Sequence").field(v).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Text(s.to_string())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Text(s)
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Bytes(b)
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(b))
    }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        Body::Json(v)
    }
}

impl From<Vec<Data>> for Body {
    fn from(v: Vec<Data>) -> Self {
        Body::Sequence(v)
    }
}

/// Writes a finished response into the event's reply.
#[derive(Debug)]
pub struct ResponseSink {
    reply: Option<ReplyHandle>,
}

impl ResponseSink {
    /// Wrap the event's reply handle (if the peer expects one).
    pub fn new(reply: Option<ReplyHandle>) -> Self {
        Self { reply }
    }

    /// Whether the peer is waiting for a reply.
    pub fn can_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Serialize and send. Streams are drained (and dropped) first.
    pub async fn end(self, headers: &Headers, status: u16, body: Option<Body>) -> Result<()> {
        let Some(reply) = self.reply else {
            tracing::warn!("can't respond to client: event carried no reply");
            return Ok(());
        };

        let mut args = Vec::with_capacity(3);
        if !headers.is_empty() {
            args.push(Data::from(headers.clone()));
        }
        args.push(Data::from(status));

        match body {
            None => {}
            Some(Body::Sequence(items)) => args.extend(items),
            Some(Body::Stream(mut reader)) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                drop(reader);
                args.push(Data::Binary(Bytes::from(buf)));
            }
            Some(Body::Text(s)) => args.push(Data::from(s)),
            Some(Body::Bytes(b)) => args.push(Data::Binary(b)),
            Some(Body::Json(v)) => args.push(Data::Json(v)),
        }

        reply.send(args);
        Ok(())
    }
}

/// The synthetic response seen by middleware.
#[derive(Debug)]
pub struct Response {
    status: u16,
    explicit_status: bool,
    message: Option<String>,
    body: Option<Body>,
    slot: Option<Body>,
    headers: Headers,
    sink: Option<ResponseSink>,
}

impl Response {
    pub(crate) fn new(sink: ResponseSink) -> Self {
        Self {
            status: status::NOT_FOUND,
            explicit_status: false,
            message: None,
            body: None,
            slot: None,
            headers: Headers::new(),
            sink: Some(sink),
        }
    }

    /// Status code (404 until something sets it).
    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Set the status explicitly; later body assignments keep it.
    pub fn set_status(&mut self, code: u16) {
        self.status = code;
        self.explicit_status = true;
    }

    /// Custom message, else the reason phrase, else the code as text.
    pub fn message(&self) -> String {
        match &self.message {
            Some(m) => m.clone(),
            None => status::reason(self.status)
                .map(str::to_string)
                .unwrap_or_else(|| self.status.to_string()),
        }
    }

    /// Override the status message.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Current body.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Set the body; status becomes 200 unless it was set explicitly.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        if !self.explicit_status {
            self.status = status::OK;
        }
        self.body = Some(body.into());
    }

    /// Remove the body.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Fallback value used as the body when none was set.
    pub fn slot(&self) -> Option<&Body> {
        self.slot.as_ref()
    }

    /// Set the fallback value.
    pub fn set_slot(&mut self, slot: impl Into<Body>) {
        self.slot = Some(slot.into());
    }

    pub(crate) fn take_slot(&mut self) -> Option<Body> {
        self.slot.take()
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Response header by exact name.
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    /// Set a response header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Remove a response header.
    pub fn remove_header(&mut self, name: &str) -> Option<Value> {
        self.headers.remove(name)
    }

    /// Whether the response can still be written.
    pub fn writable(&self) -> bool {
        self.sink.is_some()
    }

    /// Whether the peer is waiting for a reply.
    pub fn can_reply(&self) -> bool {
        self.sink.as_ref().is_some_and(ResponseSink::can_reply)
    }

    /// Write the response now. Later calls (and finalization) do nothing.
    pub async fn end(&mut self, body: Option<Body>) -> Result<()> {
        match self.sink.take() {
            Some(sink) => sink.end(&self.headers, self.status, body).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::PacketSink;
    use crate::protocol::Packet;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Packet>>);

    impl PacketSink for Recorder {
        fn send_packet(&self, packet: Packet) {
            self.0.lock().unwrap().push(packet);
        }
    }

    fn sink() -> (Arc<Recorder>, Arc<dyn PacketSink>, ResponseSink) {
        let recorder = Arc::new(Recorder::default());
        let dyn_sink: Arc<dyn PacketSink> = recorder.clone();
        let reply = ReplyHandle::new(1, Arc::downgrade(&dyn_sink));
        (recorder, dyn_sink, ResponseSink::new(Some(reply)))
    }

    fn sent(recorder: &Recorder) -> Vec<Data> {
        let packets = recorder.0.lock().unwrap();
        assert_eq!(packets.len(), 1);
        packets[0].data.clone()
    }

    #[tokio::test]
    async fn test_status_and_text() {
        let (rec, _keep, sink) = sink();
        sink.end(&Headers::new(), 200, Some(Body::from("ok"))).await.unwrap();
        assert_eq!(sent(&rec), vec![Data::from(200u16), Data::from("ok")]);
    }

    #[tokio::test]
    async fn test_headers_prefix_when_present() {
        let (rec, _keep, sink) = sink();
        let mut headers = Headers::new();
        headers.insert("etag".into(), json!("abc"));
        sink.end(&headers, 304, None).await.unwrap();
        assert_eq!(
            sent(&rec),
            vec![Data::from(json!({"etag": "abc"})), Data::from(304u16)]
        );
    }

    #[tokio::test]
    async fn test_sequence_spread() {
        let (rec, _keep, sink) = sink();
        let body = Body::Sequence(vec![Data::from("a"), Data::from(json!(2))]);
        sink.end(&Headers::new(), 200, Some(body)).await.unwrap();
        assert_eq!(
            sent(&rec),
            vec![Data::from(200u16), Data::from("a"), Data::from(json!(2))]
        );
    }

    #[tokio::test]
    async fn test_stream_buffered() {
        let (rec, _keep, sink) = sink();
        let (mut writer, reader) = tokio::io::duplex(8);
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for chunk in [&b"hello "[..], b"streamed ", b"world"] {
                writer.write_all(chunk).await.unwrap();
            }
        });
        sink.end(&Headers::new(), 200, Some(Body::stream(reader)))
            .await
            .unwrap();
        assert_eq!(
            sent(&rec),
            vec![
                Data::from(200u16),
                Data::from(Bytes::from_static(b"hello streamed world"))
            ]
        );
    }

    #[tokio::test]
    async fn test_no_reply_is_ok() {
        let sink = ResponseSink::new(None);
        assert!(!sink.can_reply());
        assert!(sink.end(&Headers::new(), 200, None).await.is_ok());
    }

    #[test]
    fn test_set_body_sets_ok_unless_explicit() {
        let mut res = Response::new(ResponseSink::new(None));
        assert_eq!(res.status(), 404);
        res.set_body("hi");
        assert_eq!(res.status(), 200);

        let mut res = Response::new(ResponseSink::new(None));
        res.set_status(201);
        res.set_body(json!({"id": 1}));
        assert_eq!(res.status(), 201);
    }

    #[test]
    fn test_message_fallbacks() {
        let mut res = Response::new(ResponseSink::new(None));
        assert_eq!(res.message(), "Not Found");
        res.set_status(599);
        assert_eq!(res.message(), "599");
        res.set_message("custom");
        assert_eq!(res.message(), "custom");
    }

    #[tokio::test]
    async fn test_end_only_once() {
        let (rec, _keep, sink) = sink();
        let mut res = Response::new(sink);
        res.set_status(202);
        res.end(None).await.unwrap();
        assert!(!res.writable());
        res.end(Some(Body::from("late"))).await.unwrap();
        assert_eq!(sent(&rec), vec![Data::from(202u16)]);
    }
}

//! Events, lifecycle notifications and listeners.
//!
//! Application events are arbitrary names; a fixed set of names is reserved
//! for lifecycle notifications and cannot be emitted or listened to as
//! application events. Lifecycle notifications are delivered as the typed
//! [`Notification`] enum instead.
//!
//! # Example
//!
//! ```
//! use nsp_socket::event::{EventName, ReservedEvent};
//!
//! assert_eq!(EventName::parse("connect"), EventName::Reserved(ReservedEvent::Connect));
//! assert_eq!(EventName::parse("chat"), EventName::Custom("chat".into()));
//! ```

use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::ack::ReplyHandle;
use crate::protocol::Data;

/// Boxed future used by handlers and middleware.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Names reserved for lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedEvent {
    Connect,
    ConnectError,
    ConnectTimeout,
    Connecting,
    Disconnect,
    Error,
    Reconnect,
    ReconnectAttempt,
    ReconnectFailed,
    ReconnectError,
    Reconnecting,
    Ping,
    Pong,
    ExecuteError,
}

impl ReservedEvent {
    /// Every reserved name.
    pub const ALL: [ReservedEvent; 14] = [
        ReservedEvent::Connect,
        ReservedEvent::ConnectError,
        ReservedEvent::ConnectTimeout,
        ReservedEvent::Connecting,
        ReservedEvent::Disconnect,
        ReservedEvent::Error,
        ReservedEvent::Reconnect,
        ReservedEvent::ReconnectAttempt,
        ReservedEvent::ReconnectFailed,
        ReservedEvent::ReconnectError,
        ReservedEvent::Reconnecting,
        ReservedEvent::Ping,
        ReservedEvent::Pong,
        ReservedEvent::ExecuteError,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            ReservedEvent::Connect => "connect",
            ReservedEvent::ConnectError => "connect_error",
            ReservedEvent::ConnectTimeout => "connect_timeout",
            ReservedEvent::Connecting => "connecting",
            ReservedEvent::Disconnect => "disconnect",
            ReservedEvent::Error => "error",
            ReservedEvent::Reconnect => "reconnect",
            ReservedEvent::ReconnectAttempt => "reconnect_attempt",
            ReservedEvent::ReconnectFailed => "reconnect_failed",
            ReservedEvent::ReconnectError => "reconnect_error",
            ReservedEvent::Reconnecting => "reconnecting",
            ReservedEvent::Ping => "ping",
            ReservedEvent::Pong => "pong",
            ReservedEvent::ExecuteError => "execute_error",
        }
    }

    /// Look up a reserved name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name)
    }
}

/// An event name classified at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventName {
    Reserved(ReservedEvent),
    Custom(String),
}

impl EventName {
    /// Classify a name.
    pub fn parse(name: &str) -> Self {
        match ReservedEvent::from_name(name) {
            Some(r) => EventName::Reserved(r),
            None => EventName::Custom(name.to_string()),
        }
    }
}

/// Lifecycle notifications raised locally by the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// `open()` was called and the socket is waiting for the namespace.
    Connecting,
    /// The namespace acknowledged the connection.
    Connect,
    /// The socket lost its namespace connection.
    Disconnect(String),
    /// The peer sent an ERROR packet.
    Error(Vec<Data>),
    /// A middleware pipeline failed; never sent to the peer.
    ExecuteError { status: u16, message: String },
}

impl Notification {
    /// The reserved name this notification corresponds to.
    pub fn kind(&self) -> ReservedEvent {
        match self {
            Notification::Connecting => ReservedEvent::Connecting,
            Notification::Connect => ReservedEvent::Connect,
            Notification::Disconnect(_) => ReservedEvent::Disconnect,
            Notification::Error(_) => ReservedEvent::Error,
            Notification::ExecuteError { .. } => ReservedEvent::ExecuteError,
        }
    }
}

/// An application event as delivered to listeners.
#[derive(Debug, Clone)]
pub struct Event {
    /// Positional arguments, the event name first.
    pub args: Vec<Data>,
    /// Reply handle when the peer expects an ack.
    pub reply: Option<ReplyHandle>,
}

impl Event {
    /// Create an event without a reply.
    pub fn new(args: Vec<Data>) -> Self {
        Self { args, reply: None }
    }

    /// Attach a reply handle.
    pub fn with_reply(mut self, reply: ReplyHandle) -> Self {
        self.reply = Some(reply);
        self
    }

    /// Event name, if the first argument is a string.
    pub fn name(&self) -> Option<&str> {
        self.args.first().and_then(Data::as_str)
    }

    /// Arguments after the name.
    pub fn data(&self) -> &[Data] {
        self.args.get(1..).unwrap_or(&[])
    }
}

/// Failure raised by an application listener.
///
/// Reported to the peer as an ERROR packet carrying `{message, stack, data}`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EventError {
    message: String,
    data: Option<Value>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl EventError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            source: None,
        }
    }

    /// Wrap an underlying error.
    pub fn from_error(err: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: err.to_string(),
            data: None,
            source: Some(Box::new(err)),
        }
    }

    /// Attach custom data for the peer.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Custom data, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Message followed by the chain of causes.
    pub fn stack(&self) -> String {
        let mut stack = format!("Error: {}", self.message);
        let mut cause = self.source.as_deref().and_then(|e| e.source());
        while let Some(err) = cause {
            stack.push_str(&format!("\n    caused by: {err}"));
            cause = err.source();
        }
        stack
    }

    /// ERROR packet payload.
    pub fn to_data(&self) -> Data {
        Data::Json(json!({
            "data": self.data,
            "message": self.message,
            "stack": self.stack(),
        }))
    }
}

impl From<&str> for EventError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for EventError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Result type for listeners.
pub type ListenerResult = std::result::Result<(), EventError>;

/// Application event listener.
pub trait Listener: Send + Sync + 'static {
    /// Handle one event.
    fn call(&self, event: Event) -> ListenerResult;
}

impl<F> Listener for F
where
    F: Fn(Event) -> ListenerResult + Send + Sync + 'static,
{
    fn call(&self, event: Event) -> ListenerResult {
        self(event)
    }
}

/// Listener that deserializes the first data argument before calling the handler.
pub struct TypedListener<F, T>
where
    F: Fn(T, Option<ReplyHandle>) -> ListenerResult + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> TypedListener<F, T>
where
    F: Fn(T, Option<ReplyHandle>) -> ListenerResult + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
{
    /// Create a new typed listener.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T> Listener for TypedListener<F, T>
where
    F: Fn(T, Option<ReplyHandle>) -> ListenerResult + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
{
    fn call(&self, event: Event) -> ListenerResult {
        let value = match event.data().first() {
            Some(Data::Json(v)) => v.clone(),
            Some(Data::Binary(_)) => {
                return Err(EventError::new("expected JSON argument, got binary"))
            }
            None => Value::Null,
        };
        let parsed: T = serde_json::from_value(value).map_err(EventError::from_error)?;
        (self.handler)(parsed, event.reply)
    }
}

/// Callback for lifecycle notifications.
pub type NotificationListener = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Listeners by event name plus lifecycle listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    events: HashMap<String, Vec<Arc<dyn Listener>>>,
    notifications: Vec<NotificationListener>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener for an application event.
    pub fn add(&mut self, name: &str, listener: Arc<dyn Listener>) {
        self.events.entry(name.to_string()).or_default().push(listener);
    }

    /// Remove every listener for `name`. Returns how many were removed.
    pub fn remove_all(&mut self, name: &str) -> usize {
        self.events.remove(name).map_or(0, |v| v.len())
    }

    /// Snapshot of listeners for `name`, in registration order.
    pub fn get(&self, name: &str) -> Vec<Arc<dyn Listener>> {
        self.events.get(name).cloned().unwrap_or_default()
    }

    /// Whether anything listens for `name`.
    pub fn has(&self, name: &str) -> bool {
        self.events.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Add a lifecycle listener.
    pub fn add_notification(&mut self, listener: NotificationListener) {
        self.notifications.push(listener);
    }

    /// Snapshot of lifecycle listeners.
    pub fn notification_listeners(&self) -> Vec<NotificationListener> {
        self.notifications.clone()
    }
}

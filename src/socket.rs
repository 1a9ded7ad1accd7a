//! The namespace socket: state machine, dispatcher and public API.
//!
//! A [`NamespaceSocket`] is bound to one namespace on a shared [`Manager`].
//! It subscribes to the manager's notifications on a spawned task, tracks
//! the namespace connection, buffers traffic until the namespace CONNECT
//! arrives, correlates acks and routes inbound events either to plain
//! listeners or through the middleware pipeline.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected --open()--> Connecting --CONNECT--> Connected
//!      ^                                              |
//!      +------ transport close / disconnect() --------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use nsp_socket::{Context, Next, PipelineError, SocketBuilder};
//!
//! let socket = SocketBuilder::new("/chat")
//!     .middleware(|mut ctx: Context, next: Next| async move {
//!         if ctx.path() == "/hello" {
//!             ctx.set_body("world");
//!             return Ok::<_, PipelineError>(ctx);
//!         }
//!         next.run(ctx).await
//!     })
//!     .build(manager)?;
//!
//! socket.emit("join", vec!["lobby".into()])?;
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread::{self, ThreadId};

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};

use crate::ack::{AckCallback, AckRegistry, PacketSink, ReplyHandle};
use crate::connection::{Buffers, ConnectionState};
use crate::error::{Result, SocketError};
use crate::event::{
    Event, EventError, Listener, ListenerRegistry, Notification, NotificationListener,
    ReservedEvent, TypedListener,
};
use crate::handler::{
    parse_reply, parse_request, respond, status, Context, HttpCall, HttpReply, Middleware,
    ParsedEvent, ParsedRequest, PipelineError, PipelineRegistry, ResponseSink,
};
use crate::protocol::{Data, Packet, PacketType, ROOT_NAMESPACE};
use crate::transport::{Manager, ManagerEvent, ReadyState, Subscription};

/// Default for [`SocketConfig::auto_connect`].
pub const DEFAULT_AUTO_CONNECT: bool = true;

/// Default for [`SocketConfig::silent`].
pub const DEFAULT_SILENT: bool = false;

/// Event name used by [`NamespaceSocket::send`].
pub const MESSAGE_EVENT: &str = "message";

/// Query sent with the namespace CONNECT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Sent as-is.
    Raw(String),
    /// Encoded as `k=v&k2=v2`.
    Pairs(Vec<(String, String)>),
}

impl Query {
    /// Build from key/value pairs.
    pub fn pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Query::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Encoded query string.
    pub fn encode(&self) -> String {
        match self {
            Query::Raw(raw) => raw.clone(),
            Query::Pairs(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }
}

impl From<&str> for Query {
    fn from(raw: &str) -> Self {
        Query::Raw(raw.to_string())
    }
}

impl From<String> for Query {
    fn from(raw: String) -> Self {
        Query::Raw(raw)
    }
}

// Same unreserved set as encodeURIComponent.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Settled socket configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// Call `open` as soon as the socket is built.
    pub auto_connect: bool,
    /// Suppress logging of unexpected pipeline errors.
    pub silent: bool,
    /// Query for the CONNECT packet (non-root namespaces only).
    pub query: Option<Query>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            auto_connect: DEFAULT_AUTO_CONNECT,
            silent: DEFAULT_SILENT,
            query: None,
        }
    }
}

/// Builder for a [`NamespaceSocket`].
pub struct SocketBuilder {
    nsp: String,
    config: SocketConfig,
    pipeline: PipelineRegistry,
    listeners: Vec<(String, Arc<dyn Listener>)>,
    notifications: Vec<NotificationListener>,
}

impl SocketBuilder {
    /// Start building a socket for `nsp`. A missing leading `/` is added.
    pub fn new(nsp: &str) -> Self {
        let nsp = if nsp.starts_with('/') {
            nsp.to_string()
        } else {
            format!("/{nsp}")
        };
        Self {
            nsp,
            config: SocketConfig::default(),
            pipeline: PipelineRegistry::new(),
            listeners: Vec::new(),
            notifications: Vec::new(),
        }
    }

    /// Query sent with the CONNECT packet.
    pub fn query(mut self, query: impl Into<Query>) -> Self {
        self.config.query = Some(query.into());
        self
    }

    /// Whether `build` opens the socket.
    ///
    /// Default: true
    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.config.auto_connect = auto_connect;
        self
    }

    /// Whether unexpected pipeline errors are logged.
    ///
    /// Default: false
    pub fn silent(mut self, silent: bool) -> Self {
        self.config.silent = silent;
        self
    }

    /// Append a middleware.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.pipeline.push(middleware);
        self
    }

    /// Register a context extension.
    pub fn extend<F>(mut self, decorate: F) -> Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.pipeline.extend(decorate);
        self
    }

    /// Register an application event listener.
    pub fn on<L: Listener>(mut self, event: &str, listener: L) -> Self {
        self.listeners.push((event.to_string(), Arc::new(listener)));
        self
    }

    /// Register a lifecycle listener.
    pub fn on_notification<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.notifications.push(Arc::new(listener));
        self
    }

    /// The configuration so far.
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Build the socket on `manager`, opening it when `auto_connect` is set.
    ///
    /// Opening spawns the subscription task, so this must run inside a
    /// tokio runtime when `auto_connect` is on.
    pub fn build(self, manager: Arc<dyn Manager>) -> Result<NamespaceSocket> {
        let mut listeners = ListenerRegistry::new();
        for (name, listener) in self.listeners {
            check_name(&name)?;
            listeners.add(&name, listener);
        }
        for listener in self.notifications {
            listeners.add_notification(listener);
        }

        let auto_connect = self.config.auto_connect;
        let socket = NamespaceSocket {
            shared: Arc::new(Shared {
                nsp: self.nsp,
                manager,
                config: self.config,
                inner: Mutex::new(Inner::default()),
                listeners: RwLock::new(listeners),
                pipeline: RwLock::new(self.pipeline),
            }),
        };

        if auto_connect {
            socket.open();
        }
        Ok(socket)
    }
}

impl fmt::Debug for SocketBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketBuilder")
            .field("nsp", &self.nsp)
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn check_name(name: &str) -> Result<()> {
    match ReservedEvent::from_name(name) {
        Some(reserved) => Err(SocketError::ReservedEvent(reserved.as_str().to_string())),
        None => Ok(()),
    }
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    id: Option<String>,
    acks: AckRegistry,
    buffers: Buffers,
    subs: Option<Subscription>,
    compress: Option<bool>,
    app_state: Map<String, Value>,
    /// Thread replaying the buffers after CONNECT.
    flushing: Option<ThreadId>,
}

impl Inner {
    // While the buffers are replayed only the replaying thread sends
    // directly; everyone else queues behind the older buffered packets.
    fn may_send(&self) -> bool {
        self.state.is_connected()
            && self
                .flushing
                .map_or(true, |owner| owner == thread::current().id())
    }
}

struct Shared {
    nsp: String,
    manager: Arc<dyn Manager>,
    config: SocketConfig,
    inner: Mutex<Inner>,
    listeners: RwLock<ListenerRegistry>,
    pipeline: RwLock<PipelineRegistry>,
}

impl Shared {
    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn packet(&self, packet: Packet) {
        self.manager.packet(packet.with_nsp(self.nsp.as_str()));
    }

    /// Send now if allowed, otherwise append to the send buffer.
    fn send_or_buffer(&self, packet: Packet) {
        {
            let mut inner = self.inner();
            if !inner.may_send() {
                inner.buffers.push_send(packet);
                return;
            }
        }
        self.packet(packet);
    }
}

impl PacketSink for Shared {
    fn send_packet(&self, packet: Packet) {
        self.send_or_buffer(packet);
    }
}

/// Client handle for one namespace. Cheap to clone.
#[derive(Clone)]
pub struct NamespaceSocket {
    shared: Arc<Shared>,
}

impl NamespaceSocket {
    /// Start building a socket.
    pub fn builder(nsp: &str) -> SocketBuilder {
        SocketBuilder::new(nsp)
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner()
    }

    fn listeners(&self) -> RwLockReadGuard<'_, ListenerRegistry> {
        self.shared
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn listeners_mut(&self) -> RwLockWriteGuard<'_, ListenerRegistry> {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn pipeline(&self) -> RwLockReadGuard<'_, PipelineRegistry> {
        self.shared
            .pipeline
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn pipeline_mut(&self) -> RwLockWriteGuard<'_, PipelineRegistry> {
        self.shared
            .pipeline
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn sink(&self) -> Weak<dyn PacketSink> {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        weak
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Subscribe to the manager and ask it to open. No-op when connected.
    ///
    /// Must run inside a tokio runtime.
    pub fn open(&self) -> &Self {
        if self.is_connected() {
            return self;
        }

        self.sub_events();
        {
            let mut inner = self.inner();
            if inner.state == ConnectionState::Disconnected {
                inner.state = ConnectionState::Connecting;
            }
        }
        self.notify(Notification::Connecting);

        self.shared.manager.open();
        if self.shared.manager.ready_state() == ReadyState::Open {
            if self.shared.nsp == ROOT_NAMESPACE {
                // The root namespace is joined with an already open transport.
                self.on_connect();
            } else {
                self.on_open();
            }
        }
        self
    }

    /// Alias for [`open`](Self::open).
    pub fn connect(&self) -> &Self {
        self.open()
    }

    fn sub_events(&self) {
        let mut inner = self.inner();
        if inner.subs.is_some() {
            return;
        }

        let rx = self.shared.manager.subscribe();
        let weak = Arc::downgrade(&self.shared);
        let task = tokio::spawn(pump(rx, weak));
        inner.subs = Some(Subscription::new(task));
    }

    fn handle_manager_event(&self, event: ManagerEvent) {
        match event {
            ManagerEvent::Open => self.on_open(),
            ManagerEvent::Packet(packet) => self.on_packet(packet),
            ManagerEvent::Close(reason) => self.on_close(&reason),
        }
    }

    fn on_open(&self) {
        tracing::debug!("transport is open - connecting");

        {
            let mut inner = self.inner();
            if inner.state == ConnectionState::Disconnected {
                inner.state = ConnectionState::Connecting;
            }
        }

        if self.shared.nsp == ROOT_NAMESPACE {
            // the server announces the root namespace with its own CONNECT
            return;
        }

        let query = self
            .shared
            .config
            .query
            .as_ref()
            .map(Query::encode)
            .filter(|q| !q.is_empty());
        if let Some(q) = &query {
            tracing::debug!("sending connect packet with query {}", q);
        }
        self.shared.packet(Packet::connect(query));
    }

    fn on_close(&self, reason: &str) {
        tracing::debug!("close ({})", reason);
        {
            let mut inner = self.inner();
            inner.state = ConnectionState::Disconnected;
            inner.id = None;
            inner.flushing = None;
        }
        self.notify(Notification::Disconnect(reason.to_string()));
    }

    fn on_packet(&self, packet: Packet) {
        if packet.nsp != self.shared.nsp {
            return;
        }

        match packet.packet_type {
            PacketType::Connect => self.on_connect(),
            PacketType::Event | PacketType::BinaryEvent => self.on_event(packet),
            PacketType::Ack | PacketType::BinaryAck => self.on_ack(packet),
            PacketType::Disconnect => self.on_disconnect(),
            PacketType::Error => self.notify(Notification::Error(packet.data)),
        }
    }

    fn on_event(&self, packet: Packet) {
        let mut event = Event::new(packet.data);
        if let Some(id) = packet.id {
            tracing::debug!("attaching ack callback to event");
            event = event.with_reply(ReplyHandle::new(id, self.sink()));
        }

        {
            let mut inner = self.inner();
            if !inner.state.is_connected() {
                inner.buffers.push_receive(event);
                return;
            }
        }
        self.dispatch(event);
    }

    fn on_ack(&self, packet: Packet) {
        let Some(id) = packet.id else {
            tracing::warn!("ack packet without id");
            return;
        };

        let callback = self.inner().acks.take(id);
        match callback {
            Some(callback) => {
                tracing::debug!("calling ack {}", id);
                callback(packet.data);
            }
            None => tracing::warn!("bad ack {}", id),
        }
    }

    fn on_connect(&self) {
        let received = {
            let mut inner = self.inner();
            if inner.state.is_connected() {
                return;
            }
            inner.state = ConnectionState::Connected;
            inner.id = self.shared.manager.engine_id().map(|engine_id| {
                if self.shared.nsp == ROOT_NAMESPACE {
                    engine_id
                } else {
                    format!("{}#{}", self.shared.nsp, engine_id)
                }
            });
            inner.flushing = Some(thread::current().id());
            inner.buffers.take_received()
        };

        self.notify(Notification::Connect);

        for event in received {
            self.dispatch(event);
        }
        self.flush_send_buffer();
    }

    /// Send buffered packets until the buffer stays empty, then reopen
    /// direct sends.
    fn flush_send_buffer(&self) {
        loop {
            let batch = {
                let mut inner = self.inner();
                let batch = if inner.state.is_connected() {
                    inner.buffers.take_sent()
                } else {
                    Vec::new()
                };
                if batch.is_empty() {
                    inner.flushing = None;
                    return;
                }
                batch
            };
            for packet in batch {
                self.shared.packet(packet);
            }
        }
    }

    fn on_disconnect(&self) {
        tracing::debug!("server disconnect ({})", self.shared.nsp);
        self.destroy();
        self.on_close("io server disconnect");
    }

    /// Detach from the manager. Safe to call repeatedly.
    fn destroy(&self) {
        let subs = self.inner().subs.take();
        if let Some(subs) = subs {
            subs.destroy();
        }
        self.shared.manager.destroy(&self.shared.nsp);
    }

    /// Leave the namespace. Sends DISCONNECT first when connected.
    pub fn disconnect(&self) -> &Self {
        let connected = self.is_connected();
        if connected {
            tracing::debug!("performing disconnect ({})", self.shared.nsp);
            self.shared.packet(Packet::disconnect());
        }

        self.destroy();

        if connected {
            self.on_close("io client disconnect");
        } else {
            self.inner().state = ConnectionState::Disconnected;
        }
        self
    }

    /// Alias for [`disconnect`](Self::disconnect).
    pub fn close(&self) -> &Self {
        self.disconnect()
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Emit an application event.
    pub fn emit(&self, event: &str, args: Vec<Data>) -> Result<()> {
        check_name(event)?;
        self.emit_packet(Packet::event(event_args(event, args)));
        Ok(())
    }

    /// Emit an event and register `callback` for the peer's ack.
    ///
    /// Returns the ack id.
    pub fn emit_with_ack<F>(&self, event: &str, args: Vec<Data>, callback: F) -> Result<u64>
    where
        F: FnOnce(Vec<Data>) + Send + 'static,
    {
        check_name(event)?;
        let id = self.register_ack(Box::new(callback));
        self.emit_packet(Packet::event(event_args(event, args)).with_id(id));
        Ok(id)
    }

    /// Emit an event and wait for the peer's ack.
    ///
    /// Acks never expire, so this waits until the peer answers or the
    /// socket is dropped.
    pub async fn emit_ack(&self, event: &str, args: Vec<Data>) -> Result<Vec<Data>> {
        let (tx, rx) = oneshot::channel();
        self.emit_with_ack(event, args, move |reply| {
            let _ = tx.send(reply);
        })?;
        rx.await.map_err(|_| SocketError::ConnectionClosed)
    }

    /// Emit a `message` event.
    pub fn send(&self, args: Vec<Data>) -> Result<()> {
        self.emit(MESSAGE_EVENT, args)
    }

    /// Set the compress flag for the next emitted packet only.
    pub fn compress(&self, compress: bool) -> &Self {
        self.inner().compress = Some(compress);
        self
    }

    fn register_ack(&self, callback: AckCallback) -> u64 {
        let id = self.inner().acks.register(callback);
        tracing::debug!("emitting packet with ack id {}", id);
        id
    }

    fn emit_packet(&self, mut packet: Packet) {
        packet.options.compress = self.inner().compress.take().unwrap_or(true);
        self.shared.send_or_buffer(packet);
    }

    // ------------------------------------------------------------------
    // HTTP sugar
    // ------------------------------------------------------------------

    /// Send an `http<METHOD>` event without waiting for a reply.
    ///
    /// `method` may be any HTTP token, such as `"m-search"`.
    pub fn http(&self, method: &str, call: HttpCall) -> Result<()> {
        self.emit_packet(Packet::event(call.into_args(method)?));
        Ok(())
    }

    /// Send an `http<METHOD>` event; `callback` gets the parsed reply.
    ///
    /// Returns the ack id.
    pub fn http_with_reply<F>(&self, method: &str, call: HttpCall, callback: F) -> Result<u64>
    where
        F: FnOnce(Result<HttpReply>) + Send + 'static,
    {
        let args = call.into_args(method)?;
        let id = self.register_ack(Box::new(move |reply| callback(parse_reply(reply))));
        self.emit_packet(Packet::event(args).with_id(id));
        Ok(id)
    }

    /// Send an `http<METHOD>` event and wait for the parsed reply.
    pub async fn fetch(&self, method: &str, call: HttpCall) -> Result<HttpReply> {
        let (tx, rx) = oneshot::channel();
        self.http_with_reply(method, call, move |reply| {
            let _ = tx.send(reply);
        })?;
        rx.await.map_err(|_| SocketError::ConnectionClosed)?
    }

    /// `httpHEAD`.
    pub async fn head(&self, call: HttpCall) -> Result<HttpReply> {
        self.fetch("HEAD", call).await
    }

    /// `httpOPTIONS`.
    pub async fn options(&self, call: HttpCall) -> Result<HttpReply> {
        self.fetch("OPTIONS", call).await
    }

    /// `httpGET`.
    pub async fn get(&self, call: HttpCall) -> Result<HttpReply> {
        self.fetch("GET", call).await
    }

    /// `httpPUT`.
    pub async fn put(&self, call: HttpCall) -> Result<HttpReply> {
        self.fetch("PUT", call).await
    }

    /// `httpPATCH`.
    pub async fn patch(&self, call: HttpCall) -> Result<HttpReply> {
        self.fetch("PATCH", call).await
    }

    /// `httpPOST`.
    pub async fn post(&self, call: HttpCall) -> Result<HttpReply> {
        self.fetch("POST", call).await
    }

    /// `httpDELETE`.
    pub async fn delete(&self, call: HttpCall) -> Result<HttpReply> {
        self.fetch("DELETE", call).await
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn dispatch(&self, event: Event) {
        tracing::debug!("dispatching an event {:?}", event.name());

        match parse_request(&event.args) {
            ParsedEvent::Request(parsed) => {
                self.handle_request(parsed, ResponseSink::new(event.reply));
            }
            ParsedEvent::NotHttpShaped => self.handle_event(event),
        }
    }

    fn handle_request(&self, parsed: ParsedRequest, sink: ResponseSink) {
        let (chain, decorators) = {
            let pipeline = self.pipeline();
            (pipeline.compose(), pipeline.extensions().to_vec())
        };
        let ctx = Context::new(self.clone(), parsed, sink, &decorators);
        let socket = self.clone();

        tokio::spawn(async move {
            match chain.run(ctx).await {
                Ok(mut ctx) => {
                    if let Err(e) = respond(&mut ctx).await {
                        socket.on_error(PipelineError::from(e));
                    }
                }
                Err(err) => socket.on_error(err),
            }
        });
    }

    fn on_error(&self, err: PipelineError) {
        let err = match err {
            PipelineError::Http(err) => err,
            PipelineError::NonError(value) => panic!("non-error thrown: {value:?}"),
        };

        let quiet = err.status() == status::NOT_FOUND || err.expose() || self.shared.config.silent;
        if !quiet {
            let stack = err
                .stack()
                .lines()
                .map(|line| format!("  {line}"))
                .collect::<Vec<_>>()
                .join("\n");
            tracing::error!("\n{}\n", stack);
        }

        self.notify(Notification::ExecuteError {
            status: err.status(),
            message: err.message().to_string(),
        });
    }

    fn handle_event(&self, event: Event) {
        let Some(name) = event.name().map(str::to_string) else {
            tracing::debug!("dropping event without a name");
            return;
        };

        let listeners = self.listeners().get(&name);
        for listener in listeners {
            if let Err(err) = listener.call(event.clone()) {
                tracing::warn!("listener for {} failed: {}", name, err);
                self.error(&err);
                break;
            }
        }
    }

    /// Report a listener failure to the peer as an ERROR packet.
    pub fn error(&self, err: &EventError) {
        self.shared.packet(Packet::error(vec![err.to_data()]));
    }

    fn notify(&self, notification: Notification) {
        let listeners = self.listeners().notification_listeners();
        for listener in listeners {
            listener(&notification);
        }
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Listen for an application event.
    pub fn on<L: Listener>(&self, event: &str, listener: L) -> Result<&Self> {
        check_name(event)?;
        self.listeners_mut().add(event, Arc::new(listener));
        Ok(self)
    }

    /// Listen for an event whose first argument deserializes to `T`.
    pub fn on_typed<T, F>(&self, event: &str, handler: F) -> Result<&Self>
    where
        F: Fn(T, Option<ReplyHandle>) -> crate::event::ListenerResult + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
    {
        self.on(event, TypedListener::new(handler))
    }

    /// Remove every listener for `event`.
    pub fn off(&self, event: &str) -> usize {
        self.listeners_mut().remove_all(event)
    }

    /// Whether anything listens for `event`.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners().has(event)
    }

    /// Listen for lifecycle notifications.
    pub fn on_notification<F>(&self, listener: F) -> &Self
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.listeners_mut().add_notification(Arc::new(listener));
        self
    }

    /// Append a middleware. Requests already in flight keep their chain.
    pub fn use_middleware<M: Middleware>(&self, middleware: M) -> &Self {
        self.pipeline_mut().push(middleware);
        self
    }

    /// Register a context extension for future requests.
    pub fn extend<F>(&self, decorate: F) -> &Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.pipeline_mut().extend(decorate);
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Namespace this socket is bound to.
    pub fn nsp(&self) -> &str {
        &self.shared.nsp
    }

    /// Socket id, set while connected.
    pub fn id(&self) -> Option<String> {
        self.inner().id.clone()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner().state
    }

    /// Whether the namespace is connected.
    pub fn is_connected(&self) -> bool {
        self.inner().state.is_connected()
    }

    /// The socket id, as a host name.
    pub fn host(&self) -> Option<String> {
        self.id()
    }

    /// Alias for [`host`](Self::host).
    pub fn hostname(&self) -> Option<String> {
        self.id()
    }

    /// Always `"http"`.
    pub fn protocol(&self) -> &'static str {
        "http"
    }

    /// Settled configuration.
    pub fn config(&self) -> &SocketConfig {
        &self.shared.config
    }

    /// Acks still waiting for the peer.
    pub fn pending_acks(&self) -> usize {
        self.inner().acks.len()
    }

    /// Inbound events waiting for CONNECT.
    pub fn receive_buffer_len(&self) -> usize {
        self.inner().buffers.receive_len()
    }

    /// Outbound packets waiting for CONNECT.
    pub fn send_buffer_len(&self) -> usize {
        self.inner().buffers.send_len()
    }

    /// Application state shown by [`to_json`](Self::to_json).
    pub fn app_state(&self) -> Map<String, Value> {
        self.inner().app_state.clone()
    }

    /// Set one application state entry.
    pub fn set_app_state(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner().app_state.insert(key.into(), value.into());
    }

    /// `{id, nsp, state}` view of the socket.
    pub fn to_json(&self) -> Value {
        let inner = self.inner();
        json!({
            "id": inner.id,
            "nsp": self.shared.nsp,
            "state": inner.app_state,
        })
    }
}

impl fmt::Debug for NamespaceSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner();
        f.debug_struct("NamespaceSocket")
            .field("nsp", &self.shared.nsp)
            .field("id", &inner.id)
            .field("state", &inner.state)
            .field("acks", &inner.acks)
            .finish()
    }
}

fn event_args(event: &str, args: Vec<Data>) -> Vec<Data> {
    let mut all = Vec::with_capacity(args.len() + 1);
    all.push(Data::from(event));
    all.extend(args);
    all
}

/// Forward manager notifications until the socket goes away or the task is aborted.
async fn pump(mut rx: mpsc::UnboundedReceiver<ManagerEvent>, socket: Weak<Shared>) {
    while let Some(event) = rx.recv().await {
        let Some(shared) = socket.upgrade() else {
            break;
        };
        NamespaceSocket { shared }.handle_manager_event(event);
    }
}

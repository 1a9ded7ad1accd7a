//! Per-dispatch context passed through the middleware pipeline.
//!
//! A [`Context`] owns the synthetic [`Request`] and [`Response`] for one
//! HTTP-shaped event. It is built when the event is dispatched, handed from
//! middleware to middleware by value, finalized into an ack reply, and then
//! dropped.
//!
//! Extensions registered on the socket run against every freshly built
//! context, so helpers they install are visible to every later request.
//!
//! # Example
//!
//! ```ignore
//! socket.extend(|ctx: &mut Context| {
//!     ctx.response.set_header("x-served-by", "nsp-socket");
//! });
//!
//! socket.use_middleware(|mut ctx: Context, next: Next| async move {
//!     if ctx.path() == "/ping" {
//!         ctx.set_body("pong");
//!         return Ok::<_, PipelineError>(ctx);
//!     }
//!     next.run(ctx).await
//! });
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::accepts::Accepts;
use super::error::HttpError;
use super::request::{ParsedRequest, Request};
use super::response::{Body, Response, ResponseSink};
use super::status;
use crate::error::Result;
use crate::protocol::{Headers, Payload};
use crate::socket::NamespaceSocket;

/// Decorates every freshly built context.
pub type ContextExtension = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Typed values attached to a context by extensions or middleware.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|prev| prev.downcast::<T>().ok().map(|b| *b))
    }

    /// Borrow a value by type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map.get(&TypeId::of::<T>()).and_then(|b| b.downcast_ref())
    }

    /// Mutably borrow a value by type.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|b| b.downcast_mut())
    }

    /// Remove a value by type.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast::<T>().ok().map(|b| *b))
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions").field("len", &self.map.len()).finish()
    }
}

/// Request/response bundle for one HTTP-shaped event.
pub struct Context {
    app: NamespaceSocket,
    /// The synthetic request.
    pub request: Request,
    /// The synthetic response.
    pub response: Response,
    accept: Accepts,
    state: Map<String, Value>,
    extensions: Extensions,
}

impl Context {
    pub(crate) fn new(
        app: NamespaceSocket,
        parsed: ParsedRequest,
        sink: ResponseSink,
        decorators: &[ContextExtension],
    ) -> Self {
        let accept = Accepts::from_headers(&parsed.headers);
        let mut ctx = Self {
            app,
            request: Request::new(parsed),
            response: Response::new(sink),
            accept,
            state: Map::new(),
            extensions: Extensions::new(),
        };
        for decorate in decorators {
            decorate(&mut ctx);
        }
        ctx
    }

    /// The namespace socket the event arrived on.
    pub fn app(&self) -> &NamespaceSocket {
        &self.app
    }

    /// Request method.
    pub fn method(&self) -> &str {
        self.request.method()
    }

    /// Request URL.
    pub fn url(&self) -> &str {
        self.request.url()
    }

    /// URL as received.
    pub fn original_url(&self) -> &str {
        self.request.original_url()
    }

    /// URL path.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// Request headers.
    pub fn headers(&self) -> &Headers {
        self.request.headers()
    }

    /// Request header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.request.header(name)
    }

    /// Request body.
    pub fn request_body(&self) -> &Payload {
        self.request.body()
    }

    /// Negotiated accept state.
    pub fn accept(&self) -> &Accepts {
        &self.accept
    }

    /// Best of `offers` for this request.
    pub fn accepts<'a>(&self, offers: &[&'a str]) -> Option<&'a str> {
        self.accept.type_(offers)
    }

    /// Response status.
    pub fn status(&self) -> u16 {
        self.response.status()
    }

    /// Set the response status.
    pub fn set_status(&mut self, code: u16) {
        self.response.set_status(code);
    }

    /// Response message.
    pub fn message(&self) -> String {
        self.response.message()
    }

    /// Response body.
    pub fn body(&self) -> Option<&Body> {
        self.response.body()
    }

    /// Set the response body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.response.set_body(body);
    }

    /// Set the fallback body.
    pub fn set_slot(&mut self, slot: impl Into<Body>) {
        self.response.set_slot(slot);
    }

    /// Whether the response can still be written.
    pub fn writable(&self) -> bool {
        self.response.writable()
    }

    /// Per-request state shared between middleware.
    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Mutable per-request state.
    pub fn state_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.state
    }

    /// Typed extensions.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable typed extensions.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Build an error to return from middleware.
    pub fn error(&self, code: u16, message: impl Into<String>) -> HttpError {
        HttpError::new(code, message)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("nsp", &self.app.nsp())
            .field("request", &self.request)
            .field("response", &self.response)
            .field("state", &self.state)
            .finish()
    }
}

/// Finish a context whose pipeline settled successfully.
pub(crate) async fn respond(ctx: &mut Context) -> Result<()> {
    if !ctx.response.writable() {
        return Ok(());
    }

    let code = ctx.response.status();

    if status::is_empty(code) {
        ctx.response.take_body();
        return ctx.response.end(None).await;
    }

    if ctx.request.is_head() {
        return ctx.response.end(None).await;
    }

    let mut body = ctx.response.take_body();
    if body.is_none() {
        if let Some(slot) = ctx.response.take_slot() {
            ctx.response.set_status(status::OK);
            body = Some(slot);
        }
    }

    let body = match body {
        Some(body) => body,
        None => Body::Text(ctx.response.message()),
    };
    ctx.response.end(Some(body)).await
}

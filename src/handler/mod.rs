//! HTTP-shaped request handling.
//!
//! Events named `http<METHOD>` are read as requests, wrapped in a
//! [`Context`], run through the composed [`Middleware`] chain and answered
//! through the event's ack. This module holds every piece of that path:
//!
//! - [`parse_request`]: pure parse of event arguments
//! - [`Context`], [`Request`], [`Response`]: the per-dispatch state
//! - [`Middleware`], [`Next`], [`compose`]: onion-style composition
//! - [`ResponseSink`]: serializes the result into reply arguments
//! - [`HttpCall`], [`parse_reply`]: the outbound direction
//!
//! # Example
//!
//! ```ignore
//! use nsp_socket::handler::{Context, Next, PipelineError};
//!
//! socket.use_middleware(|mut ctx: Context, next: Next| async move {
//!     let ctx = next.run(ctx).await?;
//!     tracing::debug!(status = ctx.status(), "handled {}", ctx.url());
//!     Ok::<_, PipelineError>(ctx)
//! });
//! ```

mod accepts;
mod context;
mod error;
mod middleware;
mod registry;
mod reply;
mod request;
mod response;
pub mod status;

pub use accepts::Accepts;
pub use context::{Context, ContextExtension, Extensions};
pub(crate) use context::respond;
pub use error::{HttpError, PipelineError};
pub use middleware::{compose, Composed, Middleware, Next, PipelineResult};
pub use registry::PipelineRegistry;
pub use reply::{event_name, parse_reply, HttpCall, HttpReply, METHODS};
pub use request::{http_method, is_method, parse_request, ParsedEvent, ParsedRequest, Request, HEAD, HTTP_PREFIX};
pub use response::{Body, BodyStream, Response, ResponseSink};

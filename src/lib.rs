//! # nsp-socket
//!
//! Client-side namespace socket with an HTTP-style middleware pipeline.
//!
//! A namespace socket rides on a shared connection manager, joins one
//! namespace, and exchanges events and acks with the peer. Events named
//! `http<METHOD>` are treated as requests: they run through an onion-style
//! middleware chain and the result is written back through the event's ack.
//!
//! ## Architecture
//!
//! - **Socket** ([`NamespaceSocket`]): connection state machine, buffers,
//!   ack correlation and dispatch
//! - **Handler** ([`handler`]): request parsing, [`Context`], middleware
//!   composition and response serialization
//! - **Transport** ([`transport`]): the [`Manager`](transport::Manager)
//!   boundary plus an in-memory manager
//!
//! ## Example
//!
//! ```ignore
//! use nsp_socket::{Context, Next, PipelineError, SocketBuilder};
//! use nsp_socket::transport::MemoryManager;
//!
//! #[tokio::main]
//! async fn main() -> nsp_socket::Result<()> {
//!     let (manager, _sent) = MemoryManager::new();
//!
//!     let socket = SocketBuilder::new("/api")
//!         .middleware(|mut ctx: Context, next: Next| async move {
//!             if ctx.method() == "GET" && ctx.path() == "/time" {
//!                 ctx.set_body("now");
//!                 return Ok::<_, PipelineError>(ctx);
//!             }
//!             next.run(ctx).await
//!         })
//!         .build(manager)?;
//!
//!     socket.emit("hello", vec!["world".into()])?;
//!     Ok(())
//! }
//! ```

pub mod ack;
pub mod codec;
pub mod connection;
pub mod error;
pub mod event;
pub mod handler;
pub mod protocol;
pub mod socket;
pub mod transport;

pub use error::{Result, SocketError};
pub use event::{Event, EventError, Notification};
pub use handler::{Context, HttpCall, HttpError, HttpReply, Next, PipelineError};
pub use socket::{NamespaceSocket, Query, SocketBuilder, SocketConfig};

//! Protocol module - packet model shared with the transport and codec.
//!
//! This module defines the wire-level message shape:
//! - [`PacketType`] tags (CONNECT, EVENT, ACK, ...)
//! - [`Packet`] with namespace, optional ack id and positional data
//! - [`Data`] values (JSON or binary) and the [`Payload`] zero/one/many view

mod data;
mod packet;

pub use data::{has_binary, Data, Headers, Payload};
pub use packet::{Packet, PacketOptions, PacketType, ROOT_NAMESPACE};

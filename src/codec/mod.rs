//! Codec module - packet encoding at the transport boundary.
//!
//! The namespace socket itself only branches on [`PacketType`](crate::protocol::PacketType)
//! tags; turning packets into wire text is the transport's business. This
//! module provides the text form for non-binary packets so a transport can
//! be assembled from this crate alone:
//!
//! - [`TextCodec`] - `<type>[<nsp>[?query],][<id>][<json>]`
//!
//! Binary packet types need attachment framing and are rejected.
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects.
//!
//! # Example
//!
//! ```
//! use nsp_socket::codec::TextCodec;
//! use nsp_socket::protocol::{Data, Packet};
//!
//! let packet = Packet::event(vec![Data::from("hello")]).with_nsp("/chat").with_id(4);
//! let text = TextCodec::encode(&packet).unwrap();
//! assert_eq!(text, r#"2/chat,4["hello"]"#);
//! assert_eq!(TextCodec::decode(&text).unwrap(), packet);
//! ```

mod text;

pub use text::TextCodec;

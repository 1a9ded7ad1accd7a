//! Packet struct and type tags.
//!
//! Packets are ephemeral: built for one send or consumed within one
//! dispatch cycle. `id` is only present on events expecting a reply and on
//! the replies themselves.
//!
//! # Example
//!
//! ```
//! use nsp_socket::protocol::{Data, Packet, PacketType};
//!
//! let packet = Packet::event(vec![Data::from("hello")]).with_id(7).with_nsp("/chat");
//! assert_eq!(packet.packet_type, PacketType::Event);
//! assert_eq!(packet.id, Some(7));
//! ```

use super::data::{has_binary, Data};

/// The default namespace shared with the transport.
pub const ROOT_NAMESPACE: &str = "/";

/// Packet type tags, numbered as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 0,
    Disconnect = 1,
    Event = 2,
    Ack = 3,
    Error = 4,
    BinaryEvent = 5,
    BinaryAck = 6,
}

impl PacketType {
    /// Parse a wire tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => PacketType::Connect,
            1 => PacketType::Disconnect,
            2 => PacketType::Event,
            3 => PacketType::Ack,
            4 => PacketType::Error,
            5 => PacketType::BinaryEvent,
            6 => PacketType::BinaryAck,
            _ => return None,
        })
    }

    /// Wire tag.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// EVENT or BINARY_EVENT.
    #[inline]
    pub fn is_event(self) -> bool {
        matches!(self, PacketType::Event | PacketType::BinaryEvent)
    }

    /// ACK or BINARY_ACK.
    #[inline]
    pub fn is_ack(self) -> bool {
        matches!(self, PacketType::Ack | PacketType::BinaryAck)
    }

    /// Whether the packet carries binary attachments.
    #[inline]
    pub fn is_binary(self) -> bool {
        matches!(self, PacketType::BinaryEvent | PacketType::BinaryAck)
    }
}

/// Per-packet send options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketOptions {
    /// Ask the transport to compress this packet.
    pub compress: bool,
}

impl Default for PacketOptions {
    fn default() -> Self {
        Self { compress: true }
    }
}

/// A single wire-level message.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Type tag.
    pub packet_type: PacketType,
    /// Namespace this packet is addressed to.
    pub nsp: String,
    /// Ack id (request expecting a reply, or the reply itself).
    pub id: Option<u64>,
    /// Positional data.
    pub data: Vec<Data>,
    /// Encoded query string (CONNECT only).
    pub query: Option<String>,
    /// Send options.
    pub options: PacketOptions,
}

impl Packet {
    /// Create a packet of the given type with no namespace yet.
    pub fn new(packet_type: PacketType, data: Vec<Data>) -> Self {
        Self {
            packet_type,
            nsp: String::new(),
            id: None,
            data,
            query: None,
            options: PacketOptions::default(),
        }
    }

    /// CONNECT, optionally carrying an encoded query string.
    pub fn connect(query: Option<String>) -> Self {
        let mut packet = Self::new(PacketType::Connect, Vec::new());
        packet.query = query;
        packet
    }

    /// DISCONNECT.
    pub fn disconnect() -> Self {
        Self::new(PacketType::Disconnect, Vec::new())
    }

    /// EVENT, or BINARY_EVENT when any argument is binary.
    pub fn event(data: Vec<Data>) -> Self {
        let packet_type = if has_binary(&data) {
            PacketType::BinaryEvent
        } else {
            PacketType::Event
        };
        Self::new(packet_type, data)
    }

    /// ACK, or BINARY_ACK when any argument is binary.
    pub fn ack(id: u64, data: Vec<Data>) -> Self {
        let packet_type = if has_binary(&data) {
            PacketType::BinaryAck
        } else {
            PacketType::Ack
        };
        Self::new(packet_type, data).with_id(id)
    }

    /// ERROR.
    pub fn error(data: Vec<Data>) -> Self {
        Self::new(PacketType::Error, data)
    }

    /// Set the namespace.
    pub fn with_nsp(mut self, nsp: impl Into<String>) -> Self {
        self.nsp = nsp.into();
        self
    }

    /// Set the ack id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Event name (first argument) if this is an event with a string name.
    pub fn event_name(&self) -> Option<&str> {
        if !self.packet_type.is_event() {
            return None;
        }
        self.data.first().and_then(Data::as_str)
    }
}

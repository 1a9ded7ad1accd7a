//! Connection state and the two FIFO buffers drained on connect.
//!
//! While the namespace is not connected:
//! - outbound packets queue in the send buffer
//! - inbound events queue in the receive buffer
//!
//! On connect the receive buffer is replayed first, then the send buffer is
//! flushed, each in arrival order and each exactly once.

use std::collections::VecDeque;

use crate::event::Event;
use crate::protocol::Packet;

/// Namespace connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not subscribed, or the transport closed.
    #[default]
    Disconnected,
    /// Subscribed to the transport, waiting for the namespace CONNECT.
    Connecting,
    /// CONNECT received for this namespace.
    Connected,
}

impl ConnectionState {
    /// Whether the namespace is connected.
    #[inline]
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Everything waiting for the connected transition.
#[derive(Debug, Default)]
pub struct Buffers {
    receive: VecDeque<Event>,
    send: VecDeque<Packet>,
}

impl Buffers {
    /// Create empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound event.
    pub fn push_receive(&mut self, event: Event) {
        self.receive.push_back(event);
    }

    /// Queue an outbound packet.
    pub fn push_send(&mut self, packet: Packet) {
        self.send.push_back(packet);
    }

    /// Take every queued inbound event, arrival order.
    pub fn take_received(&mut self) -> Vec<Event> {
        self.receive.drain(..).collect()
    }

    /// Take every queued outbound packet, emit order.
    pub fn take_sent(&mut self) -> Vec<Packet> {
        self.send.drain(..).collect()
    }

    /// Queued inbound events.
    #[inline]
    pub fn receive_len(&self) -> usize {
        self.receive.len()
    }

    /// Queued outbound packets.
    #[inline]
    pub fn send_len(&self) -> usize {
        self.send.len()
    }
}

//! Acknowledgement correlation in both directions.
//!
//! - [`AckRegistry`]: callbacks waiting for the remote peer to answer one of
//!   our events. Ids come from a counter that only ever grows, so an id is
//!   never reused for the lifetime of the socket (reconnects included).
//!   Entries the peer never answers stay registered.
//! - [`ReplyHandle`]: the single-use reply attached to an inbound event that
//!   carried an id. Only the first `send` produces an ACK packet.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::protocol::{Data, Packet};

/// Callback invoked with the peer's ack arguments.
pub type AckCallback = Box<dyn FnOnce(Vec<Data>) + Send + 'static>;

/// Something that can route an outbound packet (the owning socket).
pub trait PacketSink: Send + Sync + 'static {
    /// Send now or buffer, depending on connection state.
    fn send_packet(&self, packet: Packet);
}

/// Pending outbound acks, keyed by id.
#[derive(Default)]
pub struct AckRegistry {
    next_id: u64,
    pending: HashMap<u64, AckCallback>,
}

impl AckRegistry {
    /// Create an empty registry starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a callback under the current id and advance the counter.
    pub fn register(&mut self, callback: AckCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, callback);
        id
    }

    /// Remove and return the callback for `id`, if still pending.
    pub fn take(&mut self, id: u64) -> Option<AckCallback> {
        self.pending.remove(&id)
    }

    /// The id the next registration will get.
    #[inline]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Number of unanswered acks.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no ack is pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl fmt::Debug for AckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckRegistry")
            .field("next_id", &self.next_id)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Single-use reply for an inbound event.
///
/// Clones share the guard: whichever clone sends first wins, every later
/// `send` is a no-op.
#[derive(Clone)]
pub struct ReplyHandle {
    id: u64,
    sent: Arc<AtomicBool>,
    sink: Weak<dyn PacketSink>,
}

impl ReplyHandle {
    pub(crate) fn new(id: u64, sink: Weak<dyn PacketSink>) -> Self {
        Self {
            id,
            sent: Arc::new(AtomicBool::new(false)),
            sink,
        }
    }

    /// Ack id of the event being answered.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether a reply already went out.
    #[inline]
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }

    /// Send the ACK packet. Returns `false` if a reply was already sent.
    pub fn send(&self, args: Vec<Data>) -> bool {
        if self.sent.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!("sending ack {} with {} args", self.id, args.len());
        match self.sink.upgrade() {
            Some(sink) => sink.send_packet(Packet::ack(self.id, args)),
            None => tracing::warn!("socket dropped before ack {} could be sent", self.id),
        }
        true
    }
}

impl fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyHandle")
            .field("id", &self.id)
            .field("sent", &self.is_sent())
            .finish()
    }
}

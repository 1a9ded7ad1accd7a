//! In-memory manager.
//!
//! Sent packets are pushed onto an unbounded channel returned at
//! construction; the test (or demo) plays the remote side by calling
//! [`MemoryManager::transport_open`], [`MemoryManager::receive`] and
//! [`MemoryManager::transport_close`].
//!
//! # Example
//!
//! ```
//! use nsp_socket::transport::{Manager, MemoryManager, ReadyState};
//!
//! let (manager, _sent) = MemoryManager::new();
//! assert_eq!(manager.ready_state(), ReadyState::Closed);
//! manager.open();
//! assert_eq!(manager.ready_state(), ReadyState::Opening);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::{Manager, ManagerEvent, ReadyState};
use crate::protocol::Packet;

/// Default engine id reported once open.
pub const DEFAULT_ENGINE_ID: &str = "mem-0";

struct MemoryInner {
    ready_state: ReadyState,
    subscribers: Vec<mpsc::UnboundedSender<ManagerEvent>>,
    destroyed: Vec<String>,
    open_calls: usize,
}

/// Manager backed by in-process channels.
pub struct MemoryManager {
    inner: Mutex<MemoryInner>,
    sent: mpsc::UnboundedSender<Packet>,
    engine_id: String,
}

impl MemoryManager {
    /// Create a manager and the receiver of everything it is asked to send.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Packet>) {
        Self::with_engine_id(DEFAULT_ENGINE_ID)
    }

    /// Create a manager reporting the given engine id.
    pub fn with_engine_id(
        engine_id: impl Into<String>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            inner: Mutex::new(MemoryInner {
                ready_state: ReadyState::Closed,
                subscribers: Vec::new(),
                destroyed: Vec::new(),
                open_calls: 0,
            }),
            sent: tx,
            engine_id: engine_id.into(),
        };
        (Arc::new(manager), rx)
    }

    fn inner(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(&self, event: ManagerEvent) {
        self.inner()
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Mark the transport open and notify subscribers.
    pub fn transport_open(&self) {
        self.inner().ready_state = ReadyState::Open;
        self.deliver(ManagerEvent::Open);
    }

    /// Mark the transport closed and notify subscribers.
    pub fn transport_close(&self, reason: &str) {
        self.inner().ready_state = ReadyState::Closed;
        self.deliver(ManagerEvent::Close(reason.to_string()));
    }

    /// Deliver an inbound packet to subscribers.
    pub fn receive(&self, packet: Packet) {
        self.deliver(ManagerEvent::Packet(packet));
    }

    /// Namespaces that detached via `destroy`, in order.
    pub fn destroyed(&self) -> Vec<String> {
        self.inner().destroyed.clone()
    }

    /// Number of live subscriptions (closed receivers are pruned on delivery).
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    /// How many times `open` was called.
    pub fn open_calls(&self) -> usize {
        self.inner().open_calls
    }
}

impl Manager for MemoryManager {
    fn open(&self) {
        let mut inner = self.inner();
        inner.open_calls += 1;
        if inner.ready_state == ReadyState::Closed {
            inner.ready_state = ReadyState::Opening;
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.inner().ready_state
    }

    fn packet(&self, packet: Packet) {
        if self.sent.send(packet).is_err() {
            tracing::debug!("memory manager: sent-packet receiver dropped");
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ManagerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner().subscribers.push(tx);
        rx
    }

    fn destroy(&self, nsp: &str) {
        self.inner().destroyed.push(nsp.to_string());
    }

    fn engine_id(&self) -> Option<String> {
        match self.inner().ready_state {
            ReadyState::Open => Some(self.engine_id.clone()),
            _ => None,
        }
    }
}

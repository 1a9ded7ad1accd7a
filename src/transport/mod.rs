//! Transport boundary - the connection manager this socket rides on.
//!
//! The manager owns the real connection (network I/O, reconnection,
//! heartbeat). A namespace socket only needs to:
//! - ask it to open
//! - hand it packets to send
//! - listen for `open`, `packet` and `close` notifications
//! - detach from it on teardown
//!
//! [`MemoryManager`] is an in-process implementation used by tests and demos.

mod memory;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::Packet;

pub use memory::MemoryManager;

/// Transport-level readiness as reported by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Closed,
    Opening,
    Open,
}

/// Notifications a manager delivers to subscribed sockets.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    /// The shared transport opened.
    Open,
    /// A decoded packet arrived (for any namespace).
    Packet(Packet),
    /// The shared transport closed.
    Close(String),
}

/// Connection manager shared by every namespace socket on one transport.
pub trait Manager: Send + Sync + 'static {
    /// Ensure the underlying connection is opening or open. Idempotent.
    fn open(&self);

    /// Current transport readiness.
    fn ready_state(&self) -> ReadyState;

    /// Send a packet (the namespace is already stamped).
    fn packet(&self, packet: Packet);

    /// Subscribe to `open` / `packet` / `close` notifications.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ManagerEvent>;

    /// Stop tracking the socket bound to `nsp`.
    fn destroy(&self, nsp: &str);

    /// Engine-level session id, once the transport has opened.
    fn engine_id(&self) -> Option<String>;
}

/// One subscription epoch: the task pumping manager notifications into a socket.
///
/// Dropping the subscription does not stop the pump; call [`Subscription::destroy`].
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Stop receiving notifications.
    pub fn destroy(self) {
        self.task.abort();
    }
}

use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::TransportError;

use super::{trim_line, ReadyState, Transport, TransportEvent, TransportParts};

#[derive(Debug)]
struct Shared {
    state: ReadyState,
    written: Vec<String>,
    fail_writes: bool,
}

/// In-process transport whose far end is driven by a [`MemoryPeer`].
///
/// Useful for tests and for embedding the connection behind a transport
/// the crate does not know about.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use tmi_chat::transport::{MemoryTransport, ReadyState, TransportEvent};
///
/// let (mut parts, mut peer) = MemoryTransport::pair();
/// peer.open();
/// assert_eq!(parts.events.recv().await, Some(TransportEvent::Open));
/// parts.handle.send("PING".to_string()).await.unwrap();
/// assert_eq!(peer.next_written().await.as_deref(), Some("PING"));
/// assert_eq!(parts.handle.ready_state(), ReadyState::Open);
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    written: mpsc::UnboundedSender<String>,
}

/// The relay side of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryPeer {
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    written: mpsc::UnboundedReceiver<String>,
}

impl MemoryTransport {
    /// A connecting transport and the peer that controls it.
    pub fn pair() -> (TransportParts, MemoryPeer) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (written_tx, written_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared {
            state: ReadyState::Connecting,
            written: Vec::new(),
            fail_writes: false,
        }));

        let transport = MemoryTransport {
            shared: Arc::clone(&shared),
            events: event_tx.clone(),
            written: written_tx,
        };
        let peer = MemoryPeer {
            shared,
            events: event_tx,
            written: written_rx,
        };
        let parts = TransportParts {
            handle: Arc::new(transport),
            events,
        };
        (parts, peer)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, line: String) -> BoxFuture<'static, Result<(), TransportError>> {
        let result = {
            let mut shared = self.shared.lock();
            if shared.state != ReadyState::Open {
                Err(TransportError::Closed)
            } else if shared.fail_writes {
                Err(TransportError::Send("write refused".to_string()))
            } else {
                let line = trim_line(&line).to_string();
                shared.written.push(line.clone());
                let _ = self.written.send(line);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn close(&self) {
        let mut shared = self.shared.lock();
        if shared.state == ReadyState::Closed {
            return;
        }
        shared.state = ReadyState::Closed;
        let _ = self.events.send(TransportEvent::Close);
    }

    fn ready_state(&self) -> ReadyState {
        self.shared.lock().state
    }
}

impl MemoryPeer {
    /// Accept the connection.
    pub fn open(&self) {
        self.shared.lock().state = ReadyState::Open;
        let _ = self.events.send(TransportEvent::Open);
    }

    /// Deliver one inbound payload.
    pub fn deliver(&self, payload: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Message(payload.into()));
    }

    /// Report a transport error without closing.
    pub fn fail(&self, error: TransportError) {
        let _ = self.events.send(TransportEvent::Error(error));
    }

    /// Close from the relay side. Idempotent.
    pub fn hang_up(&self) {
        let mut shared = self.shared.lock();
        if shared.state == ReadyState::Closed {
            return;
        }
        shared.state = ReadyState::Closed;
        let _ = self.events.send(TransportEvent::Close);
    }

    /// Make every following write fail with [`TransportError::Send`].
    pub fn refuse_writes(&self, refuse: bool) {
        self.shared.lock().fail_writes = refuse;
    }

    /// Every line written so far.
    pub fn written(&self) -> Vec<String> {
        self.shared.lock().written.clone()
    }

    /// Wait for the next written line. `None` once the transport is gone.
    pub async fn next_written(&mut self) -> Option<String> {
        self.written.recv().await
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.lock().state
    }
}

//! Duplex text transport to the chat relay.
//!
//! A transport is split in two halves: a [`Transport`] handle used to write
//! lines and close the stream, and an event receiver carrying what the
//! stream reports back (open, inbound payloads, errors, close). The
//! connection owns both halves; tests swap in [`MemoryTransport`].

use std::fmt;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::error::TransportError;

mod memory;
mod websocket;

pub use self::memory::{MemoryPeer, MemoryTransport};
pub use self::websocket::WebSocketTransport;

/// Transport lifecycle as seen by the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Something the transport reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The stream is writable.
    Open,
    /// One inbound payload; may hold several CRLF-separated lines.
    Message(String),
    /// A non-fatal failure. A fatal one is followed by [`Close`](Self::Close).
    Error(TransportError),
    /// The stream has closed. Reported exactly once.
    Close,
}

/// Write half of a transport.
pub trait Transport: Send + Sync + 'static {
    /// Write one line. Resolves once the line has been handed to the stream.
    fn send(&self, line: String) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Begin closing. Idempotent; completion is reported as
    /// [`TransportEvent::Close`].
    fn close(&self);

    fn ready_state(&self) -> ReadyState;
}

/// Handle plus the event stream it reports on.
pub struct TransportParts {
    pub handle: std::sync::Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl fmt::Debug for TransportParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportParts")
            .field("ready_state", &self.handle.ready_state())
            .finish_non_exhaustive()
    }
}

/// Strip a trailing line terminator; framing is per WebSocket message.
pub(crate) fn trim_line(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

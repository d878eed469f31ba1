use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, trace, warn};

use crate::error::TransportError;

use super::{trim_line, ReadyState, Transport, TransportEvent, TransportParts};

enum Outbound {
    Line(String, oneshot::Sender<Result<(), TransportError>>),
    Close,
}

/// WebSocket client transport.
///
/// The socket is driven by a spawned task; the handle only talks to it
/// over a channel, so it is cheap to share.
pub struct WebSocketTransport {
    state: Arc<Mutex<ReadyState>>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl WebSocketTransport {
    /// Start connecting to `url`. Must be called inside a Tokio runtime.
    ///
    /// A connect failure or timeout is reported as an
    /// [`Error`](TransportEvent::Error) followed by
    /// [`Close`](TransportEvent::Close).
    pub fn connect(url: impl Into<String>, connect_timeout: Duration) -> TransportParts {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ReadyState::Connecting));

        tokio::spawn(run(
            url.into(),
            connect_timeout,
            Arc::clone(&state),
            event_tx,
            outbound_rx,
        ));

        TransportParts {
            handle: Arc::new(Self { state, outbound }),
            events,
        }
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, line: String) -> BoxFuture<'static, Result<(), TransportError>> {
        let (done, result) = oneshot::channel();
        let queued = if *self.state.lock() == ReadyState::Open {
            self.outbound
                .send(Outbound::Line(line, done))
                .map_err(|_| TransportError::Closed)
        } else {
            Err(TransportError::Closed)
        };
        Box::pin(async move {
            queued?;
            result.await.map_err(|_| TransportError::Closed)?
        })
    }

    fn close(&self) {
        let mut state = self.state.lock();
        if matches!(*state, ReadyState::Closing | ReadyState::Closed) {
            return;
        }
        *state = ReadyState::Closing;
        let _ = self.outbound.send(Outbound::Close);
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }
}

async fn run(
    url: String,
    connect_timeout: Duration,
    state: Arc<Mutex<ReadyState>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    debug!(url = %url, "connecting");
    let connected = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str()));
    let stream = match connected.await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            finish(&state, &events, Some(TransportError::Connect(e.to_string())));
            return;
        }
        Err(_) => {
            let reason = format!("timed out after {:?}", connect_timeout);
            finish(&state, &events, Some(TransportError::Connect(reason)));
            return;
        }
    };

    if *state.lock() == ReadyState::Closing {
        // close() raced the handshake
        let (mut sink, _) = stream.split();
        let _ = sink.close().await;
        finish(&state, &events, None);
        return;
    }
    *state.lock() = ReadyState::Open;
    debug!("connected");
    let _ = events.send(TransportEvent::Open);

    let (mut sink, mut stream) = stream.split();
    loop {
        tokio::select! {
            request = outbound.recv() => match request {
                Some(Outbound::Line(line, done)) => {
                    let line = trim_line(&line).to_string();
                    trace!(line = %line, "write");
                    let result = sink
                        .send(WsMessage::Text(line))
                        .await
                        .map_err(|e| TransportError::Send(e.to_string()));
                    let _ = done.send(result);
                }
                Some(Outbound::Close) | None => {
                    *state.lock() = ReadyState::Closing;
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "close handshake failed");
                    }
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text));
                }
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        let _ = events.send(TransportEvent::Message(text));
                    }
                    Err(_) => {
                        let error = TransportError::Protocol("non-UTF-8 binary frame".to_string());
                        let _ = events.send(TransportEvent::Error(error));
                    }
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "relay closed the stream");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "websocket read failed");
                    let _ = events.send(TransportEvent::Error(TransportError::Protocol(e.to_string())));
                    break;
                }
                None => break,
            },
        }
    }

    finish(&state, &events, None);
}

fn finish(
    state: &Mutex<ReadyState>,
    events: &mpsc::UnboundedSender<TransportEvent>,
    error: Option<TransportError>,
) {
    *state.lock() = ReadyState::Closed;
    if let Some(error) = error {
        warn!(error = %error, "transport failed");
        let _ = events.send(TransportEvent::Error(error));
    }
    let _ = events.send(TransportEvent::Close);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_reports_error_then_close() {
        let TransportParts { handle, mut events } =
            WebSocketTransport::connect("ws://127.0.0.1:9", Duration::from_secs(5));

        match events.recv().await {
            Some(TransportEvent::Error(TransportError::Connect(_))) => {}
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events.recv().await, Some(TransportEvent::Close));
        assert_eq!(handle.ready_state(), ReadyState::Closed);
        assert_eq!(
            handle.send("PING".to_string()).await,
            Err(TransportError::Closed)
        );
    }
}

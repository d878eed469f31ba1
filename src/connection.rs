//! Connection lifecycle.
//!
//! A [`Connection`] owns one transport, the four send queues, the heartbeat
//! and the listener registry. A driver task consumes transport events and
//! heartbeat signals in order:
//!
//! - on open it requests capabilities, authenticates and announces the
//!   login;
//! - every inbound payload resets the heartbeat, then each line is parsed,
//!   decoded and published before the next line is looked at;
//! - on close it stops the heartbeat, abandons queued sends and publishes
//!   [`EventKey::Disconnected`].

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::caps::{self, Capability};
use crate::config::{ConnectionOptions, QueueLimits};
use crate::decode::{decode, UserState};
use crate::error::{ChatError, Result, TransportError};
use crate::event::{ChatEvent, Dispatcher, EventKey, Subscription};
use crate::heartbeat::{Beat, Heartbeat, HeartbeatSignal};
use crate::message::tags::escape_tag_value;
use crate::message::{parse_batch, Message, MessageKind};
use crate::queue::{QueueKind, QueueSet, QueueTask};
use crate::transport::{ReadyState, Transport, TransportEvent, TransportParts, WebSocketTransport};
use crate::util::{normalize_channel, split_message, truncate_chars, MAX_MESSAGE_CHARS};

/// Priority of sends the connection makes on its own behalf. Above anything
/// a caller can ask for.
const INTERNAL_PRIORITY: i32 = 1_000;

const PONG_LINE: &str = "PONG :tmi.twitch.tv";
const PING_LINE: &str = "PING";
const AUTH_FAILED_TEXT: &str = "Login authentication failed";

/// Where the connection is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Waiting for the transport to open.
    Connecting,
    /// Transport open; registration in flight.
    Open,
    /// The relay accepted the login.
    Authenticated,
    /// Teardown requested.
    Closing,
    Closed,
}

/// Options for [`Connection::send`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Higher goes first within a queue.
    pub priority: u8,
    /// Route through the moderator queue.
    pub is_moderator: bool,
}

impl SendOptions {
    pub fn moderator() -> Self {
        Self {
            priority: 0,
            is_moderator: true,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// Handle to a chat connection. Cheap to clone.
///
/// Dropping the last handle disconnects, as if [`Connection::disconnect`]
/// had been called.
#[derive(Clone)]
pub struct Connection {
    pub(crate) inner: Arc<Inner>,
    _guard: Arc<HandleGuard>,
}

/// Shared by every handle; the driver task only holds [`Inner`].
struct HandleGuard(Arc<Inner>);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

pub(crate) struct Inner {
    options: ConnectionOptions,
    username: String,
    transport: Arc<dyn Transport>,
    queues: QueueSet,
    dispatcher: Dispatcher,
    heartbeat: Mutex<Heartbeat>,
    state: Mutex<ConnectionState>,
    moderated: Mutex<HashSet<String>>,
    capabilities: Mutex<HashSet<Capability>>,
    global_user_state: Mutex<Option<UserState>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("username", &self.inner.username)
            .field("state", &self.state())
            .field("ready_state", &self.inner.transport.ready_state())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Connect to the relay over WebSocket. Must be called inside a Tokio
    /// runtime.
    pub fn connect(options: ConnectionOptions) -> Self {
        let parts = WebSocketTransport::connect(options.url(), options.connection_timeout);
        Self::with_transport(options, parts)
    }

    /// Run a connection over an already constructed transport. Must be
    /// called inside a Tokio runtime.
    pub fn with_transport(options: ConnectionOptions, parts: TransportParts) -> Self {
        let TransportParts { handle, events } = parts;
        let (signals, beats) = mpsc::unbounded_channel();
        let heartbeat = Heartbeat::new(options.heartbeat_interval, options.heartbeat_grace, signals);
        let username = options.resolved_username();
        let tier = options.tier();
        info!(username = %username, ?tier, "starting connection");

        let inner = Arc::new(Inner {
            queues: QueueSet::new(QueueLimits::for_tier(tier)),
            username,
            transport: handle,
            dispatcher: Dispatcher::new(),
            heartbeat: Mutex::new(heartbeat),
            state: Mutex::new(ConnectionState::Connecting),
            moderated: Mutex::new(HashSet::new()),
            capabilities: Mutex::new(HashSet::new()),
            global_user_state: Mutex::new(None),
            options,
        });
        tokio::spawn(drive(Arc::clone(&inner), events, beats));
        Self {
            _guard: Arc::new(HandleGuard(Arc::clone(&inner))),
            inner,
        }
    }

    /// Queue a raw line.
    ///
    /// Resolves once the line has been written. A transport write failure
    /// is logged, not returned; [`ChatError::Disconnected`] means the
    /// connection shut down before the line was sent.
    pub fn send(
        &self,
        line: impl Into<String>,
        options: SendOptions,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        self.inner
            .enqueue(line.into(), i32::from(options.priority), options.is_moderator)
    }

    /// Send chat text to `channel`.
    ///
    /// Text longer than the relay accepts is split at word boundaries and
    /// sent as several messages. Slash commands are sent as is.
    pub async fn say(&self, channel: &str, text: &str) -> Result<()> {
        let channel = normalize_channel(channel);
        let options = SendOptions {
            priority: 0,
            is_moderator: self.is_moderator(&channel),
        };
        if text.starts_with('/') || text.starts_with('.') {
            return self.send(format!("PRIVMSG {} :{}", channel, text), options).await;
        }

        let mut rest = Some(text);
        while let Some(chunk) = rest {
            let (head, tail) = split_message(chunk, MAX_MESSAGE_CHARS);
            if !head.is_empty() {
                self.send(format!("PRIVMSG {} :{}", channel, head), options)
                    .await?;
            }
            rest = tail.filter(|t| !t.is_empty());
        }
        Ok(())
    }

    /// Reply in a thread under message `parent_id`.
    pub async fn reply(&self, channel: &str, parent_id: &str, text: &str) -> Result<()> {
        let channel = normalize_channel(channel);
        let mut line = String::from("@reply-parent-msg-id=");
        // writing into a String cannot fail
        let _ = escape_tag_value(&mut line, parent_id);
        line.push_str(&format!(
            " PRIVMSG {} :{}",
            channel,
            truncate_chars(text, MAX_MESSAGE_CHARS)
        ));
        let options = SendOptions {
            priority: 0,
            is_moderator: self.is_moderator(&channel),
        };
        self.send(line, options).await
    }

    /// Wait until the relay accepts the login.
    ///
    /// Fails with [`ChatError::AuthenticationFailed`] if the login is
    /// rejected, [`ChatError::Disconnected`] if the transport closes first,
    /// and [`ChatError::Timeout`] after the connection timeout.
    pub async fn connected(&self) -> Result<()> {
        let mut subscription = self.subscribe_many([
            EventKey::Connected,
            EventKey::AuthenticationFailed,
            EventKey::Disconnected,
        ]);
        match self.state() {
            ConnectionState::Authenticated => return Ok(()),
            ConnectionState::Closing | ConnectionState::Closed => {
                return Err(ChatError::Disconnected)
            }
            ConnectionState::Connecting | ConnectionState::Open => {}
        }

        let wait = async {
            match subscription.recv().await.map(|d| d.event) {
                Some(ChatEvent::Connected) => Ok(()),
                Some(ChatEvent::AuthenticationFailed(msg)) => Err(ChatError::AuthenticationFailed(
                    msg.message.clone().unwrap_or_default(),
                )),
                _ => Err(ChatError::Disconnected),
            }
        };
        tokio::time::timeout(self.inner.options.connection_timeout, wait)
            .await
            .unwrap_or_else(|_| {
                Err(ChatError::Timeout {
                    command: "connect".to_string(),
                })
            })
    }

    /// Tear down: abandon queued sends, stop the heartbeat and close the
    /// transport. Idempotent. [`EventKey::Disconnected`] is published once
    /// the transport reports the close.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Whether the transport is open for writing.
    pub fn is_ready(&self) -> bool {
        self.inner.transport.ready_state() == ReadyState::Open
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Login used on the wire; a `justinfan` name for anonymous sessions.
    pub fn username(&self) -> &str {
        &self.inner.username
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }

    /// Capabilities the relay acknowledged.
    pub fn capabilities(&self) -> HashSet<Capability> {
        self.inner.capabilities.lock().clone()
    }

    /// Whether the last USERSTATE for `channel` granted moderation rights.
    pub fn is_moderator(&self, channel: &str) -> bool {
        self.inner
            .moderated
            .lock()
            .contains(&normalize_channel(channel))
    }

    /// State from the last GLOBALUSERSTATE.
    pub fn global_user_state(&self) -> Option<UserState> {
        self.inner.global_user_state.lock().clone()
    }

    pub fn subscribe(&self, key: impl Into<EventKey>) -> Subscription {
        self.inner.dispatcher.subscribe(key)
    }

    pub fn subscribe_many(&self, keys: impl IntoIterator<Item = EventKey>) -> Subscription {
        self.inner.dispatcher.subscribe_many(keys)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }
}

async fn drive(
    inner: Arc<Inner>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    mut beats: mpsc::UnboundedReceiver<HeartbeatSignal>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(TransportEvent::Open) => inner.on_open(),
                Some(TransportEvent::Message(payload)) => inner.on_payload(&payload),
                Some(TransportEvent::Error(error)) => inner.on_transport_error(error),
                Some(TransportEvent::Close) | None => {
                    inner.on_close();
                    break;
                }
            },
            Some(signal) = beats.recv() => inner.on_beat(signal),
        }
    }
    debug!(username = %inner.username, "connection driver finished");
}

impl Inner {
    fn enqueue(
        &self,
        line: String,
        priority: i32,
        is_moderator: bool,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let kind = QueueKind::route(&line, is_moderator);
        let transport = Arc::clone(&self.transport);
        let task: QueueTask = Box::new(move || {
            Box::pin(async move {
                trace!(line = %redact(&line), "send");
                if let Err(error) = transport.send(line).await {
                    warn!(error = %error, "failed to write line");
                }
            })
        });
        self.queues.get(kind).push(task, priority)
    }

    /// Queue an internal line without waiting for it.
    fn enqueue_detached(&self, line: &str) {
        // queued on push; completion is not awaited
        let _ = self.enqueue(line.to_string(), INTERNAL_PRIORITY, false);
    }

    fn on_open(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            let current = *state;
            if current != ConnectionState::Connecting {
                debug!(state = ?current, "ignoring late transport open");
                return;
            }
            *state = ConnectionState::Open;
        }
        info!(username = %self.username, "transport open, registering");
        self.heartbeat.lock().reset();

        let mut lines = vec![caps::request_line()];
        if let Some(token) = self.options.pass_token() {
            lines.push(format!("PASS {}", token));
        }
        lines.push(format!("NICK {}", self.username));

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            for line in lines {
                if inner.enqueue(line, INTERNAL_PRIORITY, false).await.is_err() {
                    break;
                }
            }
        });
    }

    fn on_payload(self: &Arc<Self>, payload: &str) {
        self.heartbeat.lock().reset();
        for result in parse_batch(payload, &self.username) {
            match result {
                Ok(msg) => {
                    let raw = msg.raw.clone();
                    let flow = self.on_message(decode(msg));
                    self.dispatcher.emit(EventKey::Raw, ChatEvent::Raw(raw));
                    if flow.is_break() {
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "failed to parse line");
                    let raw = match &err {
                        ChatError::Parse { line, .. } => line.clone(),
                        _ => String::new(),
                    };
                    self.dispatcher
                        .emit_with_all(EventKey::ErrorEncountered, ChatEvent::Error(Arc::new(err)));
                    self.dispatcher.emit(EventKey::Raw, ChatEvent::Raw(raw));
                }
            }
        }
    }

    /// Breaks when the rest of the payload must be dropped.
    fn on_message(self: &Arc<Self>, msg: Message) -> ControlFlow<()> {
        if is_auth_failure(&msg) {
            warn!(username = %self.username, "relay rejected the login");
            self.dispatcher.emit_with_all(
                EventKey::AuthenticationFailed,
                ChatEvent::AuthenticationFailed(Arc::new(msg)),
            );
            self.disconnect();
            return ControlFlow::Break(());
        }

        match msg.command.as_str() {
            "PING" => self.enqueue_detached(PONG_LINE),
            "RECONNECT" => {
                info!("relay requested a reconnect");
                self.dispatcher
                    .emit_with_all(EventKey::Reconnect, ChatEvent::Reconnect);
                return ControlFlow::Continue(());
            }
            "USERSTATE" => {
                if let MessageKind::UserState(state) = &msg.kind {
                    self.track_moderation(&msg.channel, state.can_moderate());
                }
            }
            "PART" if msg.is_self => {
                self.moderated.lock().remove(&msg.channel);
            }
            "CAP" => self.track_capabilities(&msg),
            _ => {}
        }

        let msg = Arc::new(msg);
        self.publish(&msg);

        match msg.command.as_str() {
            "001" if !self.options.has_credentials() => self.mark_connected(),
            "GLOBALUSERSTATE" => {
                if let MessageKind::GlobalUserState(state) = &msg.kind {
                    *self.global_user_state.lock() = Some(state.as_ref().clone());
                }
                if self.options.has_credentials() {
                    self.mark_connected();
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    /// Deliver to name and channel listeners, then once to the catch-all.
    fn publish(&self, msg: &Arc<Message>) {
        let event = ChatEvent::Message(Arc::clone(msg));
        let narrowed = msg.event != msg.command;

        self.dispatcher
            .emit(EventKey::named(&msg.command), event.clone());
        if narrowed {
            self.dispatcher.emit(EventKey::named(&msg.event), event.clone());
        }
        if !msg.channel.is_empty() {
            self.dispatcher
                .emit(EventKey::channel(&msg.command, &msg.channel), event.clone());
            if narrowed {
                self.dispatcher
                    .emit(EventKey::channel(&msg.event, &msg.channel), event.clone());
            }
        }
        self.dispatcher
            .emit_to_all(EventKey::named(&msg.event), event);
    }

    fn mark_connected(&self) {
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Open {
                return;
            }
            *state = ConnectionState::Authenticated;
        }
        info!(username = %self.username, "connected");
        self.dispatcher
            .emit_with_all(EventKey::Connected, ChatEvent::Connected);
    }

    fn track_moderation(&self, channel: &str, can_moderate: bool) {
        if channel.is_empty() {
            return;
        }
        let mut moderated = self.moderated.lock();
        let changed = if can_moderate {
            moderated.insert(channel.to_string())
        } else {
            moderated.remove(channel)
        };
        if changed {
            debug!(channel, can_moderate, "moderation rights changed");
        }
    }

    /// `CAP * ACK :caps` or `CAP * NAK :caps`.
    fn track_capabilities(&self, msg: &Message) {
        let Some(sub) = msg.params.get(1) else {
            return;
        };
        let list = msg.params.last().map(String::as_str).unwrap_or("");
        if sub.eq_ignore_ascii_case("ACK") {
            if caps::apply_changes(&mut self.capabilities.lock(), list) {
                debug!(capabilities = list, "capabilities acknowledged");
            }
        } else if sub.eq_ignore_ascii_case("NAK") {
            warn!(capabilities = list, "capabilities refused");
        }
    }

    fn on_transport_error(&self, error: TransportError) {
        warn!(error = %error, "transport error");
        let error = ChatError::Transport(error);
        self.dispatcher
            .emit_with_all(EventKey::ErrorEncountered, ChatEvent::Error(Arc::new(error)));
    }

    fn on_close(&self) {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, ConnectionState::Closed)
        };
        if previous == ConnectionState::Closing {
            info!(username = %self.username, "disconnected");
        } else {
            warn!(username = %self.username, ?previous, "transport closed unexpectedly");
        }
        self.heartbeat.lock().stop();
        self.queues.shutdown();
        self.dispatcher
            .emit_with_all(EventKey::Disconnected, ChatEvent::Disconnected);
    }

    fn on_beat(&self, signal: HeartbeatSignal) {
        if !self.heartbeat.lock().is_current(&signal) {
            return;
        }
        match signal.beat {
            Beat::Ping => {
                debug!("connection idle, probing");
                self.enqueue_detached(PING_LINE);
            }
            Beat::Lost => {
                warn!("no response from relay");
                self.dispatcher
                    .emit_with_all(EventKey::Reconnect, ChatEvent::Reconnect);
            }
        }
    }

    fn disconnect(&self) {
        {
            let mut state = self.state.lock();
            if !matches!(*state, ConnectionState::Closing | ConnectionState::Closed) {
                debug!(username = %self.username, "disconnect requested");
                *state = ConnectionState::Closing;
            }
        }
        self.queues.shutdown();
        self.heartbeat.lock().stop();
        self.transport.close();
    }
}

fn is_auth_failure(msg: &Message) -> bool {
    msg.command == "NOTICE"
        && msg.channel.is_empty()
        && msg.message.as_deref() == Some(AUTH_FAILED_TEXT)
}

/// Keep tokens out of the logs.
fn redact(line: &str) -> &str {
    if line.starts_with("PASS ") {
        "PASS ***"
    } else {
        line
    }
}

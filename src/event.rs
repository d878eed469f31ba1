//! Event keys and the listener registry.
//!
//! Listeners subscribe to one or more [`EventKey`]s and receive
//! [`Delivery`] values over an unbounded channel. A [`Subscription`]
//! unregisters itself when dropped.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::message::Message;

/// Name an event is published under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// Every inbound line, verbatim.
    Raw,
    /// Catch-all: one delivery per message and per lifecycle event.
    All,
    Connected,
    Disconnected,
    Reconnect,
    AuthenticationFailed,
    ErrorEncountered,
    /// A command or decoded event name such as `PRIVMSG` or `BAN_SUCCESS`.
    Named(String),
    /// An event scoped to one channel, written `EVENT/#channel`.
    Channel { event: String, channel: String },
}

impl EventKey {
    /// Key for an event name. Lifecycle names map to their own variants.
    pub fn named(event: &str) -> Self {
        match event {
            "RAW" => Self::Raw,
            "ALL" => Self::All,
            "CONNECTED" => Self::Connected,
            "DISCONNECTED" => Self::Disconnected,
            "RECONNECT" => Self::Reconnect,
            "AUTHENTICATION_FAILED" => Self::AuthenticationFailed,
            "ERROR_ENCOUNTERED" => Self::ErrorEncountered,
            other => Self::Named(other.to_string()),
        }
    }

    /// `EVENT/#channel`.
    pub fn channel(event: &str, channel: &str) -> Self {
        Self::Channel {
            event: event.to_string(),
            channel: crate::util::normalize_channel(channel),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("RAW"),
            Self::All => f.write_str("ALL"),
            Self::Connected => f.write_str("CONNECTED"),
            Self::Disconnected => f.write_str("DISCONNECTED"),
            Self::Reconnect => f.write_str("RECONNECT"),
            Self::AuthenticationFailed => f.write_str("AUTHENTICATION_FAILED"),
            Self::ErrorEncountered => f.write_str("ERROR_ENCOUNTERED"),
            Self::Named(event) => f.write_str(event),
            Self::Channel { event, channel } => write!(f, "{}/{}", event, channel),
        }
    }
}

impl FromStr for EventKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once('/') {
            Some((event, channel)) if !event.is_empty() && !channel.is_empty() => {
                Self::channel(event, channel)
            }
            _ => Self::named(s),
        })
    }
}

impl From<&str> for EventKey {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(key) => key,
            Err(never) => match never {},
        }
    }
}

/// Payload of a delivery.
#[derive(Clone, Debug)]
pub enum ChatEvent {
    /// One raw inbound line.
    Raw(String),
    Message(Arc<Message>),
    Connected,
    Disconnected,
    Reconnect,
    AuthenticationFailed(Arc<Message>),
    Error(Arc<ChatError>),
}

impl ChatEvent {
    /// The message carried, if any.
    pub fn message(&self) -> Option<&Arc<Message>> {
        match self {
            Self::Message(msg) | Self::AuthenticationFailed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// One event as seen by a listener: the key it was published under and its
/// payload.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub key: EventKey,
    pub event: ChatEvent,
}

type Listener = (u64, mpsc::UnboundedSender<Delivery>);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventKey, Vec<Listener>>,
}

impl Registry {
    fn remove(&mut self, id: u64, keys: &[EventKey]) {
        for key in keys {
            if let Some(list) = self.listeners.get_mut(key) {
                list.retain(|(listener, _)| *listener != id);
                if list.is_empty() {
                    self.listeners.remove(key);
                }
            }
        }
    }
}

/// Listener registry shared by a connection and its subscribers.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("Dispatcher")
            .field("keys", &registry.listeners.len())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, key: impl Into<EventKey>) -> Subscription {
        self.subscribe_many([key.into()])
    }

    /// One subscription receiving every key in `keys`.
    pub fn subscribe_many(&self, keys: impl IntoIterator<Item = EventKey>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut unique: Vec<EventKey> = Vec::new();
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        let keys = unique;

        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        for key in &keys {
            registry
                .listeners
                .entry(key.clone())
                .or_default()
                .push((id, tx.clone()));
        }
        drop(registry);

        Subscription {
            id,
            keys,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver to listeners of `key` only.
    pub fn emit(&self, key: EventKey, event: ChatEvent) {
        let mut registry = self.registry.lock();
        if let Some(list) = registry.listeners.get_mut(&key) {
            let delivery = Delivery { key: key.clone(), event };
            list.retain(|(_, tx)| tx.send(delivery.clone()).is_ok());
            if list.is_empty() {
                registry.listeners.remove(&key);
            }
        }
    }

    /// Deliver to listeners of `key`, then once to [`EventKey::All`].
    pub fn emit_with_all(&self, key: EventKey, event: ChatEvent) {
        self.emit(key.clone(), event.clone());
        self.emit_to_all(key, event);
    }

    /// Deliver to [`EventKey::All`] listeners, tagged with `key`.
    pub fn emit_to_all(&self, key: EventKey, event: ChatEvent) {
        let mut registry = self.registry.lock();
        if let Some(list) = registry.listeners.get_mut(&EventKey::All) {
            let delivery = Delivery { key, event };
            list.retain(|(_, tx)| tx.send(delivery.clone()).is_ok());
            if list.is_empty() {
                registry.listeners.remove(&EventKey::All);
            }
        }
    }

    /// Number of live listeners registered under `key`.
    pub fn listener_count(&self, key: &EventKey) -> usize {
        self.registry
            .lock()
            .listeners
            .get(key)
            .map_or(0, |list| list.len())
    }
}

/// Receiving end of [`Dispatcher::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    keys: Vec<EventKey>,
    rx: mpsc::UnboundedReceiver<Delivery>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Next delivery. `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    pub fn keys(&self) -> &[EventKey] {
        &self.keys
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(self.id, &self.keys);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(EventKey::from("BAN_SUCCESS/#Chan").to_string(), "BAN_SUCCESS/#chan");
        assert_eq!(EventKey::from("JOIN/chan"), EventKey::channel("JOIN", "#chan"));
        assert_eq!(EventKey::from("CONNECTED"), EventKey::Connected);
        assert_eq!(EventKey::from("PRIVMSG"), EventKey::Named("PRIVMSG".to_string()));
        assert_eq!(EventKey::from("/"), EventKey::Named("/".to_string()));
    }

    #[test]
    fn test_emit_reaches_key_and_all() {
        let dispatcher = Dispatcher::new();
        let mut joins = dispatcher.subscribe(EventKey::channel("JOIN", "#a"));
        let mut all = dispatcher.subscribe(EventKey::All);

        dispatcher.emit(EventKey::channel("JOIN", "#a"), ChatEvent::Connected);
        assert!(joins.try_recv().is_some());
        assert!(all.try_recv().is_none());

        dispatcher.emit_with_all(EventKey::Connected, ChatEvent::Connected);
        let delivery = all.try_recv().unwrap();
        assert_eq!(delivery.key, EventKey::Connected);
        assert!(all.try_recv().is_none());
        assert!(joins.try_recv().is_none());
    }

    #[test]
    fn test_drop_unregisters() {
        let dispatcher = Dispatcher::new();
        let key = EventKey::named("BAN_SUCCESS");
        let sub = dispatcher.subscribe_many([key.clone(), EventKey::Raw]);
        assert_eq!(dispatcher.listener_count(&key), 1);
        assert_eq!(dispatcher.listener_count(&EventKey::Raw), 1);

        drop(sub);
        assert_eq!(dispatcher.listener_count(&key), 0);
        assert_eq!(dispatcher.listener_count(&EventKey::Raw), 0);
        dispatcher.emit(key, ChatEvent::Reconnect);
    }
}

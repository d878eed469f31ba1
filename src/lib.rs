//! # tmi-chat
//!
//! Connection core for Twitch chat (TMI): the tag-aware IRC dialect the
//! chat relay speaks, plus the client machinery around it.
//!
//! ## Features
//!
//! - Line parsing with camel-cased tags, prefixes and timestamps
//! - Decoders for PRIVMSG, USERNOTICE, ROOMSTATE, USERSTATE, NOTICE and friends
//! - Four rate-limited send queues sized by account tier
//! - Heartbeat with idle probing and liveness loss detection
//! - Commands that resolve on the relay's confirmation notice
//! - WebSocket transport (Tokio), swappable for an in-memory one in tests

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Parsing lines
//!
//! ```rust
//! use tmi_chat::{decode, parse_line, MessageKind};
//!
//! let raw = "@badges=subscriber/12;display-name=Fan;tmi-sent-ts=1700000000000 :fan!fan@fan.tmi.twitch.tv PRIVMSG #chan :hello";
//! let msg = decode(parse_line(raw, "mybot").unwrap());
//!
//! assert_eq!(msg.channel, "#chan");
//! assert_eq!(msg.username.as_deref(), Some("fan"));
//! assert!(matches!(msg.kind, MessageKind::Chat(_)));
//! ```
//!
//! ### Connecting
//!
//! ```no_run
//! use tmi_chat::{Connection, ConnectionOptions, EventKey};
//!
//! # async fn run() -> tmi_chat::Result<()> {
//! let conn = Connection::connect(ConnectionOptions::new().with_credentials("mybot", "token"));
//! conn.connected().await?;
//! conn.join("#chan").await?;
//!
//! let mut chat = conn.subscribe(EventKey::channel("PRIVMSG", "#chan"));
//! while let Some(delivery) = chat.recv().await {
//!     if let Some(msg) = delivery.event.message() {
//!         println!("{:?}: {:?}", msg.username, msg.message);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod caps;
pub mod config;
pub mod decode;
pub mod error;
pub mod message;
pub mod prefix;
pub mod util;

#[cfg(feature = "tokio")]
pub mod command;
#[cfg(feature = "tokio")]
pub mod connection;
#[cfg(feature = "tokio")]
pub mod event;
#[cfg(feature = "tokio")]
pub mod heartbeat;
#[cfg(feature = "tokio")]
pub mod queue;
#[cfg(feature = "tokio")]
pub mod transport;

pub use self::caps::Capability;
pub use self::config::{AccountTier, ConnectionOptions, QueueLimits, RateLimit};
pub use self::decode::decode;
pub use self::error::{ChatError, MessageParseError, Result, TransportError};
pub use self::message::{parse_batch, parse_line, Message, MessageKind, Tags};
pub use self::prefix::Prefix;

#[cfg(feature = "tokio")]
pub use self::command::{CommandOptions, Confirmation};
#[cfg(feature = "tokio")]
pub use self::connection::{Connection, ConnectionState, SendOptions};
#[cfg(feature = "tokio")]
pub use self::event::{ChatEvent, Delivery, Dispatcher, EventKey, Subscription};

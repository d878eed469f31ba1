//! Connection options and the rate-limit tier they select.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::util::{anonymous_username, normalize_token, normalize_username};

/// Default chat relay host.
pub const DEFAULT_SERVER: &str = "irc-ws.chat.twitch.tv";

/// Options for a chat connection.
///
/// ```
/// use tmi_chat::ConnectionOptions;
///
/// let options = ConnectionOptions::new()
///     .with_credentials("MyBot", "abc123")
///     .with_verified(true);
/// assert_eq!(options.url(), "wss://irc-ws.chat.twitch.tv:443");
/// assert_eq!(options.pass_token().as_deref(), Some("oauth:abc123"));
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionOptions {
    /// Login name; ignored for anonymous connections.
    pub username: Option<String>,
    /// OAuth token. Absent means an anonymous, read-only connection.
    pub token: Option<String>,
    /// Relay host.
    pub server: String,
    /// Relay port; defaults to 443 with `ssl` and 80 without.
    pub port: Option<u16>,
    /// Use `wss` instead of `ws`.
    pub ssl: bool,
    /// Account is a known bot.
    pub is_known: bool,
    /// Account is a verified bot.
    pub is_verified: bool,
    /// Deadline for the transport to open.
    pub connection_timeout: Duration,
    /// Deadline for a JOIN confirmation.
    pub join_timeout: Duration,
    /// Default deadline for command confirmations.
    pub command_timeout: Duration,
    /// Idle time before a PING is sent.
    pub heartbeat_interval: Duration,
    /// Extra time after the PING before liveness is considered lost.
    pub heartbeat_grace: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            username: None,
            token: None,
            server: DEFAULT_SERVER.to_string(),
            port: None,
            ssl: true,
            is_known: false,
            is_verified: false,
            connection_timeout: Duration::from_secs(10),
            join_timeout: Duration::from_secs(20),
            command_timeout: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(60),
            heartbeat_grace: Duration::from_secs(10),
        }
    }
}

impl ConnectionOptions {
    /// Options for an anonymous connection to the default relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log in as `username` with `token`.
    pub fn with_credentials(mut self, username: impl Into<String>, token: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.token = Some(token.into());
        self
    }

    pub fn with_server(mut self, server: impl Into<String>, port: Option<u16>) -> Self {
        self.server = server.into();
        self.port = port;
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_known(mut self, is_known: bool) -> Self {
        self.is_known = is_known;
        self
    }

    pub fn with_verified(mut self, is_verified: bool) -> Self {
        self.is_verified = is_verified;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration, grace: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_grace = grace;
        self
    }

    /// Whether a usable token was supplied.
    pub fn has_credentials(&self) -> bool {
        self.token.as_deref().map_or(false, |t| !t.trim().is_empty())
    }

    /// The login to use: the configured username when credentials are
    /// present, a fresh anonymous login otherwise.
    pub fn resolved_username(&self) -> String {
        match (&self.username, self.has_credentials()) {
            (Some(name), true) if !name.trim().is_empty() => normalize_username(name),
            _ => anonymous_username(),
        }
    }

    /// Token for the `PASS` line, with the `oauth:` prefix ensured.
    pub fn pass_token(&self) -> Option<String> {
        if self.has_credentials() {
            self.token.as_deref().map(normalize_token)
        } else {
            None
        }
    }

    /// WebSocket URL of the relay.
    pub fn url(&self) -> String {
        let (scheme, default_port) = if self.ssl { ("wss", 443) } else { ("ws", 80) };
        format!("{}://{}:{}", scheme, self.server, self.port.unwrap_or(default_port))
    }

    /// Rate-limit tier selected by these options.
    pub fn tier(&self) -> AccountTier {
        if !self.has_credentials() {
            AccountTier::Anonymous
        } else if self.is_verified || self.is_known {
            AccountTier::Verified
        } else {
            AccountTier::Standard
        }
    }
}

/// Privilege tier deciding the authentication and join rate limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AccountTier {
    Anonymous,
    Standard,
    Verified,
}

/// At most `max` sends within any rolling `window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RateLimit {
    pub max: usize,
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(max: usize, window: Duration) -> Self {
        Self { max, window }
    }
}

/// Limits for each of the four send queues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QueueLimits {
    pub auth: RateLimit,
    pub join: RateLimit,
    pub moderator: RateLimit,
    pub general: RateLimit,
}

impl QueueLimits {
    /// Limits for a tier. Only the authentication and join queues differ.
    pub fn for_tier(tier: AccountTier) -> Self {
        let ten_seconds = Duration::from_secs(10);
        let thirty_seconds = Duration::from_secs(30);
        let (auth, join) = match tier {
            AccountTier::Anonymous | AccountTier::Standard => (
                RateLimit::new(20, ten_seconds),
                RateLimit::new(20, ten_seconds),
            ),
            AccountTier::Verified => (
                RateLimit::new(200, ten_seconds),
                RateLimit::new(2000, ten_seconds),
            ),
        };
        Self {
            auth,
            join,
            moderator: RateLimit::new(100, thirty_seconds),
            general: RateLimit::new(20, thirty_seconds),
        }
    }
}

//! Message prefix (source) parsing.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Host used by the chat relay for its own messages.
pub const SYSTEM_HOST: &str = "tmi.twitch.tv";

/// Source of a message: `nick!user@host`, `nick@host`, or a bare host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Prefix {
    /// Nickname part, when the prefix names a user.
    pub name: Option<String>,
    /// User (ident) part after `!`.
    pub user: Option<String>,
    /// Host part; a bare server prefix lands here.
    pub host: Option<String>,
}

impl Prefix {
    /// Parse a prefix string (without the leading `:`).
    pub fn parse(raw: &str) -> Self {
        let (front, host) = match raw.split_once('@') {
            Some((front, host)) => (Some(front), Some(host)),
            None => (None, Some(raw)),
        };

        let (name, user) = match front {
            Some(front) => match front.split_once('!') {
                Some((name, user)) => (Some(name), Some(user)),
                None => (Some(front), None),
            },
            None => (None, None),
        };

        let owned = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            name: owned(name),
            user: owned(user),
            host: owned(host),
        }
    }

    /// Whether the prefix is the relay itself.
    pub fn is_system(&self) -> bool {
        self.name.is_none() && self.host.as_deref() == Some(SYSTEM_HOST)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            f.write_str(name)?;
            if let Some(user) = &self.user {
                write!(f, "!{}", user)?;
            }
            if let Some(host) = &self.host {
                write!(f, "@{}", host)?;
            }
            Ok(())
        } else {
            f.write_str(self.host.as_deref().unwrap_or(""))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_prefix() {
        let p = Prefix::parse("ronni!ronni@ronni.tmi.twitch.tv");
        assert_eq!(p.name.as_deref(), Some("ronni"));
        assert_eq!(p.user.as_deref(), Some("ronni"));
        assert_eq!(p.host.as_deref(), Some("ronni.tmi.twitch.tv"));
        assert!(!p.is_system());
        assert_eq!(p.to_string(), "ronni!ronni@ronni.tmi.twitch.tv");
    }

    #[test]
    fn test_bare_host() {
        let p = Prefix::parse("tmi.twitch.tv");
        assert_eq!(p.name, None);
        assert_eq!(p.user, None);
        assert_eq!(p.host.as_deref(), Some("tmi.twitch.tv"));
        assert!(p.is_system());
        assert_eq!(p.to_string(), "tmi.twitch.tv");
    }

    #[test]
    fn test_nick_at_host() {
        let p = Prefix::parse("nick@host");
        assert_eq!(p.name.as_deref(), Some("nick"));
        assert_eq!(p.user, None);
        assert_eq!(p.host.as_deref(), Some("host"));
    }
}

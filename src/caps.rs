//! Capability registration.
//!
//! The connection always requests the same fixed set of relay extensions:
//! tags on every message, the platform commands (USERSTATE, ROOMSTATE,
//! USERNOTICE, ...), and JOIN/PART membership events.

use std::collections::HashSet;

/// Definition of a requested capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDef {
    /// Capability name (e.g., "twitch.tv/tags")
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
}

/// Known relay capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Message tags (badges, emotes, ids, timestamps)
    Tags,
    /// Platform-specific commands
    Commands,
    /// JOIN, PART and NAMES for other users
    Membership,
    /// Unknown capability
    Custom(String),
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::Tags => "twitch.tv/tags",
            Self::Commands => "twitch.tv/commands",
            Self::Membership => "twitch.tv/membership",
            Self::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "twitch.tv/tags" => Self::Tags,
            "twitch.tv/commands" => Self::Commands,
            "twitch.tv/membership" => Self::Membership,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// The capabilities requested on every connection, in request order.
pub const CAPABILITIES: &[CapabilityDef] = &[
    CapabilityDef {
        name: "twitch.tv/tags",
        description: "Metadata tags on PRIVMSG, USERSTATE, NOTICE and friends",
    },
    CapabilityDef {
        name: "twitch.tv/commands",
        description: "CLEARCHAT, HOSTTARGET, NOTICE, RECONNECT, ROOMSTATE, USERNOTICE, USERSTATE",
    },
    CapabilityDef {
        name: "twitch.tv/membership",
        description: "JOIN, PART and NAMES for other chatters",
    },
];

/// The `CAP REQ` line sent when the transport opens.
pub fn request_line() -> String {
    let names: Vec<&str> = CAPABILITIES.iter().map(|cap| cap.name).collect();
    format!("CAP REQ :{}", names.join(" "))
}

/// Check if a capability name is one the connection requests.
pub fn is_supported(name: &str) -> bool {
    CAPABILITIES.iter().any(|cap| cap.name == name)
}

/// Apply an ACK list to an active set.
///
/// Changes prefixed with '-' remove capabilities, others add them.
/// Returns true if any changes were made.
pub fn apply_changes(capabilities: &mut HashSet<Capability>, changes: &str) -> bool {
    let mut modified = false;

    for change in changes.split_whitespace() {
        if let Some(cap_name) = change.strip_prefix('-') {
            if capabilities.remove(&Capability::from(cap_name)) {
                modified = true;
            }
        } else if capabilities.insert(Capability::from(change)) {
            modified = true;
        }
    }

    modified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_round_trip() {
        assert_eq!(Capability::Tags.as_ref(), "twitch.tv/tags");
        assert_eq!(Capability::from("twitch.tv/membership"), Capability::Membership);
        assert_eq!(
            Capability::from("unknown-cap"),
            Capability::Custom("unknown-cap".to_string())
        );
    }

    #[test]
    fn test_request_line() {
        assert_eq!(
            request_line(),
            "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership"
        );
        assert!(is_supported("twitch.tv/commands"));
        assert!(!is_supported("sasl"));
    }

    #[test]
    fn test_apply_changes() {
        let mut caps = HashSet::new();
        assert!(apply_changes(&mut caps, "twitch.tv/tags twitch.tv/commands"));
        assert!(caps.contains(&Capability::Tags));
        assert!(caps.contains(&Capability::Commands));

        assert!(!apply_changes(&mut caps, "twitch.tv/tags"));
        assert!(apply_changes(&mut caps, "-twitch.tv/tags"));
        assert!(!caps.contains(&Capability::Tags));
    }
}

//! NOTICE, HOSTTARGET, CLEARCHAT, CLEARMSG and NAMES payloads.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageKind};

use super::fields::{parse_number, parse_string};

/// Event name used when the relay does not know a slash-command.
pub const UNRECOGNIZED_COMMAND: &str = "UNRECOGNIZED_COMMAND";

/// A server NOTICE; `msg_id` names what it reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Notice {
    pub msg_id: Option<String>,
}

/// Host mode change. `target` is `None` when hosting stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HostTarget {
    pub target: Option<String>,
    /// Only present on some host-start messages.
    pub viewers: Option<u64>,
}

impl HostTarget {
    pub fn is_hosting(&self) -> bool {
        self.target.is_some()
    }
}

/// Chat purge: the whole channel, or one user's messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClearChat {
    pub target_user: Option<String>,
    pub target_user_id: Option<String>,
    /// Timeout length in seconds; `None` for a permanent ban.
    pub ban_duration: Option<u64>,
}

/// Removal of a single message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClearMsg {
    pub login: Option<String>,
    pub target_msg_id: Option<String>,
}

/// Event name for a NOTICE `msg-id`: upper-cased, with the unknown-command
/// notice mapped to [`UNRECOGNIZED_COMMAND`].
pub fn notice_event_name(msg_id: &str) -> String {
    match msg_id {
        "unrecognized_cmd" => UNRECOGNIZED_COMMAND.to_string(),
        other => other.to_ascii_uppercase(),
    }
}

pub(super) fn decode_notice(mut msg: Message) -> Message {
    let msg_id = msg.msg_id().map(str::to_string);
    if let Some(id) = &msg_id {
        msg.event = notice_event_name(id);
    }
    msg.kind = MessageKind::Notice(Notice { msg_id });
    msg
}

/// `HOSTTARGET #host :target [viewers]` or `HOSTTARGET #host :- [viewers]`.
pub(super) fn decode_host_target(mut msg: Message) -> Message {
    let mut parts = msg.message.as_deref().unwrap_or("").split_whitespace();
    let target = match parts.next() {
        Some("-") | None => None,
        Some(t) => Some(crate::util::normalize_channel(t)),
    };
    let viewers = parse_number(parts.next());

    msg.event = if target.is_some() { "HOSTING" } else { "UNHOST" }.to_string();
    msg.kind = MessageKind::HostTarget(HostTarget { target, viewers });
    msg
}

/// CLEARCHAT without a user clears the room; with a user it is a timeout
/// when `ban-duration` is present and a ban otherwise.
pub(super) fn decode_clear_chat(mut msg: Message) -> Message {
    let target_user = msg
        .message
        .as_deref()
        .filter(|u| !u.is_empty())
        .map(str::to_lowercase);
    let ban_duration = parse_number(msg.tags.get("banDuration"));

    msg.event = match (&target_user, ban_duration) {
        (None, _) => "CLEARCHAT",
        (Some(_), Some(_)) => "TIMEOUT",
        (Some(_), None) => "BAN",
    }
    .to_string();
    msg.kind = MessageKind::ClearChat(ClearChat {
        target_user,
        target_user_id: parse_string(msg.tags.get("targetUserId")),
        ban_duration,
    });
    msg
}

pub(super) fn decode_clear_msg(mut msg: Message) -> Message {
    msg.event = "MESSAGEDELETED".to_string();
    msg.kind = MessageKind::ClearMsg(ClearMsg {
        login: parse_string(msg.tags.get("login")).map(|l| l.to_lowercase()),
        target_msg_id: parse_string(msg.tags.get("targetMsgId")),
    });
    msg
}

/// RPL_NAMREPLY (353): the trailing parameter lists logins.
pub(super) fn decode_names(mut msg: Message) -> Message {
    let names = msg
        .message
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    msg.event = "NAMES".to_string();
    msg.kind = MessageKind::Names(names);
    msg
}

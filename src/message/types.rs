use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::decode::{
    ChatMessage, ClearChat, ClearMsg, HostTarget, Notice, RoomState, UserNotice, UserState,
};
use crate::prefix::Prefix;

use super::tags::Tags;

/// One parsed wire line.
///
/// Built once by [`parse_line`](super::parse_line) and never mutated;
/// decoders consume it by value and return a derived copy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    /// The line exactly as received, without its line terminator.
    pub raw: String,
    /// `tmi-sent-ts` when present and numeric, wall clock otherwise.
    pub timestamp: DateTime<Utc>,
    /// Protocol verb (`PRIVMSG`, `NOTICE`, `353`, ...).
    pub command: String,
    /// Semantic event name; equals `command` unless a decoder narrowed it.
    pub event: String,
    /// Lowercased channel with `#`, or empty when the line has none.
    pub channel: String,
    /// Lowercased login resolved from the prefix or tags.
    pub username: Option<String>,
    /// Whether `username` is the connection's own login.
    pub is_self: bool,
    /// Camel-cased tags.
    pub tags: Tags,
    /// Trailing parameter text.
    pub message: Option<String>,
    /// All parameters in wire order, trailing last.
    pub params: Vec<String>,
    /// Parsed source prefix.
    pub prefix: Option<Prefix>,
    /// Typed payload filled in by the decoders.
    pub kind: MessageKind,
}

impl Message {
    /// Re-serialize the command and parameters (tags and prefix omitted).
    pub fn to_command_line(&self) -> String {
        let mut line = self.command.clone();
        let count = self.params.len();
        for (i, param) in self.params.iter().enumerate() {
            line.push(' ');
            let last = i + 1 == count;
            if last && (self.message.is_some() || param.is_empty() || param.contains(' ')) {
                line.push(':');
            }
            line.push_str(param);
        }
        line
    }

    /// The `msg-id` tag, used by NOTICE and USERNOTICE.
    pub fn msg_id(&self) -> Option<&str> {
        self.tags.get_non_empty("msgId")
    }

    /// Channel-namespaced event key, `<event>/<channel>`.
    pub fn channel_event(&self) -> Option<String> {
        if self.channel.is_empty() {
            None
        } else {
            Some(format!("{}/{}", self.event, self.channel))
        }
    }
}

/// Decoded payload of a [`Message`].
///
/// `Generic` means no decoder applied, or the decoder did not recognize the
/// message (an unknown `msg-id`, for instance).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum MessageKind {
    #[default]
    Generic,
    Chat(Box<ChatMessage>),
    Whisper(Box<ChatMessage>),
    RoomState(RoomState),
    UserState(Box<UserState>),
    GlobalUserState(Box<UserState>),
    UserNotice(Box<UserNotice>),
    HostTarget(HostTarget),
    ClearChat(ClearChat),
    ClearMsg(ClearMsg),
    Notice(Notice),
    Names(Vec<String>),
}

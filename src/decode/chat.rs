//! PRIVMSG and WHISPER payloads.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageKind, Tags};

use super::fields::{
    parse_badges, parse_bool, parse_emotes, parse_number, parse_string, Badges, Emotes,
};

const ACTION_PREFIX: &str = "\u{1}ACTION ";

/// Sender metadata and content flags of a chat line or whisper.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChatMessage {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub color: Option<String>,
    pub badges: Badges,
    pub badge_info: Badges,
    pub emotes: Emotes,
    /// Bits cheered with this message, only when greater than zero.
    pub bits: Option<u64>,
    pub moderator: bool,
    pub subscriber: bool,
    pub turbo: bool,
    pub first_message: bool,
    /// `/me` line; the ACTION wrapper has been removed from the text.
    pub is_action: bool,
    /// Id of the message this one replies to.
    pub reply_parent_id: Option<String>,
}

impl ChatMessage {
    fn from_tags(tags: &Tags) -> Self {
        Self {
            id: parse_string(tags.get("id")),
            user_id: parse_string(tags.get("userId")),
            display_name: parse_string(tags.get("displayName")),
            color: parse_string(tags.get("color")),
            badges: tags.get("badges").map(parse_badges).unwrap_or_default(),
            badge_info: tags.get("badgeInfo").map(parse_badges).unwrap_or_default(),
            emotes: tags.get("emotes").map(parse_emotes).unwrap_or_default(),
            bits: parse_number::<u64>(tags.get("bits")).filter(|b| *b > 0),
            moderator: parse_bool(tags.get("mod")),
            subscriber: parse_bool(tags.get("subscriber")),
            turbo: parse_bool(tags.get("turbo")),
            first_message: parse_bool(tags.get("firstMsg")),
            is_action: false,
            reply_parent_id: parse_string(tags.get("replyParentMsgId")),
        }
    }
}

/// Strip a `\x01ACTION ...\x01` wrapper.
fn strip_action(text: &str) -> Option<&str> {
    let inner = text.strip_prefix(ACTION_PREFIX)?;
    Some(inner.strip_suffix('\u{1}').unwrap_or(inner))
}

/// PRIVMSG: a positive `bits` tag narrows the event to `CHEER`.
pub(super) fn decode_privmsg(mut msg: Message) -> Message {
    let mut chat = ChatMessage::from_tags(&msg.tags);

    if let Some(text) = msg.message.as_deref().and_then(strip_action) {
        chat.is_action = true;
        msg.message = Some(text.to_string());
    }
    if chat.bits.is_some() {
        msg.event = "CHEER".to_string();
    }

    msg.kind = MessageKind::Chat(Box::new(chat));
    msg
}

pub(super) fn decode_whisper(mut msg: Message) -> Message {
    let chat = ChatMessage::from_tags(&msg.tags);
    msg.kind = MessageKind::Whisper(Box::new(chat));
    msg
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageKind, Tags};

use super::fields::{parse_badges, parse_bool, parse_emote_sets, parse_string, Badges};

/// The connection's own chat identity, from USERSTATE (per channel) or
/// GLOBALUSERSTATE (after login).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UserState {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub color: Option<String>,
    pub badges: Badges,
    pub badge_info: Badges,
    pub emote_sets: Vec<String>,
    pub moderator: bool,
    pub subscriber: bool,
    pub turbo: bool,
    /// `mod`, `global_mod`, `admin`, `staff`, or `None` for a regular user.
    pub user_type: Option<String>,
}

impl UserState {
    fn from_tags(tags: &Tags) -> Self {
        Self {
            user_id: parse_string(tags.get("userId")),
            display_name: parse_string(tags.get("displayName")),
            color: parse_string(tags.get("color")),
            badges: tags.get("badges").map(parse_badges).unwrap_or_default(),
            badge_info: tags.get("badgeInfo").map(parse_badges).unwrap_or_default(),
            emote_sets: tags.get("emoteSets").map(parse_emote_sets).unwrap_or_default(),
            moderator: parse_bool(tags.get("mod")),
            subscriber: parse_bool(tags.get("subscriber")),
            turbo: parse_bool(tags.get("turbo")),
            user_type: parse_string(tags.get("userType")),
        }
    }

    /// Whether this identity may use moderator commands in the channel.
    pub fn can_moderate(&self) -> bool {
        self.moderator || self.badges.contains_key("broadcaster")
    }
}

pub(super) fn decode_user_state(mut msg: Message) -> Message {
    msg.kind = MessageKind::UserState(Box::new(UserState::from_tags(&msg.tags)));
    msg
}

pub(super) fn decode_global_user_state(mut msg: Message) -> Message {
    msg.kind = MessageKind::GlobalUserState(Box::new(UserState::from_tags(&msg.tags)));
    msg
}

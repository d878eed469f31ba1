#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageKind};

use super::fields::{parse_number, parse_optional_bool, parse_string};

/// Channel chat settings from a ROOMSTATE line.
///
/// The relay sends the full set on join and only the changed tag afterwards,
/// so `None` means "unchanged", never "off". Merging against earlier state is
/// left to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoomState {
    pub room_id: Option<String>,
    pub broadcaster_lang: Option<String>,
    pub emote_only: Option<bool>,
    /// Minimum follow age in minutes; `-1` disables followers-only mode.
    pub followers_only: Option<i64>,
    pub r9k: Option<bool>,
    /// Seconds between messages; `0` disables slow mode.
    pub slow: Option<u64>,
    pub subs_only: Option<bool>,
}

impl RoomState {
    /// Overlay the fields present in `update` onto `self`.
    pub fn merge(&mut self, update: &RoomState) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if update.$field.is_some() { self.$field = update.$field.clone(); })*
            };
        }
        take!(room_id, broadcaster_lang, emote_only, followers_only, r9k, slow, subs_only);
    }
}

pub(super) fn decode_room_state(mut msg: Message) -> Message {
    let tags = &msg.tags;
    let state = RoomState {
        room_id: parse_string(tags.get("roomId")),
        broadcaster_lang: parse_string(tags.get("broadcasterLang")),
        emote_only: parse_optional_bool(tags.get("emoteOnly")),
        followers_only: parse_number(tags.get("followersOnly")),
        r9k: parse_optional_bool(tags.get("r9k")),
        slow: parse_number(tags.get("slow")),
        subs_only: parse_optional_bool(tags.get("subsOnly")),
    };
    msg.kind = MessageKind::RoomState(state);
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::parse_line;

    fn decode(line: &str) -> RoomState {
        match decode_room_state(parse_line(line, "me").unwrap()).kind {
            MessageKind::RoomState(state) => state,
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_full_room_state() {
        let state = decode(
            "@emote-only=0;followers-only=-1;r9k=0;room-id=1;slow=0;subs-only=1 :tmi.twitch.tv ROOMSTATE #c",
        );
        assert_eq!(state.emote_only, Some(false));
        assert_eq!(state.followers_only, Some(-1));
        assert_eq!(state.r9k, Some(false));
        assert_eq!(state.slow, Some(0));
        assert_eq!(state.subs_only, Some(true));
        assert_eq!(state.room_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_partial_update_does_not_invent_defaults() {
        let state = decode("@room-id=1;slow=10 :tmi.twitch.tv ROOMSTATE #c");
        assert_eq!(state.slow, Some(10));
        assert_eq!(state.emote_only, None);
        assert_eq!(state.subs_only, None);
        assert_eq!(state.followers_only, None);
    }

    #[test]
    fn test_merge() {
        let mut full = decode("@emote-only=1;slow=0;subs-only=0 :tmi.twitch.tv ROOMSTATE #c");
        full.merge(&decode("@slow=30 :tmi.twitch.tv ROOMSTATE #c"));
        assert_eq!(full.slow, Some(30));
        assert_eq!(full.emote_only, Some(true));
        assert_eq!(full.subs_only, Some(false));
    }
}

//! Decoders that specialize a generic [`Message`] into typed variants.
//!
//! Every decoder is a pure function taking the message by value and
//! returning a derived copy with `event` and `kind` filled in. Decoding is
//! total: anything not recognized comes back unchanged.
//!
//! ```
//! use tmi_chat::decode::decode;
//! use tmi_chat::message::{parse_line, MessageKind};
//!
//! let msg = parse_line("@msg-id=ban_success :tmi.twitch.tv NOTICE #chan :x is now banned", "me").unwrap();
//! let msg = decode(msg);
//! assert_eq!(msg.event, "BAN_SUCCESS");
//! assert!(matches!(msg.kind, MessageKind::Notice(_)));
//! ```

mod chat;
mod fields;
mod moderation;
mod room_state;
mod user_notice;
mod user_state;

pub use self::chat::ChatMessage;
pub use self::fields::{
    parse_badges, parse_bool, parse_emote_sets, parse_emotes, parse_number, Badges, EmoteSpan,
    Emotes,
};
pub use self::moderation::{
    notice_event_name, ClearChat, ClearMsg, HostTarget, Notice, UNRECOGNIZED_COMMAND,
};
pub use self::room_state::RoomState;
pub use self::user_notice::{Recipient, SubPlan, UserNotice, UserNoticeDetail};
pub use self::user_state::UserState;

use crate::message::Message;

/// Apply the decoder for `msg.command`.
pub fn decode(msg: Message) -> Message {
    match msg.command.as_str() {
        "PRIVMSG" => chat::decode_privmsg(msg),
        "WHISPER" => chat::decode_whisper(msg),
        "NOTICE" => moderation::decode_notice(msg),
        "USERNOTICE" => user_notice::decode_user_notice(msg),
        "ROOMSTATE" => room_state::decode_room_state(msg),
        "USERSTATE" => user_state::decode_user_state(msg),
        "GLOBALUSERSTATE" => user_state::decode_global_user_state(msg),
        "HOSTTARGET" => moderation::decode_host_target(msg),
        "CLEARCHAT" => moderation::decode_clear_chat(msg),
        "CLEARMSG" => moderation::decode_clear_msg(msg),
        "353" => moderation::decode_names(msg),
        _ => msg,
    }
}

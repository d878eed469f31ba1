//! USERNOTICE subtypes, keyed by the `msg-id` tag.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageKind, Tags};

use super::fields::{parse_badges, parse_emotes, parse_number, parse_string, Badges, Emotes};

/// A user-visible channel event such as a subscription or raid.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UserNotice {
    /// The `msg-id` tag this notice was decoded from.
    pub msg_id: String,
    /// Login of the user the event is about, when not anonymous.
    pub login: Option<String>,
    pub display_name: Option<String>,
    /// Text the relay renders for the event.
    pub system_msg: Option<String>,
    pub badges: Badges,
    pub emotes: Emotes,
    pub detail: UserNoticeDetail,
}

/// Subscription plan as sent by the relay: `Prime`, `1000`, `2000`, `3000`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubPlan {
    pub plan: Option<String>,
    pub plan_name: Option<String>,
}

/// Receiver of a gifted subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Recipient {
    pub id: Option<String>,
    pub login: Option<String>,
    pub display_name: Option<String>,
}

/// Subtype-specific fields.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum UserNoticeDetail {
    Subscription {
        cumulative_months: Option<u64>,
        streak_months: Option<u64>,
        plan: SubPlan,
    },
    Resubscription {
        cumulative_months: Option<u64>,
        streak_months: Option<u64>,
        plan: SubPlan,
    },
    SubGift {
        /// `false` for `anonsubgift`.
        named: bool,
        months: Option<u64>,
        gift_months: Option<u64>,
        recipient: Recipient,
        plan: SubPlan,
    },
    SubMysteryGift {
        named: bool,
        count: Option<u64>,
        sender_total: Option<u64>,
        plan: SubPlan,
    },
    GiftPaidUpgrade {
        /// `None` when the original gift was anonymous.
        gifter_login: Option<String>,
        gifter_name: Option<String>,
    },
    PrimePaidUpgrade {
        plan: SubPlan,
    },
    Raid {
        viewer_count: Option<u64>,
        login: Option<String>,
        display_name: Option<String>,
    },
    Unraid,
    Ritual {
        name: Option<String>,
    },
    BitsBadgeTier {
        threshold: Option<u64>,
    },
    Announcement {
        color: Option<String>,
    },
}

impl UserNoticeDetail {
    /// Event name emitted for this subtype.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Subscription { .. } => "SUBSCRIPTION",
            Self::Resubscription { .. } => "RESUB",
            Self::SubGift { named: true, .. } => "SUBGIFT",
            Self::SubGift { named: false, .. } => "ANONSUBGIFT",
            Self::SubMysteryGift { named: true, .. } => "SUBMYSTERYGIFT",
            Self::SubMysteryGift { named: false, .. } => "ANONSUBMYSTERYGIFT",
            Self::GiftPaidUpgrade {
                gifter_login: Some(_),
                ..
            } => "GIFTPAIDUPGRADE",
            Self::GiftPaidUpgrade { .. } => "ANONGIFTPAIDUPGRADE",
            Self::PrimePaidUpgrade { .. } => "PRIMEPAIDUPGRADE",
            Self::Raid { .. } => "RAID",
            Self::Unraid => "UNRAID",
            Self::Ritual { .. } => "RITUAL",
            Self::BitsBadgeTier { .. } => "BITSBADGETIER",
            Self::Announcement { .. } => "ANNOUNCEMENT",
        }
    }
}

fn sub_plan(tags: &Tags) -> SubPlan {
    SubPlan {
        plan: parse_string(tags.get("msgParamSubPlan")),
        plan_name: parse_string(tags.get("msgParamSubPlanName")),
    }
}

fn detail_for(msg_id: &str, tags: &Tags) -> Option<UserNoticeDetail> {
    let param = |key: &str| parse_string(tags.get(key));
    let number = |key: &str| parse_number::<u64>(tags.get(key));

    let detail = match msg_id {
        "sub" => UserNoticeDetail::Subscription {
            cumulative_months: number("msgParamCumulativeMonths"),
            streak_months: number("msgParamStreakMonths"),
            plan: sub_plan(tags),
        },
        "resub" => UserNoticeDetail::Resubscription {
            cumulative_months: number("msgParamCumulativeMonths"),
            streak_months: number("msgParamStreakMonths"),
            plan: sub_plan(tags),
        },
        "subgift" | "anonsubgift" => UserNoticeDetail::SubGift {
            named: msg_id == "subgift",
            months: number("msgParamMonths"),
            gift_months: number("msgParamGiftMonths"),
            recipient: Recipient {
                id: param("msgParamRecipientId"),
                login: param("msgParamRecipientUserName").map(|l| l.to_lowercase()),
                display_name: param("msgParamRecipientDisplayName"),
            },
            plan: sub_plan(tags),
        },
        "submysterygift" | "anonsubmysterygift" => UserNoticeDetail::SubMysteryGift {
            named: msg_id == "submysterygift",
            count: number("msgParamMassGiftCount"),
            sender_total: number("msgParamSenderCount"),
            plan: sub_plan(tags),
        },
        "giftpaidupgrade" => UserNoticeDetail::GiftPaidUpgrade {
            gifter_login: param("msgParamSenderLogin"),
            gifter_name: param("msgParamSenderName"),
        },
        "anongiftpaidupgrade" => UserNoticeDetail::GiftPaidUpgrade {
            gifter_login: None,
            gifter_name: None,
        },
        "primepaidupgrade" => UserNoticeDetail::PrimePaidUpgrade {
            plan: sub_plan(tags),
        },
        "raid" => UserNoticeDetail::Raid {
            viewer_count: number("msgParamViewerCount"),
            login: param("msgParamLogin").map(|l| l.to_lowercase()),
            display_name: param("msgParamDisplayName"),
        },
        "unraid" => UserNoticeDetail::Unraid,
        "ritual" => UserNoticeDetail::Ritual {
            name: param("msgParamRitualName"),
        },
        "bitsbadgetier" => UserNoticeDetail::BitsBadgeTier {
            threshold: number("msgParamThreshold"),
        },
        "announcement" => UserNoticeDetail::Announcement {
            color: param("msgParamColor"),
        },
        _ => return None,
    };
    Some(detail)
}

/// Decode a USERNOTICE. An unknown or missing `msg-id` returns the message
/// unchanged.
pub(super) fn decode_user_notice(mut msg: Message) -> Message {
    let Some(msg_id) = msg.msg_id().map(str::to_string) else {
        return msg;
    };
    let Some(detail) = detail_for(&msg_id, &msg.tags) else {
        tracing::trace!(msg_id = %msg_id, "unrecognized user notice");
        return msg;
    };

    let tags = &msg.tags;
    let notice = UserNotice {
        login: parse_string(tags.get("login")).map(|l| l.to_lowercase()),
        display_name: parse_string(tags.get("displayName")),
        system_msg: parse_string(tags.get("systemMsg")),
        badges: tags.get("badges").map(parse_badges).unwrap_or_default(),
        emotes: tags.get("emotes").map(parse_emotes).unwrap_or_default(),
        msg_id,
        detail,
    };
    msg.event = notice.detail.event_name().to_string();
    msg.kind = MessageKind::UserNotice(Box::new(notice));
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::parse_line;

    fn decode(line: &str) -> Message {
        decode_user_notice(parse_line(line, "me").unwrap())
    }

    fn detail(msg: &Message) -> &UserNoticeDetail {
        match &msg.kind {
            MessageKind::UserNotice(notice) => &notice.detail,
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_resub() {
        let msg = decode("@login=Fan;msg-id=resub;msg-param-cumulative-months=6;msg-param-streak-months=2;msg-param-sub-plan=Prime;msg-param-sub-plan-name=Prime;system-msg=Fan\\ssubscribed :tmi.twitch.tv USERNOTICE #c :Great stream");
        assert_eq!(msg.event, "RESUB");
        assert_eq!(msg.message.as_deref(), Some("Great stream"));
        match detail(&msg) {
            UserNoticeDetail::Resubscription {
                cumulative_months,
                streak_months,
                plan,
            } => {
                assert_eq!(*cumulative_months, Some(6));
                assert_eq!(*streak_months, Some(2));
                assert_eq!(plan.plan.as_deref(), Some("Prime"));
            }
            other => panic!("unexpected detail {:?}", other),
        }
        let MessageKind::UserNotice(notice) = &msg.kind else {
            unreachable!()
        };
        assert_eq!(notice.login.as_deref(), Some("fan"));
        assert_eq!(notice.system_msg.as_deref(), Some("Fan subscribed"));
    }

    #[test]
    fn test_subgift_recipient() {
        let msg = decode("@login=giver;msg-id=subgift;msg-param-months=1;msg-param-recipient-display-name=Lucky;msg-param-recipient-id=55;msg-param-recipient-user-name=Lucky;msg-param-sub-plan=1000 :tmi.twitch.tv USERNOTICE #c");
        assert_eq!(msg.event, "SUBGIFT");
        match detail(&msg) {
            UserNoticeDetail::SubGift {
                named, recipient, ..
            } => {
                assert!(named);
                assert_eq!(recipient.login.as_deref(), Some("lucky"));
                assert_eq!(recipient.id.as_deref(), Some("55"));
            }
            other => panic!("unexpected detail {:?}", other),
        }

        let msg = decode("@msg-id=anonsubgift;msg-param-recipient-user-name=x :tmi.twitch.tv USERNOTICE #c");
        assert_eq!(msg.event, "ANONSUBGIFT");
    }

    #[test]
    fn test_raid_and_ritual() {
        let msg = decode("@msg-id=raid;msg-param-displayName=Raider;msg-param-login=raider;msg-param-viewerCount=15 :tmi.twitch.tv USERNOTICE #c");
        assert_eq!(msg.event, "RAID");
        // camelCase tags on the wire keep their case
        assert!(msg.tags.contains("msgParamViewerCount"));

        let msg = decode("@msg-id=ritual;msg-param-ritual-name=new_chatter :tmi.twitch.tv USERNOTICE #c :HeyGuys");
        assert_eq!(msg.event, "RITUAL");
        assert_eq!(
            detail(&msg),
            &UserNoticeDetail::Ritual {
                name: Some("new_chatter".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_msg_id_falls_through() {
        let original = parse_line("@msg-id=brand_new_thing :tmi.twitch.tv USERNOTICE #c", "me").unwrap();
        let decoded = decode_user_notice(original.clone());
        assert_eq!(decoded, original);
        assert_eq!(decoded.event, "USERNOTICE");
    }
}

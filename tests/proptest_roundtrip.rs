//! Property-based tests for line parsing.
//!
//! Uses proptest to generate relay-shaped lines and verify that:
//! 1. Batches keep one slot per non-blank line, in order
//! 2. Command and parameters survive a serialize/reparse cycle
//! 3. Tag values survive escaping
//! 4. Anonymous logins are always recognized as anonymous

use proptest::prelude::*;
use tmi_chat::message::tags::{escape_tag_value, unescape_tag_value};
use tmi_chat::util::{anonymous_username, is_user_anonymous, split_message};
use tmi_chat::{parse_batch, parse_line};

// =============================================================================
// STRATEGIES - Generators for relay line components
// =============================================================================

/// Login: lowercase letters, digits and underscores.
fn login_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{2,24}").expect("valid regex")
}

fn channel_strategy() -> impl Strategy<Value = String> {
    login_strategy().prop_map(|login| format!("#{}", login))
}

/// Chat text without CR/LF (which would split the line)
fn message_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,400}").expect("valid regex")
}

/// Middle parameter: no spaces, no leading colon
fn middle_param_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9#=*_\\-]{1,20}").expect("valid regex")
}

fn command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("PRIVMSG".to_string()),
        Just("NOTICE".to_string()),
        Just("JOIN".to_string()),
        Just("ROOMSTATE".to_string()),
        Just("USERNOTICE".to_string()),
        prop::string::string_regex("[0-9]{3}").expect("valid regex"),
    ]
}

/// A single well-formed line: optional tags and prefix, command, params.
fn line_strategy() -> impl Strategy<Value = String> {
    (
        prop::option::of(("[a-z][a-z\\-]{0,12}", "[a-zA-Z0-9]{0,12}")),
        prop::option::of(login_strategy()),
        command_strategy(),
        prop::collection::vec(middle_param_strategy(), 0..4),
        prop::option::of(message_text_strategy()),
    )
        .prop_map(|(tag, login, command, params, trailing)| {
            let mut line = String::new();
            if let Some((key, value)) = tag {
                line.push_str(&format!("@{}={} ", key, value));
            }
            if let Some(login) = login {
                line.push_str(&format!(":{0}!{0}@{0}.tmi.twitch.tv ", login));
            }
            line.push_str(&command);
            for param in params {
                line.push(' ');
                line.push_str(&param);
            }
            if let Some(text) = trailing {
                line.push_str(" :");
                line.push_str(&text);
            }
            line
        })
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn batch_preserves_order_and_length(
        lines in prop::collection::vec(line_strategy(), 0..8),
        crlf in any::<bool>(),
    ) {
        let sep = if crlf { "\r\n" } else { "\n" };
        let payload = lines.join(sep);
        let batch = parse_batch(&payload, "me");

        prop_assert_eq!(batch.len(), lines.len());
        for (result, line) in batch.iter().zip(&lines) {
            let msg = result.as_ref().expect("well-formed line");
            prop_assert_eq!(&msg.raw, line);
        }
    }

    #[test]
    fn command_and_params_round_trip(line in line_strategy()) {
        let msg = parse_line(&line, "me").expect("well-formed line");
        let reparsed = parse_line(&msg.to_command_line(), "me").expect("serialized line");

        prop_assert_eq!(&reparsed.command, &msg.command);
        prop_assert_eq!(&reparsed.params, &msg.params);
    }

    #[test]
    fn channel_is_normalized(channel in channel_strategy(), upper in any::<bool>()) {
        let wire = if upper { channel.to_uppercase() } else { channel.clone() };
        let msg = parse_line(&format!(":tmi.twitch.tv ROOMSTATE {}", wire), "me").unwrap();
        prop_assert_eq!(msg.channel, channel);
    }

    #[test]
    fn tag_value_escape_round_trip(value in "[^\0]{0,64}") {
        let mut escaped = String::new();
        escape_tag_value(&mut escaped, &value).unwrap();
        prop_assert!(!escaped.contains(' '));
        prop_assert!(!escaped.contains(';'));
        prop_assert_eq!(unescape_tag_value(&escaped), value);
    }

    #[test]
    fn split_message_never_exceeds_limit(text in message_text_strategy(), limit in 1usize..120) {
        let mut rest = Some(text.as_str());
        while let Some(chunk) = rest {
            let (head, tail) = split_message(chunk, limit);
            prop_assert!(head.chars().count() <= limit);
            if let Some(tail) = tail {
                prop_assert!(tail.len() < chunk.len());
            }
            rest = tail.filter(|t| !t.is_empty());
        }
    }
}

#[test]
fn anonymous_usernames_are_recognized() {
    for _ in 0..1_000 {
        let name = anonymous_username();
        assert!(is_user_anonymous(&name), "{}", name);
    }
}

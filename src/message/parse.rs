//! Turning raw transport payloads into [`Message`] records.

use chrono::{DateTime, Utc};

use crate::error::{ChatError, MessageParseError};
use crate::prefix::{Prefix, SYSTEM_HOST};
use crate::util::normalize_channel;

use super::nom_parser::RawMessage;
use super::tags::Tags;
use super::types::{Message, MessageKind};

/// Parse a transport payload that may hold several lines.
///
/// Lines may end in `\n` or `\r\n`; empty lines are dropped. There is one
/// result per remaining line, in input order. A malformed line yields an
/// error in its slot and never affects its siblings.
pub fn parse_batch(raw: &str, own_username: &str) -> Vec<Result<Message, ChatError>> {
    raw.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            parse_line(line, own_username).map_err(|cause| ChatError::Parse {
                line: line.to_string(),
                cause,
            })
        })
        .collect()
}

/// Parse a single line.
///
/// `own_username` is compared, lowercased, against the resolved login to
/// set [`Message::is_self`].
pub fn parse_line(line: &str, own_username: &str) -> Result<Message, MessageParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let raw = RawMessage::parse(line)?;

    let tags = raw.tags.map(Tags::parse).unwrap_or_default();
    let prefix = raw.prefix.map(Prefix::parse);
    let timestamp = resolve_timestamp(&tags);
    let username = resolve_username(prefix.as_ref(), &tags);
    let is_self = username
        .as_deref()
        .map_or(false, |u| u == own_username.to_lowercase());
    let channel = raw
        .params
        .iter()
        .find(|p| p.starts_with('#'))
        .map(|c| normalize_channel(c))
        .unwrap_or_default();
    let command = raw.command.to_ascii_uppercase();

    Ok(Message {
        raw: line.to_string(),
        timestamp,
        event: command.clone(),
        command,
        channel,
        username,
        is_self,
        tags,
        message: raw.trailing.map(str::to_string),
        params: raw.all_params().into_iter().map(str::to_string).collect(),
        prefix,
        kind: MessageKind::Generic,
    })
}

fn resolve_timestamp(tags: &Tags) -> DateTime<Utc> {
    tags.get("tmiSentTs")
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

/// First non-empty of host, prefix name, prefix user, `login`, `username`,
/// `displayName`. A user host (`nick.tmi.twitch.tv`) contributes its first
/// label; the relay's own host is kept verbatim.
fn resolve_username(prefix: Option<&Prefix>, tags: &Tags) -> Option<String> {
    let from_host = prefix.and_then(|p| p.host.as_deref()).map(|host| {
        if host == SYSTEM_HOST {
            host.to_string()
        } else {
            host.split('.').next().unwrap_or(host).to_lowercase()
        }
    });

    from_host
        .into_iter()
        .chain(prefix.and_then(|p| p.name.as_deref()).map(str::to_lowercase))
        .chain(prefix.and_then(|p| p.user.as_deref()).map(str::to_lowercase))
        .chain(
            ["login", "username", "displayName"]
                .iter()
                .filter_map(|key| tags.get(key))
                .map(str::to_lowercase),
        )
        .find(|candidate| !candidate.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVMSG: &str = "@badge-info=;badges=broadcaster/1;color=#0D4200;display-name=Ronni;emotes=25:0-4;mod=0;tmi-sent-ts=1507246572675;user-id=1337 :ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #Ronni :Kappa Keepo";

    #[test]
    fn test_privmsg_fields() {
        let msg = parse_line(PRIVMSG, "Ronni").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.event, "PRIVMSG");
        assert_eq!(msg.channel, "#ronni");
        assert_eq!(msg.username.as_deref(), Some("ronni"));
        assert!(msg.is_self);
        assert_eq!(msg.message.as_deref(), Some("Kappa Keepo"));
        assert_eq!(msg.params, vec!["#Ronni", "Kappa Keepo"]);
        assert_eq!(msg.tags.get("displayName"), Some("Ronni"));
        assert_eq!(msg.timestamp.timestamp_millis(), 1507246572675);
        assert_eq!(msg.kind, MessageKind::Generic);
    }

    #[test]
    fn test_wildcard_channel_is_empty() {
        let msg = parse_line(":tmi.twitch.tv NOTICE * :Login authentication failed", "u").unwrap();
        assert_eq!(msg.channel, "");
        assert_eq!(msg.username.as_deref(), Some("tmi.twitch.tv"));
        assert!(!msg.is_self);
    }

    #[test]
    fn test_malformed_timestamp_falls_back() {
        let before = Utc::now();
        let msg = parse_line("@tmi-sent-ts=soon PING :tmi.twitch.tv", "u").unwrap();
        assert!(msg.timestamp >= before);
    }

    #[test]
    fn test_username_from_tags_without_prefix() {
        let msg = parse_line("@login=SomeOne;display-name=Other USERNOTICE #c", "u").unwrap();
        assert_eq!(msg.username.as_deref(), Some("someone"));

        let msg = parse_line("@display-name=Shown USERNOTICE #c", "u").unwrap();
        assert_eq!(msg.username.as_deref(), Some("shown"));

        let msg = parse_line("PING", "u").unwrap();
        assert_eq!(msg.username, None);
        assert!(msg.tags.is_empty());
        assert_eq!(msg.message, None);
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_errors() {
        let batch = "PING :a\r\n\r\n:bad\nJOIN #x\n\n";
        let results = parse_batch(batch, "u");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().command, "PING");
        assert!(results[1].as_ref().unwrap_err().is_parse());
        assert_eq!(results[2].as_ref().unwrap().channel, "#x");
    }

    #[test]
    fn test_command_line_round_trip() {
        let msg = parse_line(PRIVMSG, "x").unwrap();
        assert_eq!(msg.to_command_line(), "PRIVMSG #Ronni :Kappa Keepo");

        let msg = parse_line(":a!a@a.tmi.twitch.tv JOIN #chan", "x").unwrap();
        assert_eq!(msg.to_command_line(), "JOIN #chan");
    }
}

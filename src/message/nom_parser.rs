//! Nom-based wire line tokenizer.
//!
//! Splits one line into borrowed tags, prefix, command and parameters. No
//! interpretation happens here; that is the job of [`super::parse`] and the
//! decoders.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::{context, VerboseError, VerboseErrorKind},
    sequence::preceded,
    IResult,
};

use crate::error::MessageParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Parse message tags (the part after `@` and before the first space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context("parsing message tags", preceded(char('@'), take_until(" ")))(input)
}

/// Parse message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message prefix",
        preceded(char(':'), take_while1(|c| c != ' ')),
    )(input)
}

/// Parse the command name (alphanumeric, covers numerics like `353`).
fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRC command",
        take_while1(|c: char| c.is_ascii_alphanumeric()),
    )(input)
}

/// Tokenize a complete line.
///
/// ```text
/// [@tags] [:prefix] <command> [params...] [:trailing]
/// ```
pub fn parse_message(input: &str) -> ParseResult<&str, RawMessage<'_>> {
    let (input, tags) = context("parsing optional tags", opt(parse_tags))(input)?;
    let (input, _) = space0(input)?;

    let (input, prefix) = context("parsing optional prefix", opt(parse_prefix))(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = context("parsing required command", parse_command)(input)?;

    let mut params: Vec<&str> = Vec::new();
    let mut trailing = None;
    let mut rest = input;

    while let Some(b' ') = rest.as_bytes().first().copied() {
        rest = &rest[1..];

        if let Some(b':') = rest.as_bytes().first().copied() {
            let after_colon = &rest[1..];
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            trailing = Some(&after_colon[..end]);
            rest = &after_colon[end..];
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        let param = &rest[..end];
        if param.is_empty() {
            // Runs of spaces between middle parameters are tolerated.
            continue;
        }
        params.push(param);
        rest = &rest[end..];
    }

    Ok((
        rest,
        RawMessage {
            tags,
            prefix,
            command,
            params,
            trailing,
        },
    ))
}

/// A tokenized line with borrowed string slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command name.
    pub command: &'a str,
    /// Middle parameters.
    pub params: Vec<&'a str>,
    /// The final `:` parameter, which may contain spaces.
    pub trailing: Option<&'a str>,
}

impl<'a> RawMessage<'a> {
    /// Tokenize a line into a `RawMessage`.
    pub fn parse(input: &'a str) -> Result<Self, MessageParseError> {
        if input.trim().is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        match parse_message(input) {
            Ok((_remaining, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                // Innermost context wins; positions are measured from the start.
                let mut position = input.len();
                let mut context_info = "parsing message";
                for (error_input, error_kind) in &e.errors {
                    position = input.len() - error_input.len();
                    if let VerboseErrorKind::Context(ctx) = error_kind {
                        context_info = *ctx;
                        break;
                    }
                }
                Err(MessageParseError::ParseContext {
                    position,
                    context: context_info.to_string(),
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(MessageParseError::InvalidCommand),
        }
    }

    /// All parameters in wire order, the trailing one last.
    pub fn all_params(&self) -> Vec<&'a str> {
        let mut all = self.params.clone();
        all.extend(self.trailing);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_command() {
        let msg = RawMessage::parse("PING").unwrap();
        assert_eq!(msg.command, "PING");
        assert!(msg.tags.is_none());
        assert!(msg.prefix.is_none());
        assert!(msg.params.is_empty());
        assert!(msg.trailing.is_none());
    }

    #[test]
    fn test_parse_command_with_params() {
        let msg = RawMessage::parse("PRIVMSG #channel :Hello, world!").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#channel"]);
        assert_eq!(msg.trailing, Some("Hello, world!"));
        assert_eq!(msg.all_params(), vec!["#channel", "Hello, world!"]);
    }

    #[test]
    fn test_parse_with_prefix() {
        let msg = RawMessage::parse(":nick!user@host PRIVMSG #channel :Hello").unwrap();
        assert_eq!(msg.prefix, Some("nick!user@host"));
        assert_eq!(msg.command, "PRIVMSG");
    }

    #[test]
    fn test_parse_with_tags() {
        let msg =
            RawMessage::parse("@badges=;color=#FF0000 :nick!nick@nick.tmi.twitch.tv PRIVMSG #ch :Hi")
                .unwrap();
        assert_eq!(msg.tags, Some("badges=;color=#FF0000"));
        assert_eq!(msg.prefix, Some("nick!nick@nick.tmi.twitch.tv"));
        assert_eq!(msg.trailing, Some("Hi"));
    }

    #[test]
    fn test_parse_with_crlf() {
        let msg = RawMessage::parse("PING :tmi.twitch.tv\r\n").unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.trailing, Some("tmi.twitch.tv"));
    }

    #[test]
    fn test_parse_numeric_names_reply() {
        let msg = RawMessage::parse(":me.tmi.twitch.tv 353 me = #chan :alice bob").unwrap();
        assert_eq!(msg.command, "353");
        assert_eq!(msg.params, vec!["me", "=", "#chan"]);
        assert_eq!(msg.trailing, Some("alice bob"));
    }

    #[test]
    fn test_parse_empty_trailing() {
        let msg = RawMessage::parse("PRIVMSG #channel :").unwrap();
        assert_eq!(msg.trailing, Some(""));
    }

    #[test]
    fn test_missing_command_is_error() {
        let err = RawMessage::parse(":prefix.only").unwrap_err();
        assert!(matches!(err, MessageParseError::ParseContext { .. }));

        let err = RawMessage::parse("@a=b").unwrap_err();
        assert!(matches!(err, MessageParseError::ParseContext { .. }));
    }

    #[test]
    fn test_blank_is_empty_message() {
        assert_eq!(
            RawMessage::parse("   ").unwrap_err(),
            MessageParseError::EmptyMessage
        );
    }
}

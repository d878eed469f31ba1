//! Helpers for usernames, channels, tokens and outgoing text.

use rand::Rng;

/// Prefix of the logins the relay hands out to anonymous readers.
pub const ANONYMOUS_PREFIX: &str = "justinfan";

/// Longest chat message the relay accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Whether `username` is an anonymous login: `justinfan` followed by digits.
///
/// ```
/// use tmi_chat::util::is_user_anonymous;
///
/// assert!(is_user_anonymous("justinfan12345"));
/// assert!(!is_user_anonymous("justinfan"));
/// assert!(!is_user_anonymous("justinfanx1"));
/// ```
pub fn is_user_anonymous(username: &str) -> bool {
    match username.strip_prefix(ANONYMOUS_PREFIX) {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Generate a random anonymous login.
pub fn anonymous_username() -> String {
    let n: u32 = rand::thread_rng().gen_range(1000..80000);
    format!("{}{}", ANONYMOUS_PREFIX, n)
}

/// Lowercase a channel name and ensure the leading `#`.
///
/// The wildcard `*` and empty input normalize to the empty string.
pub fn normalize_channel(channel: &str) -> String {
    let trimmed = channel.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with('#') {
        lower
    } else {
        format!("#{}", lower)
    }
}

/// Lowercase a login and strip a leading `#` or `@`.
pub fn normalize_username(username: &str) -> String {
    username
        .trim()
        .trim_start_matches(['#', '@'])
        .to_lowercase()
}

/// Ensure a token carries the `oauth:` prefix expected by `PASS`.
pub fn normalize_token(token: &str) -> String {
    let token = token.trim();
    if token.to_ascii_lowercase().starts_with("oauth:") {
        token.to_string()
    } else {
        format!("oauth:{}", token)
    }
}

/// Truncates a string to at most `max_chars` characters.
#[inline]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Split text that exceeds `max_chars` into a head that fits and the rest.
///
/// The split prefers the last space inside the limit so words stay whole.
pub fn split_message(text: &str, max_chars: usize) -> (&str, Option<&str>) {
    let head = truncate_chars(text, max_chars);
    if head.len() == text.len() {
        return (text, None);
    }
    match head.rfind(' ') {
        Some(idx) if idx > 0 => (&text[..idx], Some(text[idx + 1..].trim_start())),
        _ => (head, Some(&text[head.len()..])),
    }
}

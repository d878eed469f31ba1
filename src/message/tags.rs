//! Message tag decoding.
//!
//! Tags arrive as `key=value;key=value` with IRCv3 escapes in the values.
//! Keys are stored camel-cased (`display-name` becomes `displayName`) with
//! the unescaped value as a string; typed interpretation is left to
//! [`crate::decode`].

use std::collections::BTreeMap;
use std::fmt::{Result as FmtResult, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Escape a tag value for serialization.
///
/// Escapes special characters using the IRCv3 message-tags escape table.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
///
/// Reverses the escaping applied by [`escape_tag_value`].
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

/// Convert a dashed tag key to camel case: `tmi-sent-ts` -> `tmiSentTs`.
pub fn camel_case_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '-' || c == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Decoded tag mapping, keyed by camel-cased name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Create an empty tag mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw tag section (without the leading `@`).
    ///
    /// Keys without `=` map to the empty string; a repeated key keeps the
    /// last value.
    pub fn parse(raw: &str) -> Self {
        let mut map = BTreeMap::new();
        for pair in raw.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, unescape_tag_value(v)),
                None => (pair, String::new()),
            };
            map.insert(camel_case_key(key), value);
        }
        Self(map)
    }

    /// Raw string value of a tag.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of a tag if present and non-empty.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Whether a tag is present at all.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace a tag value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no tags are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

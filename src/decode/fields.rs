//! Typed interpretation of individual tag values.

use std::collections::BTreeMap;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Badge code mapped to its integer version.
pub type Badges = BTreeMap<String, u32>;

/// Emote id mapped to the character spans it occupies.
pub type Emotes = BTreeMap<String, Vec<EmoteSpan>>;

/// Inclusive character range of one emote occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EmoteSpan {
    pub start: usize,
    pub end: usize,
}

/// `"1"` is true; anything else, including absence, is false.
pub fn parse_bool(value: Option<&str>) -> bool {
    value == Some("1")
}

/// Like [`parse_bool`] but keeps absence distinct from false.
pub fn parse_optional_bool(value: Option<&str>) -> Option<bool> {
    value.map(|v| v == "1")
}

/// Numeric tag value; absent, empty or non-numeric input yields `None`.
pub fn parse_number<T: FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Non-empty string tag value.
pub fn parse_string(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Parse `code/version,code/version`.
///
/// Entries whose version is not an integer are skipped.
///
/// ```
/// use tmi_chat::decode::parse_badges;
///
/// let badges = parse_badges("admin/1,subscriber/9");
/// assert_eq!(badges.get("admin"), Some(&1));
/// assert_eq!(badges.get("subscriber"), Some(&9));
/// ```
pub fn parse_badges(value: &str) -> Badges {
    value
        .split(',')
        .filter_map(|entry| {
            let (code, version) = entry.split_once('/')?;
            if code.is_empty() {
                return None;
            }
            let version = version.parse().ok()?;
            Some((code.to_string(), version))
        })
        .collect()
}

/// Parse `id:start-end,start-end/id:start-end`.
///
/// ```
/// use tmi_chat::decode::{parse_emotes, EmoteSpan};
///
/// let emotes = parse_emotes("25:0-4,12-16");
/// assert_eq!(
///     emotes["25"],
///     vec![EmoteSpan { start: 0, end: 4 }, EmoteSpan { start: 12, end: 16 }]
/// );
/// ```
pub fn parse_emotes(value: &str) -> Emotes {
    let mut emotes = Emotes::new();
    for group in value.split('/').filter(|g| !g.is_empty()) {
        let Some((id, ranges)) = group.split_once(':') else {
            continue;
        };
        let spans: Vec<EmoteSpan> = ranges
            .split(',')
            .filter_map(|range| {
                let (start, end) = range.split_once('-')?;
                Some(EmoteSpan {
                    start: start.parse().ok()?,
                    end: end.parse().ok()?,
                })
            })
            .collect();
        if !spans.is_empty() {
            emotes.entry(id.to_string()).or_default().extend(spans);
        }
    }
    emotes
}

/// Parse a comma-separated emote-set list.
pub fn parse_emote_sets(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool() {
        assert!(parse_bool(Some("1")));
        assert!(!parse_bool(Some("0")));
        assert!(!parse_bool(Some("")));
        assert!(!parse_bool(None));
        assert_eq!(parse_optional_bool(None), None);
        assert_eq!(parse_optional_bool(Some("0")), Some(false));
    }

    #[test]
    fn test_number() {
        assert_eq!(parse_number::<u64>(Some("42")), Some(42));
        assert_eq!(parse_number::<u64>(Some("")), None);
        assert_eq!(parse_number::<u64>(Some("NaN")), None);
        assert_eq!(parse_number::<i64>(Some("-1")), Some(-1));
        assert_eq!(parse_number::<u64>(None), None);
    }

    #[test]
    fn test_badges() {
        let badges = parse_badges("admin/1,subscriber/9");
        assert_eq!(badges.len(), 2);
        assert_eq!(badges["admin"], 1);
        assert_eq!(badges["subscriber"], 9);

        assert!(parse_badges("").is_empty());
        let badges = parse_badges("predictions/blue-1,moderator/1,broken");
        assert_eq!(badges.len(), 1);
        assert_eq!(badges["moderator"], 1);
    }

    #[test]
    fn test_emotes() {
        let emotes = parse_emotes("25:0-4,12-16/1902:6-10");
        assert_eq!(emotes.len(), 2);
        assert_eq!(
            emotes["25"],
            vec![EmoteSpan { start: 0, end: 4 }, EmoteSpan { start: 12, end: 16 }]
        );
        assert_eq!(emotes["1902"], vec![EmoteSpan { start: 6, end: 10 }]);
        assert!(parse_emotes("").is_empty());
        assert!(parse_emotes("25:x-y").is_empty());
    }

    #[test]
    fn test_emote_sets() {
        assert_eq!(parse_emote_sets("0,33,50"), vec!["0", "33", "50"]);
        assert!(parse_emote_sets("").is_empty());
    }
}

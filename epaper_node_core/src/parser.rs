//! Decoding of form-encoded `key=value` payloads into display items.

use log::*;

use crate::content::{DisplayItem, DisplayItemSet};

/// Separator between pairs when none is configured.
pub const DEFAULT_SEPARATOR: char = '&';

const KEY_VALUE_DELIMITER: char = '=';

/// Splits payloads such as `Name:=Shop&Temp:=60` into an ordered item set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentParser {
    separator: char,
}

impl Default for ContentParser {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl ContentParser {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Parses a payload into a fresh item set.
    ///
    /// The payload ends at its first NUL byte. Tokens without `=` are dropped,
    /// keys and values are truncated to their field capacity, and pairs past
    /// the set capacity are ignored. Never fails.
    pub fn parse(&self, payload: &[u8]) -> DisplayItemSet {
        let end = payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(payload.len());
        let text = String::from_utf8_lossy(&payload[..end]);

        let mut items = DisplayItemSet::new();
        for token in text.split(self.separator) {
            let Some((key, value)) = token.split_once(KEY_VALUE_DELIMITER) else {
                if !token.is_empty() {
                    debug!("Dropping token without '=': {:?}", token);
                }
                continue;
            };

            if !items.push(DisplayItem::new(key, value)) {
                debug!("Item capacity reached, ignoring remaining pairs");
                break;
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ITEM_CAPACITY, KEY_CAPACITY, VALUE_CAPACITY};
    use proptest::prelude::*;

    fn pairs(items: &DisplayItemSet) -> Vec<(String, String)> {
        items
            .iter()
            .map(|item| (item.key().to_string(), item.value().to_string()))
            .collect()
    }

    #[test]
    fn test_order_is_preserved() {
        let items = ContentParser::default().parse(b"Name:=Test&Temp:=200");
        assert_eq!(
            pairs(&items),
            vec![
                ("Name:".to_string(), "Test".to_string()),
                ("Temp:".to_string(), "200".to_string()),
            ]
        );
    }

    #[test]
    fn test_splits_on_first_equals() {
        let items = ContentParser::default().parse(b"expr=a=b");
        assert_eq!(items.headline().unwrap().key(), "expr");
        assert_eq!(items.headline().unwrap().value(), "a=b");
    }

    #[test]
    fn test_malformed_tokens_are_dropped() {
        let items = ContentParser::default().parse(b"junk&&Name:=Shop&also junk&=bare&");
        assert_eq!(
            pairs(&items),
            vec![
                ("Name:".to_string(), "Shop".to_string()),
                (String::new(), "bare".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_payload() {
        assert!(ContentParser::default().parse(b"").is_empty());
        assert!(ContentParser::default().parse(b"\0Name:=Shop").is_empty());
    }

    #[test]
    fn test_stops_at_capacity() {
        let items = ContentParser::default().parse(b"a=1&b=2&c=3&d=4&e=5&f=6");
        assert_eq!(items.len(), ITEM_CAPACITY);
        assert_eq!(items.iter().last().unwrap().key(), "d");
    }

    #[test]
    fn test_ignores_bytes_after_nul() {
        let items = ContentParser::default().parse(b"a=1\0b=2");
        assert_eq!(pairs(&items), vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_oversized_fields_are_truncated() {
        let payload = b"ThisKeyIsWayTooLongToFit=ok&k=ThisValueIsLongerThanTwentyFourBytes";
        let items = ContentParser::default().parse(payload);
        let first = items.headline().unwrap();
        assert_eq!(first.key(), "ThisKeyIsWayTooL");
        assert_eq!(first.value(), "ok");
        let second = &items.rows()[0];
        assert_eq!(second.key(), "k");
        assert_eq!(second.value(), "ThisValueIsLongerThanTwe");
    }

    #[test]
    fn test_custom_separator() {
        let items = ContentParser::new(';').parse(b"a=1;b=2&c=3");
        assert_eq!(
            pairs(&items),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2&c=3".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let items = ContentParser::default().parse(b"T\xffmp=1");
        assert_eq!(items.len(), 1);
        assert_eq!(items.headline().unwrap().value(), "1");
    }

    proptest! {
        #[test]
        fn prop_parse_is_idempotent(payload in proptest::collection::vec(any::<u8>(), 0..300)) {
            let parser = ContentParser::default();
            prop_assert_eq!(parser.parse(&payload), parser.parse(&payload));
        }

        #[test]
        fn prop_fields_never_exceed_capacity(
            key in "[A-Za-z0-9:]{0,40}",
            value in "[ -%'-<>-~]{0,60}",
        ) {
            let payload = format!("{}={}", key, value);
            let items = ContentParser::default().parse(payload.as_bytes());
            prop_assert_eq!(items.len(), 1);

            let item = items.headline().unwrap();
            prop_assert!(item.key().len() <= KEY_CAPACITY);
            prop_assert!(item.value().len() <= VALUE_CAPACITY);
            prop_assert!(key.starts_with(item.key()));
            prop_assert!(value.starts_with(item.value()));
        }

        #[test]
        fn prop_item_count_is_bounded(count in 0usize..12) {
            let payload = (0..count)
                .map(|i| format!("k{}=v{}", i, i))
                .collect::<Vec<_>>()
                .join("&");
            let items = ContentParser::default().parse(payload.as_bytes());
            prop_assert_eq!(items.len(), count.min(ITEM_CAPACITY));
        }
    }
}

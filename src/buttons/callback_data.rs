//! Callback data codec: `prefix:id` or `prefix:id:answer`.

use std::fmt;

/// Decoded callback data of a registered button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackData {
    pub prefix: String,
    pub id: String,
    /// Yes/No answer of a confirmation round, None on first press.
    pub answer: Option<bool>,
}

impl CallbackData {
    pub const DELIMITER: char = ':';

    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse raw callback data. Anything that is not exactly two or three
    /// parts with a `1`/`0` answer is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(Self::DELIMITER);
        let prefix = parts.next().filter(|p| !p.is_empty())?;
        let id = parts.next().filter(|i| !i.is_empty())?;
        let answer = match parts.next() {
            None => None,
            Some("1") => Some(true),
            Some("0") => Some(false),
            Some(_) => return None,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            prefix: prefix.to_string(),
            id: id.to_string(),
            answer,
        })
    }

    /// The prefix of raw callback data, without validating the rest.
    pub fn prefix_of(raw: &str) -> &str {
        raw.split(Self::DELIMITER).next().unwrap_or_default()
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, Self::DELIMITER, self.id)?;
        match self.answer {
            Some(true) => write!(f, "{}1", Self::DELIMITER),
            Some(false) => write!(f, "{}0", Self::DELIMITER),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(answer: Option<bool>) -> CallbackData {
        CallbackData {
            prefix: "p".to_string(),
            id: "42".to_string(),
            answer,
        }
    }

    #[test]
    fn test_encode() {
        assert_eq!(data(None).encode(), "p:42");
        assert_eq!(data(Some(true)).encode(), "p:42:1");
        assert_eq!(data(Some(false)).encode(), "p:42:0");
    }

    #[test]
    fn test_parse() {
        assert_eq!(CallbackData::parse("p:42"), Some(data(None)));
        assert_eq!(CallbackData::parse("p:42:1"), Some(data(Some(true))));
        assert_eq!(CallbackData::parse("p:42:0"), Some(data(Some(false))));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(CallbackData::parse("p"), None);
        assert_eq!(CallbackData::parse("p:"), None);
        assert_eq!(CallbackData::parse(":42"), None);
        assert_eq!(CallbackData::parse("p:42:yes"), None);
        assert_eq!(CallbackData::parse("p:42:1:extra"), None);
    }

    #[test]
    fn test_prefix_of() {
        assert_eq!(CallbackData::prefix_of("customdb:abc:1"), "customdb");
        assert_eq!(CallbackData::prefix_of("unwarn"), "unwarn");
        assert_eq!(CallbackData::prefix_of(""), "");
    }
}

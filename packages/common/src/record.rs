use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Filename to file bytes.
pub type Content = BTreeMap<String, Vec<u8>>;

/// Identity and version marker shared by every persisted record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Logical identity. Not unique across versions of a versioned record.
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "USER_ID")]
    pub user_id: String,
    #[serde(rename = "TASK_ID")]
    pub task_id: String,
    /// Unix seconds.
    pub timestamp: f64,
}

impl Header {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        task_id: impl Into<String>,
        timestamp: f64,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            task_id: task_id.into(),
            timestamp,
        }
    }

    /// Fails when the identity or the version marker is unset.
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if self.id.is_empty() {
            return Err(InvalidRecord::MissingField("ID"));
        }
        if !self.timestamp.is_finite() {
            return Err(InvalidRecord::MissingField("timestamp"));
        }
        Ok(())
    }
}

/// A record is missing a field the depot requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRecord {
    #[error("required field '{0}' is unset")]
    MissingField(&'static str),
}

/// Common behaviour of all depot records.
pub trait Record {
    /// Whether several `(ID, timestamp)` rows may coexist for one ID.
    const IS_VERSIONED: bool;

    fn header(&self) -> &Header;

    /// Checks the header and any type-specific required fields.
    fn validate(&self) -> Result<(), InvalidRecord> {
        self.header().validate()
    }
}

/// Current wall-clock time as unix seconds with microsecond precision.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Serde adapter storing file bytes as lowercase hex strings.
pub mod hex_content {
    use super::Content;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(content: &Content, serializer: S) -> Result<S::Ok, S::Error> {
        content
            .iter()
            .map(|(name, bytes)| (name.as_str(), hex::encode(bytes)))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Content, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(name, encoded)| {
                hex::decode(&encoded)
                    .map(|bytes| (name, bytes))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

/// Encode a content map as JSON text (hex values).
pub fn encode_content(content: &Content) -> String {
    let encoded: BTreeMap<&str, String> = content
        .iter()
        .map(|(name, bytes)| (name.as_str(), hex::encode(bytes)))
        .collect();
    // A map of strings always serializes.
    serde_json::to_string(&encoded).unwrap_or_else(|_| "{}".to_string())
}

/// Decode JSON text produced by [`encode_content`]. Empty text is an empty map.
pub fn decode_content(text: &str) -> Result<Content, serde_json::Error> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(with = "hex_content")] Content);

    if text.is_empty() {
        return Ok(Content::new());
    }
    serde_json::from_str::<Wrapper>(text).map(|w| w.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_validation() {
        assert!(Header::new("a", "u", "t", 1.0).validate().is_ok());
        assert_eq!(
            Header::new("", "u", "t", 1.0).validate(),
            Err(InvalidRecord::MissingField("ID"))
        );
        assert_eq!(
            Header::new("a", "u", "t", f64::NAN).validate(),
            Err(InvalidRecord::MissingField("timestamp"))
        );
    }

    #[test]
    fn test_content_encoding_is_hex() {
        let mut content = Content::new();
        content.insert("1.in".into(), b"123, 345".to_vec());
        content.insert("bin".into(), vec![0, 255]);

        let text = encode_content(&content);
        assert!(text.contains("\"bin\":\"00ff\""));
        assert_eq!(decode_content(&text).unwrap(), content);
    }

    #[test]
    fn test_decode_empty_content() {
        assert!(decode_content("").unwrap().is_empty());
        assert!(decode_content("{\"x\":\"zz\"}").is_err());
    }
}

use serde::{Deserialize, Serialize};

/// One wire record: an encoded version key and its blob.
///
/// The key travels as its string encoding and is only validated when the
/// receiver applies it. The value is base64 inside JSON so arbitrary bytes
/// survive the text transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub key: String,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

impl SyncRecord {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_base64_on_the_wire() {
        let record = SyncRecord::new("some-key", vec![0xff, 0x00, 0x10]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"key":"some-key","value":"/wAQ"}"#);
        let back: SyncRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let json = r#"{"key":"k","value":"not base64!!"}"#;
        assert!(serde_json::from_str::<SyncRecord>(json).is_err());
    }
}

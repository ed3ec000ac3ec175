//! Serde helpers for binary fields carried as base64 text

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serializer};

/// `#[serde(with = "base64_bytes")]` for `Vec<u8>`
pub mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "base64_opt")]` for `Option<Vec<u8>>`
pub mod base64_opt {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| STANDARD.decode(t).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Carrier {
        #[serde(with = "super::base64_bytes")]
        raw: Vec<u8>,
        #[serde(with = "super::base64_opt", default)]
        maybe: Option<Vec<u8>>,
    }

    #[test]
    fn test_bytes_are_base64_text() {
        let carrier = Carrier {
            raw: vec![0, 1, 2, 255],
            maybe: None,
        };
        let json = serde_json::to_value(&carrier).unwrap();
        assert_eq!(json["raw"], "AAEC/w==");
        assert!(json["maybe"].is_null());

        let back: Carrier = serde_json::from_value(json).unwrap();
        assert_eq!(back, carrier);
    }

    #[test]
    fn test_missing_optional_field_defaults_to_none() {
        let back: Carrier = serde_json::from_str(r#"{"raw":"AA=="}"#).unwrap();
        assert_eq!(back.maybe, None);
    }

    #[test]
    fn test_bad_base64_is_rejected() {
        assert!(serde_json::from_str::<Carrier>(r#"{"raw":"!!"}"#).is_err());
    }
}

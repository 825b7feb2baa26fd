//! Serde adapters encoding byte fields as base64 strings in JSON metadata.

pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

pub mod b64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::b64")]
        data: Vec<u8>,
        #[serde(
            with = "super::b64_opt",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        maybe: Option<Vec<u8>>,
    }

    #[test]
    fn test_roundtrip() {
        let sample = Sample {
            data: vec![1, 2, 3, 255],
            maybe: Some(vec![9, 8]),
        };
        let json = serde_json::to_string(&sample).unwrap();
        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(back.data, vec![1, 2, 3, 255]);
        assert_eq!(back.maybe, Some(vec![9, 8]));
    }

    #[test]
    fn test_missing_optional_field() {
        let back: Sample = serde_json::from_str(r#"{"data":"AQID"}"#).unwrap();
        assert_eq!(back.data, vec![1, 2, 3]);
        assert_eq!(back.maybe, None);
    }
}

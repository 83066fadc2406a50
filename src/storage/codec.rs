//! Payload encoding for persisted snapshot lists.

use crate::error::{Result, SnapshotError};
use crate::types::Snapshot;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// How a snapshot list is turned into the stored string.
///
/// Every encoding is a lossless round trip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    /// Plain JSON array.
    #[default]
    Json,
    /// JSON array wrapped in standard base64.
    Base64,
    /// MessagePack, wrapped in standard base64.
    MessagePack,
}

impl PayloadEncoding {
    pub fn encode(&self, snapshots: &[Snapshot]) -> Result<String> {
        match self {
            PayloadEncoding::Json => Ok(serde_json::to_string(snapshots)?),
            PayloadEncoding::Base64 => {
                let json = serde_json::to_vec(snapshots)?;
                Ok(STANDARD.encode(json))
            }
            PayloadEncoding::MessagePack => {
                let bytes = rmp_serde::to_vec_named(snapshots)?;
                Ok(STANDARD.encode(bytes))
            }
        }
    }

    pub fn decode(&self, payload: &str) -> Result<Vec<Snapshot>> {
        match self {
            PayloadEncoding::Json => serde_json::from_str(payload)
                .map_err(|e| SnapshotError::Deserialization(e.to_string())),
            PayloadEncoding::Base64 => {
                let bytes = STANDARD.decode(payload.trim())?;
                serde_json::from_slice(&bytes)
                    .map_err(|e| SnapshotError::Deserialization(e.to_string()))
            }
            PayloadEncoding::MessagePack => {
                let bytes = STANDARD.decode(payload.trim())?;
                Ok(rmp_serde::from_slice(&bytes)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SnapshotMetadata, Timestamp};
    use serde_json::json;

    fn sample() -> Vec<Snapshot> {
        vec![
            Snapshot::new("a", Timestamp(1), json!({"name": "Ada", "age": 36}), "1.0.0"),
            Snapshot::new("b", Timestamp(2), json!({"name": "Ada", "tags": ["x"]}), "1.1.0")
                .with_metadata(SnapshotMetadata::default().with_extra("source", json!("manual"))),
        ]
    }

    #[test]
    fn test_every_encoding_round_trips() {
        for encoding in [
            PayloadEncoding::Json,
            PayloadEncoding::Base64,
            PayloadEncoding::MessagePack,
        ] {
            let encoded = encoding.encode(&sample()).unwrap();
            let decoded = encoding.decode(&encoded).unwrap();
            assert_eq!(decoded, sample(), "{:?}", encoding);
        }
    }

    #[test]
    fn test_base64_hides_plain_text() {
        let encoded = PayloadEncoding::Base64.encode(&sample()).unwrap();
        assert!(!encoded.contains("Ada"));
    }

    #[test]
    fn test_corrupt_payload_is_an_error() {
        assert!(matches!(
            PayloadEncoding::Json.decode("{not json"),
            Err(SnapshotError::Deserialization(_))
        ));
        assert!(matches!(
            PayloadEncoding::Base64.decode("***"),
            Err(SnapshotError::Encoding(_))
        ));
    }
}

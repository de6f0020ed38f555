//! Versioned envelope for persisted records.
//!
//! Everything written to the backing store (workflow definitions, execution
//! snapshots, watermarks) is wrapped in a version header so the format can
//! evolve across rolling deployments without a stop-the-world migration.

use serde::{Deserialize, Serialize};

/// The current envelope version.
pub const CURRENT_VERSION: u32 = 1;

/// A versioned envelope around a serialized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The version of the envelope format.
    pub version: u32,
    /// The wrapped record.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Wraps a record at the current version.
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self {
            version: CURRENT_VERSION,
            payload,
        }
    }

    /// Unwraps the envelope, returning the record.
    #[must_use]
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Returns true if this envelope uses the current version.
    #[must_use]
    pub fn is_current_version(&self) -> bool {
        self.version == CURRENT_VERSION
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serializes the envelope to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl<T: for<'de> Deserialize<'de>> Envelope<T> {
    /// Deserializes an envelope from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
    }

    #[test]
    fn envelope_roundtrip() {
        let envelope = Envelope::new(Record {
            name: "digest".to_string(),
        });
        assert!(envelope.is_current_version());

        let bytes = envelope.to_json_bytes().expect("serialize");
        let parsed: Envelope<Record> = Envelope::from_json_bytes(&bytes).expect("deserialize");
        assert_eq!(envelope, parsed);
    }

    #[test]
    fn envelope_json_has_version_header() {
        let envelope = Envelope::new(Record {
            name: "x".to_string(),
        });
        let json = serde_json::to_value(&envelope).expect("to_value");
        assert_eq!(json["version"], CURRENT_VERSION);
        assert!(json.get("payload").is_some());
    }
}

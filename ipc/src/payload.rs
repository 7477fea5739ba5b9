//! Opaque message payloads

use serde::{Deserialize, Serialize};

/// Type-erased payload carried through channels
///
/// Channels do not interpret what they carry. Payloads are serialized to
/// JSON bytes at the boundary and deserialized again by whoever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    data: Vec<u8>,
}

impl MessagePayload {
    /// Creates a payload from serializable data
    pub fn new<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(data)?;
        Ok(Self { data: json })
    }

    /// Creates a payload from a plain text message
    ///
    /// Convenience for the common case of processes exchanging short
    /// human-readable strings.
    pub fn text(message: impl AsRef<str>) -> Self {
        // Serializing a &str to JSON cannot fail.
        Self {
            data: serde_json::to_vec(message.as_ref()).unwrap_or_default(),
        }
    }

    /// Deserializes the payload into a specific type
    pub fn deserialize<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    /// Returns the raw serialized bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the serialized length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

//! # Persistence Format
//!
//! Binary serialization for graph excerpts. File I/O lives in the app layer.
//!
//! Format: Header (5 bytes) + postcard-serialized excerpt.
//! - 4 bytes: Magic ("AGGX")
//! - 1 byte: Version
//!
//! The payload size and header are checked before any decoding, and a decoded
//! excerpt is re-validated so a tampered file cannot produce an excerpt that
//! breaks the structural invariants.

use crate::{ExcerptError, GraphExcerpt, primitives};

/// Maximum accepted size of a persisted excerpt.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 512 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all excerpt data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), ExcerptError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(ExcerptError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(ExcerptError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExcerptError> {
        let Some(head) = bytes.get(..HEADER_SIZE) else {
            return Err(ExcerptError::SerializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[0..4]);
        Ok(Self {
            magic,
            version: head[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize an excerpt to bytes (header + payload).
pub fn excerpt_to_bytes(excerpt: &GraphExcerpt) -> Result<Vec<u8>, ExcerptError> {
    let payload = postcard::to_stdvec(excerpt)
        .map_err(|e| ExcerptError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize and re-validate an excerpt.
pub fn excerpt_from_bytes(bytes: &[u8]) -> Result<GraphExcerpt, ExcerptError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(ExcerptError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let excerpt: GraphExcerpt = postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        ExcerptError::SerializationError(format!("Failed to deserialize excerpt data: {}", e))
    })?;
    excerpt.validate()?;
    Ok(excerpt)
}

/// BLAKE3 hex digest of the serialized excerpt.
///
/// Identical excerpts always produce identical digests, so this can be used to
/// check that a re-extraction reproduced a stored excerpt.
#[cfg(feature = "crypto-hash")]
pub fn excerpt_digest(excerpt: &GraphExcerpt) -> Result<String, ExcerptError> {
    let bytes = excerpt_to_bytes(excerpt)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{MaskStrategy, NodeId, Region};

    fn sample_excerpt() -> GraphExcerpt {
        GraphExcerpt {
            region: Region::new([0, 0, 0], [10, 10, 10]),
            inner_region: Region::new([0, 0, 0], [10, 10, 10]),
            strategy: MaskStrategy::Unmasked,
            self_loops: false,
            max_edges: 100,
            features: vec![1.0, 1.0],
            feature_dim: 1,
            positions: vec![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]],
            node_ids: vec![NodeId(7), NodeId(9)],
            edge_index: vec![[0, 1], [1, 0]],
            edge_attr: vec![0.5, 0.5],
            targets: vec![1, 1],
            mask: vec![1.0, 1.0],
            roi_mask: vec![1, 1],
        }
    }

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let restored = PersistenceHeader::from_bytes(&header.to_bytes()).expect("parse header");
        assert_eq!(restored, header);
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn bytes_are_stable() {
        let excerpt = sample_excerpt();
        let bytes1 = excerpt_to_bytes(&excerpt).expect("first serialize");
        let restored = excerpt_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = excerpt_to_bytes(&restored).expect("second serialize");

        assert_eq!(restored, excerpt);
        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = excerpt_to_bytes(&sample_excerpt()).expect("serialize");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(excerpt_from_bytes(&bytes).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = excerpt_to_bytes(&sample_excerpt()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        let err = excerpt_from_bytes(&bytes).expect_err("must reject");
        assert!(err.to_string().contains("Unsupported version"));
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(excerpt_from_bytes(b"AGG").is_err());
        let bytes = excerpt_to_bytes(&sample_excerpt()).expect("serialize");
        assert!(excerpt_from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn broken_pairing_rejected_on_load() {
        let mut excerpt = sample_excerpt();
        excerpt.edge_index = vec![[0, 1], [0, 1]];
        let bytes = excerpt_to_bytes(&excerpt).expect("serialize");
        assert!(matches!(
            excerpt_from_bytes(&bytes),
            Err(ExcerptError::InvariantViolation(_))
        ));
    }

    #[test]
    fn overflowing_feature_width_rejected_on_load() {
        let mut excerpt = sample_excerpt();
        excerpt.feature_dim = 1 << 63;
        excerpt.features.clear();
        let bytes = excerpt_to_bytes(&excerpt).expect("serialize");
        assert!(matches!(
            excerpt_from_bytes(&bytes),
            Err(ExcerptError::InvariantViolation(_))
        ));
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn digest_is_deterministic() {
        let a = excerpt_digest(&sample_excerpt()).expect("digest");
        let b = excerpt_digest(&sample_excerpt()).expect("digest");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}

//! # Formats
//!
//! On-disk representation of graph excerpts.

mod persistence;

#[cfg(feature = "crypto-hash")]
pub use persistence::excerpt_digest;
pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, excerpt_from_bytes, excerpt_to_bytes,
};

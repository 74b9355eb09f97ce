//! # Primitives
//!
//! Fixed constants shared by excerpt construction, persistence and the
//! record schema.

/// Magic bytes for the persisted excerpt format header.
pub const MAGIC_BYTES: &[u8; 4] = b"AGGX";

/// Current excerpt serialization format version.
///
/// Increment this when making breaking changes to `GraphExcerpt`.
pub const FORMAT_VERSION: u8 = 1;

/// Default hard cap on the number of directed edges in one excerpt.
pub const DEFAULT_MAX_EDGES: usize = 1_000_000;

/// Feature value assigned to every node when no embeddings are available.
pub const PLACEHOLDER_FEATURE: f32 = 1.0;

// =============================================================================
// RECORD FIELD NAMES
// =============================================================================

/// Node identifier field in raw node documents.
pub const ID_FIELD: &str = "id";

/// Near endpoint field in raw edge documents.
pub const NODE1_FIELD: &str = "u";

/// Far endpoint field in raw edge documents.
pub const NODE2_FIELD: &str = "v";

/// Position fields in raw node documents, ordered z, y, x.
pub const POSITION_FIELDS: [&str; 3] = ["center_z", "center_y", "center_x"];

/// Default merge score attribute.
pub const DEFAULT_MERGE_SCORE_FIELD: &str = "merge_score";

/// Default ground-truth label attribute.
pub const DEFAULT_GT_LABEL_FIELD: &str = "gt_merge_score";

/// Default labeled-mask attribute.
pub const DEFAULT_LABELED_MASK_FIELD: &str = "merge_labeled";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"AGGX");
    }

    #[test]
    fn endpoint_fields_distinct() {
        assert_ne!(NODE1_FIELD, NODE2_FIELD);
    }
}

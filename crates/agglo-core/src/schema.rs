//! # Record Schema
//!
//! Conversion of loosely-typed graph-store documents into typed records.
//!
//! Graph stores hand back attribute documents (JSON objects). They are
//! validated here, once, at the query boundary. A missing or wrongly typed
//! field is a `SchemaError`; nothing is silently defaulted. Extra attributes
//! are ignored unless `EdgeSchema::strict_fields` is set.

use crate::primitives::{
    DEFAULT_GT_LABEL_FIELD, DEFAULT_LABELED_MASK_FIELD, DEFAULT_MERGE_SCORE_FIELD, ID_FIELD,
    NODE1_FIELD, NODE2_FIELD, POSITION_FIELDS,
};
use crate::{EdgeRecord, ExcerptError, NodeId, NodeRecord, Position};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw attribute document as returned by a graph store.
pub type Document = Map<String, Value>;

/// Names of the edge attributes consumed by excerpt construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeSchema {
    pub merge_score_field: String,
    pub gt_label_field: String,
    pub labeled_mask_field: String,
    /// Reject documents carrying fields outside the schema.
    pub strict_fields: bool,
}

impl Default for EdgeSchema {
    fn default() -> Self {
        Self {
            merge_score_field: DEFAULT_MERGE_SCORE_FIELD.to_string(),
            gt_label_field: DEFAULT_GT_LABEL_FIELD.to_string(),
            labeled_mask_field: DEFAULT_LABELED_MASK_FIELD.to_string(),
            strict_fields: false,
        }
    }
}

impl EdgeSchema {
    /// Reject empty or colliding field names.
    pub fn validate(&self) -> Result<(), ExcerptError> {
        let fields = [
            &self.merge_score_field,
            &self.gt_label_field,
            &self.labeled_mask_field,
        ];
        if fields.iter().any(|f| f.is_empty()) {
            return Err(ExcerptError::InvalidConfig(
                "edge schema field names must be non-empty".to_string(),
            ));
        }
        if fields[0] == fields[1] || fields[0] == fields[2] || fields[1] == fields[2] {
            return Err(ExcerptError::InvalidConfig(
                "edge schema field names must be distinct".to_string(),
            ));
        }
        Ok(())
    }

    /// Every field an edge document may carry.
    fn edge_fields(&self) -> [&str; 5] {
        [
            NODE1_FIELD,
            NODE2_FIELD,
            &self.merge_score_field,
            &self.gt_label_field,
            &self.labeled_mask_field,
        ]
    }
}

/// With `strict`, fail on the first field of `doc` not listed in `known`.
fn check_extra_fields(doc: &Document, known: &[&str], strict: bool) -> Result<(), ExcerptError> {
    if !strict {
        return Ok(());
    }
    match doc.keys().find(|key| !known.contains(&key.as_str())) {
        Some(key) => Err(ExcerptError::SchemaError {
            field: key.clone(),
            reason: "unexpected field".to_string(),
        }),
        None => Ok(()),
    }
}

fn field<'a>(doc: &'a Document, name: &str) -> Result<&'a Value, ExcerptError> {
    doc.get(name).ok_or_else(|| ExcerptError::SchemaError {
        field: name.to_string(),
        reason: "missing".to_string(),
    })
}

fn id_field(doc: &Document, name: &str) -> Result<NodeId, ExcerptError> {
    field(doc, name)?
        .as_u64()
        .map(NodeId)
        .ok_or_else(|| ExcerptError::SchemaError {
            field: name.to_string(),
            reason: "expected an unsigned integer id".to_string(),
        })
}

fn number_field(doc: &Document, name: &str) -> Result<f64, ExcerptError> {
    field(doc, name)?
        .as_f64()
        .ok_or_else(|| ExcerptError::SchemaError {
            field: name.to_string(),
            reason: "expected a number".to_string(),
        })
}

impl NodeRecord {
    /// Build a node record from a raw node document.
    pub fn from_document(doc: &Document) -> Result<Self, ExcerptError> {
        let id = id_field(doc, ID_FIELD)?;
        let [z, y, x] = POSITION_FIELDS;
        let position = Position::new(
            number_field(doc, z)?,
            number_field(doc, y)?,
            number_field(doc, x)?,
        );
        Ok(Self::new(id, position))
    }
}

impl EdgeRecord {
    /// Build an edge record from a raw edge document, using `schema` to find
    /// the attribute columns.
    pub fn from_document(doc: &Document, schema: &EdgeSchema) -> Result<Self, ExcerptError> {
        check_extra_fields(doc, &schema.edge_fields(), schema.strict_fields)?;
        let u = id_field(doc, NODE1_FIELD)?;
        let v = id_field(doc, NODE2_FIELD)?;
        let merge_score = number_field(doc, &schema.merge_score_field)? as f32;
        let gt_label = number_field(doc, &schema.gt_label_field)? as f32;
        let labeled = number_field(doc, &schema.labeled_mask_field)? as f32;
        Ok(Self::new(u, v, merge_score, gt_label, labeled))
    }
}

/// Convert a batch of node documents, failing on the first bad record.
pub fn nodes_from_documents(
    docs: &[Document],
    schema: &EdgeSchema,
) -> Result<Vec<NodeRecord>, ExcerptError> {
    let [z, y, x] = POSITION_FIELDS;
    docs.iter()
        .map(|doc| {
            check_extra_fields(doc, &[ID_FIELD, z, y, x], schema.strict_fields)?;
            NodeRecord::from_document(doc)
        })
        .collect()
}

/// Convert a batch of edge documents, failing on the first bad record.
pub fn edges_from_documents(
    docs: &[Document],
    schema: &EdgeSchema,
) -> Result<Vec<EdgeRecord>, ExcerptError> {
    docs.iter()
        .map(|doc| EdgeRecord::from_document(doc, schema))
        .collect()
}

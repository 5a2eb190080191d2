//! Transport codec.
//!
//! Posts travel as the JSON document tree the editor has always produced:
//! `{"type":"doc","content":[...]}` with `type`-tagged nodes, `attrs` and
//! `marks`. The format describes itself, so older posts need no version
//! header, and anything that is not such a document (legacy plain-text posts,
//! truncated JSON) decodes to a single paragraph holding the raw string.

mod decode;
mod encode;
pub mod error;

pub use error::DecodeError;

use crate::document::{Block, Document, Inline};

/// Serialize a document to its transport string.
pub fn serialize(doc: &Document) -> String {
    encode::document(doc).to_string()
}

/// Serialize with indentation, for inspection.
pub fn serialize_pretty(doc: &Document) -> String {
    format!("{:#}", encode::document(doc))
}

/// Strictly decode a transport string.
pub fn try_deserialize(source: &str) -> Result<Document, DecodeError> {
    let root: decode::WireNode =
        serde_json::from_str(source).map_err(|e| DecodeError::json(&e, source))?;
    decode::document(root)
}

/// Decode a transport string, never failing.
///
/// The empty string decodes to the empty document. Any other input that is
/// not a valid document becomes one paragraph with one unmarked text node
/// whose content is exactly `source`.
pub fn deserialize(source: &str) -> Document {
    if source.is_empty() {
        return Document::empty();
    }
    match try_deserialize(source) {
        Ok(doc) => doc,
        Err(err) => {
            tracing::debug!(error = %err, len = source.len(), "keeping undecodable post content as text");
            Document {
                nodes: vec![Block::paragraph(vec![Inline::text(source)])],
            }
        }
    }
}

use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

/// Why a transport string could not be decoded strictly.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed document JSON: {message}")]
    Json { message: String, span: Range<usize> },

    #[error("expected a `doc` root node, found `{found}`")]
    NotADocument { found: String },

    #[error("unknown node type `{kind}`")]
    UnknownNode { kind: String, path: String },

    #[error("unknown mark type `{kind}`")]
    UnknownMark { kind: String, path: String },

    #[error("`{kind}` cannot appear inside `{parent}`")]
    Misplaced {
        kind: String,
        parent: String,
        path: String,
    },

    #[error("invalid `{attr}` on `{kind}`: {reason}")]
    InvalidAttr {
        kind: String,
        attr: String,
        reason: String,
        path: String,
    },
}

impl DecodeError {
    pub(crate) fn json(err: &serde_json::Error, source: &str) -> Self {
        let start = line_col_to_offset(source, err.line(), err.column());
        let end = (start + 1).min(source.len()).max(start);
        DecodeError::Json {
            message: err.to_string(),
            span: start..end,
        }
    }

    /// Byte span in the source, when the failure can be located.
    pub fn span(&self) -> Option<Range<usize>> {
        match self {
            DecodeError::Json { span, .. } => Some(span.clone()),
            _ => None,
        }
    }

    /// Node path (e.g. `doc.content[1].content[0]`) of a structural failure.
    pub fn path(&self) -> Option<&str> {
        match self {
            DecodeError::UnknownNode { path, .. }
            | DecodeError::UnknownMark { path, .. }
            | DecodeError::Misplaced { path, .. }
            | DecodeError::InvalidAttr { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        let mut diagnostic = Diagnostic::error().with_message(self.to_string());
        if let Some(span) = self.span() {
            diagnostic = diagnostic.with_labels(vec![Label::primary(file_id, span)]);
        }
        if let Some(path) = self.path() {
            diagnostic = diagnostic.with_notes(vec![format!("at node {}", path)]);
        }
        diagnostic.with_notes(vec![
            "the renderer shows this post as a single paragraph of raw text".to_string(),
        ])
    }
}

/// serde_json reports 1-based lines and 1-based byte columns; line 0 means
/// the error has no position.
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let mut offset = 0;
    for (i, l) in source.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            return (offset + column.saturating_sub(1)).min(source.len());
        }
        offset += l.len();
    }
    source.len()
}

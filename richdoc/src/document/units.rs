//! Unit addressing for inline content.
//!
//! A text node contributes one unit per `char`; every other inline node is a
//! single unit. Offsets inside a textblock are unit offsets, which is what
//! keeps a mention atomic: no offset ever lands inside one.

use super::{Inline, Marks};

/// One addressable unit of inline content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitRef<'a> {
    Char(char, &'a Marks),
    Node(&'a Inline),
}

impl Inline {
    pub fn unit_len(&self) -> usize {
        match self {
            Inline::Text { text, .. } => text.chars().count(),
            _ => 1,
        }
    }
}

pub fn inline_len(inlines: &[Inline]) -> usize {
    inlines.iter().map(Inline::unit_len).sum()
}

/// Iterate over the units of `inlines` in order.
pub fn units(inlines: &[Inline]) -> impl Iterator<Item = UnitRef<'_>> {
    inlines.iter().flat_map(|inline| {
        let (chars, node): (Vec<UnitRef<'_>>, Option<UnitRef<'_>>) = match inline {
            Inline::Text { text, marks } => {
                (text.chars().map(|c| UnitRef::Char(c, marks)).collect(), None)
            }
            other => (Vec::new(), Some(UnitRef::Node(other))),
        };
        chars.into_iter().chain(node)
    })
}

/// Split inline content at a unit offset. Text nodes straddling the offset
/// are cut in two; offsets past the end put everything on the left.
pub fn split_inlines(inlines: Vec<Inline>, at: usize) -> (Vec<Inline>, Vec<Inline>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut pos = 0;

    for inline in inlines {
        let len = inline.unit_len();
        if pos + len <= at {
            left.push(inline);
        } else if pos >= at {
            right.push(inline);
        } else {
            match inline {
                Inline::Text { text, marks } => {
                    let cut = text
                        .char_indices()
                        .nth(at - pos)
                        .map(|(i, _)| i)
                        .unwrap_or(text.len());
                    let (a, b) = text.split_at(cut);
                    left.push(Inline::marked(a, marks.clone()));
                    right.push(Inline::marked(b, marks));
                }
                // Non-text nodes are one unit wide, so they never straddle.
                other => right.push(other),
            }
        }
        pos += len;
    }

    (left, right)
}

/// Bring inline content into canonical form: empty text nodes are dropped and
/// adjacent text nodes with equal marks are merged. Text is otherwise kept
/// byte-for-byte.
pub fn normalize_inlines(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        match inline {
            Inline::Text { text, .. } if text.is_empty() => {}
            Inline::Text { text, marks } => {
                if let Some(Inline::Text {
                    text: prev,
                    marks: prev_marks,
                }) = out.last_mut()
                {
                    if *prev_marks == marks {
                        prev.push_str(&text);
                        continue;
                    }
                }
                out.push(Inline::Text { text, marks });
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Mark;

    #[test]
    fn mention_counts_as_one_unit() {
        let inlines = vec![
            Inline::text("Hi "),
            Inline::mention(7, "Chess Club"),
            Inline::text("!"),
        ];
        assert_eq!(inline_len(&inlines), 5);
        assert!(matches!(
            units(&inlines).nth(3),
            Some(UnitRef::Node(Inline::Mention { entity_id: 7, .. }))
        ));
    }

    #[test]
    fn split_cuts_text_on_char_boundaries() {
        let (l, r) = split_inlines(vec![Inline::text("çağrı")], 2);
        assert_eq!(l, vec![Inline::text("ça")]);
        assert_eq!(r, vec![Inline::text("ğrı")]);
    }

    #[test]
    fn split_never_enters_a_mention() {
        let inlines = vec![Inline::text("a"), Inline::mention(1, "X"), Inline::text("b")];
        let (l, r) = split_inlines(inlines, 2);
        assert_eq!(l, vec![Inline::text("a"), Inline::mention(1, "X")]);
        assert_eq!(r, vec![Inline::text("b")]);
    }

    #[test]
    fn normalize_merges_equal_marks_only() {
        let bold = Marks::default().with(Mark::Bold);
        let out = normalize_inlines(vec![
            Inline::text("a"),
            Inline::text(""),
            Inline::text("b"),
            Inline::marked("c", bold.clone()),
            Inline::marked("d", bold.clone()),
        ]);
        assert_eq!(out, vec![Inline::text("ab"), Inline::marked("cd", bold)]);
    }

    #[test]
    fn normalize_keeps_whitespace() {
        let out = normalize_inlines(vec![Inline::text("  a  "), Inline::text("\t")]);
        assert_eq!(out, vec![Inline::text("  a  \t")]);
    }
}

//! Markdown import.
//!
//! Authors paste Markdown or type its shortcuts; both arrive here and come
//! out as the closed node set of [`crate::document`]. Anything the document
//! cannot hold (tables, raw HTML, deep headings) degrades instead of failing.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::document::{Block, Document, Inline, ListItem, Mark, Marks, normalize_inlines};

/// Convert CommonMark source into a document.
pub fn from_markdown(source: &str) -> Document {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let events: Vec<Event<'_>> = CmarkParser::new_ext(source, options).collect();

    let mut i = 0;
    let nodes = collect_blocks(&events, &mut i, &|_| false);
    tracing::trace!(events = events.len(), blocks = nodes.len(), "imported markdown");
    Document { nodes }
}

fn collect_blocks(events: &[Event<'_>], i: &mut usize, is_end: &dyn Fn(&TagEnd) -> bool) -> Vec<Block> {
    let mut blocks = Vec::new();

    while *i < events.len() {
        match &events[*i] {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }

            Event::Start(Tag::Paragraph) => {
                *i += 1;
                let content = collect_textblock(events, i, &|e| matches!(e, TagEnd::Paragraph));
                blocks.push(Block::paragraph(content));
            }

            Event::Start(Tag::Heading { level, .. }) => {
                let level = heading_level_to_u8(level);
                *i += 1;
                let content = collect_textblock(events, i, &|e| matches!(e, TagEnd::Heading(_)));
                blocks.push(Block::heading(level, content));
            }

            Event::Start(Tag::BlockQuote(_)) => {
                *i += 1;
                let inner = collect_blocks(events, i, &|e| matches!(e, TagEnd::BlockQuote(_)));
                blocks.push(Block::Blockquote { blocks: inner });
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                *i += 1;
                let content = collect_text_until(events, i, |e| matches!(e, TagEnd::CodeBlock));
                blocks.push(Block::CodeBlock { language, content });
            }

            Event::Start(Tag::List(start)) => {
                let start = *start;
                *i += 1;
                let items = collect_items(events, i);
                blocks.push(match start {
                    Some(start) => Block::OrderedList { start, items },
                    None => Block::BulletList { items },
                });
            }

            Event::Start(Tag::Table(_)) => {
                *i += 1;
                blocks.extend(collect_table_rows(events, i));
            }

            // Raw HTML is kept as the literal text the author wrote.
            Event::Start(Tag::HtmlBlock) => {
                *i += 1;
                let html = collect_text_until(events, i, |e| matches!(e, TagEnd::HtmlBlock));
                blocks.push(Block::paragraph(lines_with_breaks(html.trim_end())));
            }

            Event::Rule => {
                blocks.push(Block::HorizontalRule);
                *i += 1;
            }

            // Tight list items carry their inline content without a paragraph.
            ev if starts_inline(ev) => {
                let content = collect_inlines(events, i);
                blocks.push(Block::paragraph(content));
            }

            _ => {
                *i += 1;
            }
        }
    }

    blocks
}

fn collect_items(events: &[Event<'_>], i: &mut usize) -> Vec<ListItem> {
    let mut items = Vec::new();

    while *i < events.len() {
        match &events[*i] {
            Event::End(TagEnd::List(_)) => {
                *i += 1;
                break;
            }
            Event::Start(Tag::Item) => {
                *i += 1;
                let blocks = collect_blocks(events, i, &|e| matches!(e, TagEnd::Item));
                items.push(if blocks.is_empty() {
                    ListItem::paragraph(Vec::new())
                } else {
                    ListItem { blocks }
                });
            }
            _ => {
                *i += 1;
            }
        }
    }

    items
}

/// Each table row becomes one paragraph with its cells separated by ` | `.
fn collect_table_rows(events: &[Event<'_>], i: &mut usize) -> Vec<Block> {
    let mut rows = Vec::new();
    let mut current: Vec<Vec<Inline>> = Vec::new();

    while *i < events.len() {
        match &events[*i] {
            Event::End(TagEnd::Table) => {
                *i += 1;
                break;
            }
            Event::Start(Tag::TableHead | Tag::TableRow) => {
                current.clear();
                *i += 1;
            }
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => {
                let mut content = Vec::new();
                for (n, cell) in std::mem::take(&mut current).into_iter().enumerate() {
                    if n > 0 {
                        content.push(Inline::text(" | "));
                    }
                    content.extend(cell);
                }
                rows.push(Block::paragraph(normalize_inlines(content)));
                *i += 1;
            }
            Event::Start(Tag::TableCell) => {
                *i += 1;
                current.push(collect_textblock(events, i, &|e| matches!(e, TagEnd::TableCell)));
            }
            _ => {
                *i += 1;
            }
        }
    }

    rows
}

/// Collect the inline content of a textblock up to and including its end tag.
fn collect_textblock(events: &[Event<'_>], i: &mut usize, is_end: &dyn Fn(&TagEnd) -> bool) -> Vec<Inline> {
    let mut content = Vec::new();

    while *i < events.len() {
        match &events[*i] {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            ev if starts_inline(ev) => content.extend(collect_inlines(events, i)),
            _ => {
                *i += 1;
            }
        }
    }

    normalize_inlines(content)
}

fn starts_inline(ev: &Event<'_>) -> bool {
    matches!(
        ev,
        Event::Text(_)
            | Event::Code(_)
            | Event::InlineHtml(_)
            | Event::SoftBreak
            | Event::HardBreak
            | Event::Start(
                Tag::Strong | Tag::Emphasis | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
            )
    )
}

/// Collect a run of inline events. Emphasis, strong, strikethrough and links
/// become marks on the text they wrap. Stops, without consuming it, at the
/// first event that is not inline content.
fn collect_inlines(events: &[Event<'_>], i: &mut usize) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut stack = vec![Marks::default()];

    while *i < events.len() {
        let marks = stack.last().cloned().unwrap_or_default();
        match &events[*i] {
            Event::Text(s) | Event::InlineHtml(s) => out.push(Inline::marked(s.to_string(), marks)),
            Event::Code(s) => out.push(Inline::marked(s.to_string(), marks.with(Mark::Code))),
            Event::SoftBreak => out.push(Inline::marked(" ", marks)),
            Event::HardBreak => out.push(Inline::HardBreak),
            Event::Start(Tag::Strong) => stack.push(marks.with(Mark::Bold)),
            Event::Start(Tag::Emphasis) => stack.push(marks.with(Mark::Italic)),
            Event::Start(Tag::Strikethrough) => stack.push(marks.with(Mark::Strike)),
            Event::Start(Tag::Link { dest_url, .. }) => {
                stack.push(marks.with(Mark::link(dest_url.to_string())));
            }
            Event::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough | TagEnd::Link)
                if stack.len() > 1 =>
            {
                stack.pop();
            }
            Event::Start(Tag::Image { dest_url, title, .. }) => {
                let src = dest_url.to_string();
                let title = (!title.is_empty()).then(|| title.to_string());
                *i += 1;
                let alt = collect_text_until(events, i, |e| matches!(e, TagEnd::Image));
                out.push(Inline::Image {
                    src,
                    alt: (!alt.is_empty()).then_some(alt),
                    title,
                });
                continue;
            }
            _ => break,
        }
        *i += 1;
    }

    normalize_inlines(out)
}

/// Collect all text content until a matching End tag.
fn collect_text_until(events: &[Event<'_>], i: &mut usize, is_end: impl Fn(&TagEnd) -> bool) -> String {
    let mut text = String::new();
    while *i < events.len() {
        match &events[*i] {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) | Event::Code(s) | Event::Html(s) | Event::InlineHtml(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}

fn lines_with_breaks(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if n > 0 {
            out.push(Inline::HardBreak);
        }
        out.push(Inline::text(line));
    }
    normalize_inlines(out)
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_becomes_marks() {
        let doc = from_markdown("Meet **at *noon*** in [room 4](https://uni.edu/r4).");
        assert_eq!(
            doc.nodes,
            vec![Block::paragraph(vec![
                Inline::text("Meet "),
                Inline::marked("at ", Marks::default().with(Mark::Bold)),
                Inline::marked("noon", Marks::default().with(Mark::Bold).with(Mark::Italic)),
                Inline::text(" in "),
                Inline::marked("room 4", Marks::default().with(Mark::link("https://uni.edu/r4"))),
                Inline::text("."),
            ])]
        );
    }

    #[test]
    fn deep_headings_clamp() {
        let doc = from_markdown("# One\n\n##### Five\n");
        assert_eq!(
            doc.nodes,
            vec![
                Block::heading(1, vec![Inline::text("One")]),
                Block::heading(3, vec![Inline::text("Five")]),
            ]
        );
    }

    #[test]
    fn tight_and_nested_lists() {
        let doc = from_markdown("3. first\n4. second\n   - inner\n");
        let Block::OrderedList { start, items } = &doc.nodes[0] else {
            panic!("expected ordered list, got {:?}", doc.nodes);
        };
        assert_eq!(*start, 3);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], ListItem::paragraph(vec![Inline::text("first")]));
        assert!(matches!(items[1].blocks[1], Block::BulletList { .. }));
    }

    #[test]
    fn code_fences_keep_language_and_text() {
        let doc = from_markdown("```rust title\nfn main() {}\n```\n");
        assert_eq!(
            doc.nodes,
            vec![Block::CodeBlock {
                language: Some("rust".into()),
                content: "fn main() {}\n".into(),
            }]
        );
    }

    #[test]
    fn quotes_rules_and_soft_breaks() {
        let doc = from_markdown("> line one\n> line two\n\n---\n");
        assert_eq!(
            doc.nodes,
            vec![
                Block::Blockquote {
                    blocks: vec![Block::paragraph(vec![Inline::text("line one line two")])],
                },
                Block::HorizontalRule,
            ]
        );
    }

    #[test]
    fn tables_degrade_to_rows_of_text() {
        let doc = from_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert_eq!(
            doc.nodes,
            vec![
                Block::paragraph(vec![Inline::text("a | b")]),
                Block::paragraph(vec![Inline::text("1 | 2")]),
            ]
        );
    }

    #[test]
    fn images_keep_alt_text() {
        let doc = from_markdown("![poster](https://cdn.uni.edu/p.png \"Spring\")");
        assert_eq!(
            doc.nodes,
            vec![Block::paragraph(vec![Inline::Image {
                src: "https://cdn.uni.edu/p.png".into(),
                alt: Some("poster".into()),
                title: Some("Spring".into()),
            }])]
        );
    }

    #[test]
    fn empty_source_is_empty_document() {
        assert!(from_markdown("").is_empty());
    }
}

mod marks;
mod units;

use std::fmt;

pub use marks::{Highlight, Link, Mark, MarkKind, Marks};
pub use units::{UnitRef, inline_len, normalize_inlines, split_inlines, units};

/// The body of one post: an ordered sequence of blocks in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub nodes: Vec<Block>,
}

impl Document {
    pub fn empty() -> Self {
        Document { nodes: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every mention in the document, in reading order.
    pub fn mentions(&self) -> Vec<(i64, &str)> {
        let mut out = Vec::new();
        for block in &self.nodes {
            block.collect_mentions(&mut out);
        }
        out
    }
}

/// Block-level node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph {
        align: Option<Alignment>,
        content: Vec<Inline>,
    },
    Heading {
        /// 1..=3
        level: u8,
        align: Option<Alignment>,
        content: Vec<Inline>,
    },
    BulletList {
        items: Vec<ListItem>,
    },
    OrderedList {
        start: u64,
        items: Vec<ListItem>,
    },
    Blockquote {
        blocks: Vec<Block>,
    },
    CodeBlock {
        language: Option<String>,
        content: String,
    },
    HorizontalRule,
    /// An embedded video. `url` is the address the author supplied.
    YoutubeEmbed {
        url: String,
    },
}

/// One entry of a bullet or ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListItem {
    pub blocks: Vec<Block>,
}

impl ListItem {
    pub fn paragraph(content: Vec<Inline>) -> Self {
        ListItem {
            blocks: vec![Block::paragraph(content)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

/// Inline node. Only text carries marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text {
        text: String,
        marks: Marks,
    },
    Image {
        src: String,
        alt: Option<String>,
        title: Option<String>,
    },
    /// Atomic reference to an entity. `label` is the entity's name when the
    /// mention was inserted and is never refreshed.
    Mention {
        entity_id: i64,
        label: String,
    },
    HardBreak,
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            marks: Marks::default(),
        }
    }

    pub fn marked(text: impl Into<String>, marks: Marks) -> Self {
        Inline::Text {
            text: text.into(),
            marks,
        }
    }

    pub fn mention(entity_id: i64, label: impl Into<String>) -> Self {
        Inline::Mention {
            entity_id,
            label: label.into(),
        }
    }

    pub fn image(src: impl Into<String>) -> Self {
        Inline::Image {
            src: src.into(),
            alt: None,
            title: None,
        }
    }
}

impl Block {
    pub fn paragraph(content: Vec<Inline>) -> Self {
        Block::Paragraph {
            align: None,
            content,
        }
    }

    pub fn heading(level: u8, content: Vec<Inline>) -> Self {
        Block::Heading {
            level: level.clamp(1, 3),
            align: None,
            content,
        }
    }

    /// Paragraphs, headings and code blocks hold inline content directly.
    pub fn is_textblock(&self) -> bool {
        matches!(
            self,
            Block::Paragraph { .. } | Block::Heading { .. } | Block::CodeBlock { .. }
        )
    }

    /// Horizontal rules and video embeds have no content at all.
    pub fn is_atom(&self) -> bool {
        matches!(self, Block::HorizontalRule | Block::YoutubeEmbed { .. })
    }

    /// Inline content of a textblock. Code block text comes back as one
    /// unmarked text node. Empty for every other block.
    pub fn inlines(&self) -> Vec<Inline> {
        match self {
            Block::Paragraph { content, .. } | Block::Heading { content, .. } => content.clone(),
            Block::CodeBlock { content, .. } if !content.is_empty() => {
                vec![Inline::text(content.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// Replace the inline content of a textblock. Code blocks keep only the
    /// text, dropping marks and any non-text inline except hard breaks,
    /// which become newlines.
    pub fn set_inlines(&mut self, inlines: Vec<Inline>) {
        match self {
            Block::Paragraph { content, .. } | Block::Heading { content, .. } => {
                *content = normalize_inlines(inlines);
            }
            Block::CodeBlock { content, .. } => {
                let mut text = String::new();
                for inline in inlines {
                    match inline {
                        Inline::Text { text: t, .. } => text.push_str(&t),
                        Inline::HardBreak => text.push('\n'),
                        _ => {}
                    }
                }
                *content = text;
            }
            _ => {}
        }
    }

    fn collect_mentions<'a>(&'a self, out: &mut Vec<(i64, &'a str)>) {
        match self {
            Block::Paragraph { content, .. } | Block::Heading { content, .. } => {
                for inline in content {
                    if let Inline::Mention { entity_id, label } = inline {
                        out.push((*entity_id, label.as_str()));
                    }
                }
            }
            Block::BulletList { items } | Block::OrderedList { items, .. } => {
                for item in items {
                    for block in &item.blocks {
                        block.collect_mentions(out);
                    }
                }
            }
            Block::Blockquote { blocks } => {
                for block in blocks {
                    block.collect_mentions(out);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Paragraph { content, .. } => {
                for inline in content {
                    write!(f, "{}", inline)?;
                }
                writeln!(f)
            }
            Block::Heading { level, content, .. } => {
                for _ in 0..*level {
                    write!(f, "#")?;
                }
                write!(f, " ")?;
                for inline in content {
                    write!(f, "{}", inline)?;
                }
                writeln!(f)
            }
            Block::CodeBlock { language, content } => {
                write!(f, "```")?;
                if let Some(lang) = language {
                    write!(f, "{}", lang)?;
                }
                writeln!(f)?;
                write!(f, "{}", content)?;
                if !content.is_empty() && !content.ends_with('\n') {
                    writeln!(f)?;
                }
                writeln!(f, "```")
            }
            Block::Blockquote { blocks } => {
                let mut text = String::new();
                for block in blocks {
                    text.push_str(&block.to_string());
                }
                for line in text.lines() {
                    writeln!(f, "> {}", line)?;
                }
                Ok(())
            }
            Block::OrderedList { start, items } => {
                for (i, item) in items.iter().enumerate() {
                    write!(f, "{}. ", start.saturating_add(i as u64))?;
                    write_item(f, item)?;
                }
                Ok(())
            }
            Block::BulletList { items } => {
                for item in items {
                    write!(f, "- ")?;
                    write_item(f, item)?;
                }
                Ok(())
            }
            Block::HorizontalRule => writeln!(f, "---"),
            Block::YoutubeEmbed { url } => writeln!(f, "[video] {}", url),
        }
    }
}

fn write_item(f: &mut fmt::Formatter<'_>, item: &ListItem) -> fmt::Result {
    if item.blocks.is_empty() {
        return writeln!(f);
    }
    for (i, block) in item.blocks.iter().enumerate() {
        let text = block.to_string();
        for (j, line) in text.lines().enumerate() {
            if i > 0 || j > 0 {
                write!(f, "  ")?;
            }
            writeln!(f, "{}", line)?;
        }
    }
    Ok(())
}

impl fmt::Display for Inline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inline::Text { text, .. } => write!(f, "{}", text),
            Inline::Image { alt: Some(alt), .. } => write!(f, "[image: {}]", alt),
            Inline::Image { alt: None, .. } => write!(f, "[image]"),
            Inline::Mention { label, .. } => write!(f, "@{}", label),
            Inline::HardBreak => writeln!(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_projects_mentions_as_at_label() {
        let doc = Document {
            nodes: vec![Block::paragraph(vec![
                Inline::text("Hello "),
                Inline::mention(9, "Chemistry Club"),
                Inline::text(" "),
            ])],
        };
        assert_eq!(doc.to_string(), "Hello @Chemistry Club \n");
    }

    #[test]
    fn code_block_inlines_round_trip_through_set_inlines() {
        let mut block = Block::CodeBlock {
            language: Some("rust".into()),
            content: "fn main() {}".into(),
        };
        let inlines = block.inlines();
        block.set_inlines(inlines);
        assert_eq!(
            block,
            Block::CodeBlock {
                language: Some("rust".into()),
                content: "fn main() {}".into(),
            }
        );
    }

    #[test]
    fn mentions_are_collected_from_nested_blocks() {
        let doc = Document {
            nodes: vec![Block::BulletList {
                items: vec![ListItem::paragraph(vec![Inline::mention(7, "Chess Club")])],
            }],
        };
        assert_eq!(doc.mentions(), vec![(7, "Chess Club")]);
    }
}

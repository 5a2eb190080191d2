use serde::Deserialize;
use serde_json::{Map, Value};

use crate::codec::DecodeError;
use crate::document::{Alignment, Block, Document, Highlight, Inline, Link, ListItem, Mark, Marks};

/// A node as it appears on the wire, before any schema checks.
#[derive(Debug, Deserialize)]
pub(super) struct WireNode {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attrs: Option<Map<String, Value>>,
    #[serde(default)]
    content: Option<Vec<WireNode>>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    marks: Option<Vec<WireMark>>,
}

#[derive(Debug, Deserialize)]
struct WireMark {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attrs: Option<Map<String, Value>>,
}

pub(super) fn document(root: WireNode) -> Result<Document, DecodeError> {
    if root.kind != "doc" {
        return Err(DecodeError::NotADocument { found: root.kind });
    }
    let nodes = blocks(root.content.unwrap_or_default(), "doc", "doc")?;
    Ok(Document { nodes })
}

fn blocks(nodes: Vec<WireNode>, parent: &str, path: &str) -> Result<Vec<Block>, DecodeError> {
    nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| block(node, parent, &format!("{}.content[{}]", path, i)))
        .collect()
}

fn block(node: WireNode, parent: &str, path: &str) -> Result<Block, DecodeError> {
    let attrs = Attrs::new(&node.kind, node.attrs.as_ref(), path);
    match node.kind.as_str() {
        "paragraph" => Ok(Block::Paragraph {
            align: attrs.align()?,
            content: inlines(node.content.unwrap_or_default(), "paragraph", path)?,
        }),
        "heading" => {
            let level = attrs.u64("level")?.unwrap_or(1).clamp(1, 3) as u8;
            Ok(Block::Heading {
                level,
                align: attrs.align()?,
                content: inlines(node.content.unwrap_or_default(), "heading", path)?,
            })
        }
        "bulletList" => Ok(Block::BulletList {
            items: list_items(node.content.unwrap_or_default(), "bulletList", path)?,
        }),
        "orderedList" => Ok(Block::OrderedList {
            start: attrs.u64("start")?.unwrap_or(1),
            items: list_items(node.content.unwrap_or_default(), "orderedList", path)?,
        }),
        "blockquote" => Ok(Block::Blockquote {
            blocks: blocks(node.content.unwrap_or_default(), "blockquote", path)?,
        }),
        "codeBlock" => {
            let language = attrs.string("language")?;
            let mut content = String::new();
            for (i, child) in node.content.unwrap_or_default().into_iter().enumerate() {
                let child_path = format!("{}.content[{}]", path, i);
                if child.kind != "text" {
                    return Err(DecodeError::Misplaced {
                        kind: child.kind,
                        parent: "codeBlock".into(),
                        path: child_path,
                    });
                }
                content.push_str(&child.text.unwrap_or_default());
            }
            Ok(Block::CodeBlock { language, content })
        }
        "horizontalRule" => Ok(Block::HorizontalRule),
        "youtube" => Ok(Block::YoutubeEmbed {
            url: attrs.required_string("src")?,
        }),
        "text" | "image" | "mention" | "hardBreak" | "listItem" | "doc" => {
            Err(DecodeError::Misplaced {
                kind: node.kind.clone(),
                parent: parent.into(),
                path: path.into(),
            })
        }
        _ => Err(DecodeError::UnknownNode {
            kind: node.kind.clone(),
            path: path.into(),
        }),
    }
}

fn list_items(nodes: Vec<WireNode>, parent: &str, path: &str) -> Result<Vec<ListItem>, DecodeError> {
    let mut items = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.into_iter().enumerate() {
        let item_path = format!("{}.content[{}]", path, i);
        if node.kind != "listItem" {
            return Err(DecodeError::Misplaced {
                kind: node.kind,
                parent: parent.into(),
                path: item_path,
            });
        }
        items.push(ListItem {
            blocks: blocks(node.content.unwrap_or_default(), "listItem", &item_path)?,
        });
    }
    Ok(items)
}

fn inlines(nodes: Vec<WireNode>, parent: &str, path: &str) -> Result<Vec<Inline>, DecodeError> {
    nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| inline(node, parent, &format!("{}.content[{}]", path, i)))
        .collect()
}

fn inline(node: WireNode, parent: &str, path: &str) -> Result<Inline, DecodeError> {
    let attrs = Attrs::new(&node.kind, node.attrs.as_ref(), path);
    match node.kind.as_str() {
        "text" => {
            let marks = marks(node.marks.unwrap_or_default(), path)?;
            let Some(text) = node.text else {
                return Err(DecodeError::InvalidAttr {
                    kind: "text".into(),
                    attr: "text".into(),
                    reason: "missing".into(),
                    path: path.into(),
                });
            };
            Ok(Inline::Text { text, marks })
        }
        "image" => Ok(Inline::Image {
            src: attrs.required_string("src")?,
            alt: attrs.string("alt")?,
            title: attrs.string("title")?,
        }),
        "mention" => {
            let entity_id = attrs.entity_id()?;
            let label = attrs.string("label")?.unwrap_or_else(|| entity_id.to_string());
            Ok(Inline::Mention { entity_id, label })
        }
        "hardBreak" => Ok(Inline::HardBreak),
        "paragraph" | "heading" | "bulletList" | "orderedList" | "listItem" | "blockquote"
        | "codeBlock" | "horizontalRule" | "youtube" | "doc" => Err(DecodeError::Misplaced {
            kind: node.kind.clone(),
            parent: parent.into(),
            path: path.into(),
        }),
        _ => Err(DecodeError::UnknownNode {
            kind: node.kind.clone(),
            path: path.into(),
        }),
    }
}

fn marks(wire: Vec<WireMark>, path: &str) -> Result<Marks, DecodeError> {
    let mut marks = Marks::default();
    for m in wire {
        let mark = match m.kind.as_str() {
            "bold" => Mark::Bold,
            "italic" => Mark::Italic,
            "strike" => Mark::Strike,
            "underline" => Mark::Underline,
            "code" => Mark::Code,
            "subscript" => Mark::Subscript,
            "superscript" => Mark::Superscript,
            "highlight" => Mark::Highlight(Highlight {
                color: mark_attr(&m, "color").and_then(Value::as_str).map(str::to_string),
            }),
            "link" => match mark_attr(&m, "href").and_then(Value::as_str) {
                Some(href) => Mark::Link(Link { href: href.to_string() }),
                None => {
                    return Err(DecodeError::InvalidAttr {
                        kind: "link".into(),
                        attr: "href".into(),
                        reason: "missing".into(),
                        path: path.into(),
                    });
                }
            },
            _ => {
                return Err(DecodeError::UnknownMark {
                    kind: m.kind.clone(),
                    path: path.into(),
                });
            }
        };
        marks.insert(mark);
    }
    Ok(marks)
}

fn mark_attr<'a>(mark: &'a WireMark, name: &str) -> Option<&'a Value> {
    mark.attrs
        .as_ref()
        .and_then(|a| a.get(name))
        .filter(|v| !v.is_null())
}

/// Typed access to a node's `attrs`. `null` reads as absent.
struct Attrs<'a> {
    kind: &'a str,
    map: Option<&'a Map<String, Value>>,
    path: &'a str,
}

impl<'a> Attrs<'a> {
    fn new(kind: &'a str, map: Option<&'a Map<String, Value>>, path: &'a str) -> Self {
        Attrs { kind, map, path }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(name)).filter(|v| !v.is_null())
    }

    fn invalid(&self, attr: &str, reason: impl Into<String>) -> DecodeError {
        DecodeError::InvalidAttr {
            kind: self.kind.into(),
            attr: attr.into(),
            reason: reason.into(),
            path: self.path.into(),
        }
    }

    fn string(&self, name: &str) -> Result<Option<String>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(name, format!("expected a string, found {}", other))),
        }
    }

    fn required_string(&self, name: &str) -> Result<String, DecodeError> {
        self.string(name)?.ok_or_else(|| self.invalid(name, "missing"))
    }

    fn u64(&self, name: &str) -> Result<Option<u64>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.invalid(name, format!("expected a positive integer, found {}", v))),
        }
    }

    fn align(&self) -> Result<Option<Alignment>, DecodeError> {
        match self.string("textAlign")? {
            None => Ok(None),
            Some(s) => Alignment::parse(&s)
                .map(Some)
                .ok_or_else(|| self.invalid("textAlign", format!("unknown alignment `{}`", s))),
        }
    }

    /// Mention ids are integers, but older posts stored them as strings.
    fn entity_id(&self) -> Result<i64, DecodeError> {
        match self.get("id") {
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| self.invalid("id", format!("not an integer: {}", n))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| self.invalid("id", format!("not an integer: {:?}", s))),
            Some(other) => Err(self.invalid("id", format!("expected an integer, found {}", other))),
            None => Err(self.invalid("id", "missing")),
        }
    }
}

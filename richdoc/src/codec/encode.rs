use serde_json::{Map, Value, json};

use crate::document::{Block, Document, Inline, ListItem, Mark, Marks};

pub(super) fn document(doc: &Document) -> Value {
    json!({
        "type": "doc",
        "content": doc.nodes.iter().map(block).collect::<Vec<_>>(),
    })
}

fn node(kind: &str, attrs: Map<String, Value>, content: Vec<Value>) -> Value {
    let mut obj = Map::new();
    obj.insert("type".into(), Value::from(kind));
    if !attrs.is_empty() {
        obj.insert("attrs".into(), Value::Object(attrs));
    }
    if !content.is_empty() {
        obj.insert("content".into(), Value::Array(content));
    }
    Value::Object(obj)
}

fn block(b: &Block) -> Value {
    match b {
        Block::Paragraph { align, content } => {
            let mut attrs = Map::new();
            if let Some(a) = align {
                attrs.insert("textAlign".into(), Value::from(a.as_str()));
            }
            node("paragraph", attrs, content.iter().map(inline).collect())
        }
        Block::Heading {
            level,
            align,
            content,
        } => {
            let mut attrs = Map::new();
            attrs.insert("level".into(), Value::from(*level));
            if let Some(a) = align {
                attrs.insert("textAlign".into(), Value::from(a.as_str()));
            }
            node("heading", attrs, content.iter().map(inline).collect())
        }
        Block::BulletList { items } => node("bulletList", Map::new(), list_items(items)),
        Block::OrderedList { start, items } => {
            let mut attrs = Map::new();
            attrs.insert("start".into(), Value::from(*start));
            node("orderedList", attrs, list_items(items))
        }
        Block::Blockquote { blocks } => {
            node("blockquote", Map::new(), blocks.iter().map(block).collect())
        }
        Block::CodeBlock { language, content } => {
            let mut attrs = Map::new();
            if let Some(lang) = language {
                attrs.insert("language".into(), Value::from(lang.as_str()));
            }
            let text = if content.is_empty() {
                Vec::new()
            } else {
                vec![json!({ "type": "text", "text": content })]
            };
            node("codeBlock", attrs, text)
        }
        Block::HorizontalRule => node("horizontalRule", Map::new(), Vec::new()),
        Block::YoutubeEmbed { url } => {
            let mut attrs = Map::new();
            attrs.insert("src".into(), Value::from(url.as_str()));
            node("youtube", attrs, Vec::new())
        }
    }
}

fn list_items(items: &[ListItem]) -> Vec<Value> {
    items
        .iter()
        .map(|item| node("listItem", Map::new(), item.blocks.iter().map(block).collect()))
        .collect()
}

fn inline(i: &Inline) -> Value {
    match i {
        Inline::Text { text, marks } => {
            let mut obj = Map::new();
            obj.insert("type".into(), Value::from("text"));
            obj.insert("text".into(), Value::from(text.as_str()));
            if !marks.is_empty() {
                obj.insert("marks".into(), mark_list(marks));
            }
            Value::Object(obj)
        }
        Inline::Image { src, alt, title } => {
            let mut attrs = Map::new();
            attrs.insert("src".into(), Value::from(src.as_str()));
            if let Some(alt) = alt {
                attrs.insert("alt".into(), Value::from(alt.as_str()));
            }
            if let Some(title) = title {
                attrs.insert("title".into(), Value::from(title.as_str()));
            }
            node("image", attrs, Vec::new())
        }
        Inline::Mention { entity_id, label } => {
            let mut attrs = Map::new();
            attrs.insert("id".into(), Value::from(*entity_id));
            attrs.insert("label".into(), Value::from(label.as_str()));
            node("mention", attrs, Vec::new())
        }
        Inline::HardBreak => node("hardBreak", Map::new(), Vec::new()),
    }
}

fn mark_list(marks: &Marks) -> Value {
    let list = marks
        .to_vec()
        .iter()
        .map(|m| match m {
            Mark::Bold => json!({ "type": "bold" }),
            Mark::Italic => json!({ "type": "italic" }),
            Mark::Strike => json!({ "type": "strike" }),
            Mark::Underline => json!({ "type": "underline" }),
            Mark::Code => json!({ "type": "code" }),
            Mark::Subscript => json!({ "type": "subscript" }),
            Mark::Superscript => json!({ "type": "superscript" }),
            Mark::Highlight(h) => match &h.color {
                Some(color) => json!({ "type": "highlight", "attrs": { "color": color } }),
                None => json!({ "type": "highlight" }),
            },
            Mark::Link(l) => json!({ "type": "link", "attrs": { "href": l.href } }),
        })
        .collect();
    Value::Array(list)
}

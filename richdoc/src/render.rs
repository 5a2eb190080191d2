//! Read-only rendering of stored posts.
//!
//! Documents are lowered to a `pulldown-cmark` event stream and written out
//! by its HTML writer, which escapes text and link targets. Constructs the
//! writer has no tag for (mentions, marks like underline, aligned blocks,
//! embeds) are emitted as raw fragments built only from escaped values.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, LinkType, Tag, TagEnd, html};

use crate::codec;
use crate::document::{Alignment, Block, Document, Inline, ListItem, Mark, Marks};
use crate::media;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Path prefix of entity pages; a mention of entity 7 links to `{mention_base}/7`.
    pub mention_base: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            mention_base: "/entities".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Renderer { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render a transport string. Undecodable content shows as its raw text.
    pub fn render(&self, source: &str) -> String {
        self.render_document(&codec::deserialize(source))
    }

    pub fn render_document(&self, doc: &Document) -> String {
        let mut events = Vec::new();
        for block in &doc.nodes {
            self.block(block, &mut events);
        }
        let mut out = String::with_capacity(events.len() * 8);
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn block(&self, block: &Block, events: &mut Vec<Event<'static>>) {
        match block {
            Block::Paragraph { align: None, content } => {
                events.push(Event::Start(Tag::Paragraph));
                self.inlines(content, events);
                events.push(Event::End(TagEnd::Paragraph));
            }
            Block::Paragraph {
                align: Some(align),
                content,
            } => {
                events.push(Event::Html(open_aligned("p", *align).into()));
                self.inlines(content, events);
                events.push(Event::Html("</p>\n".into()));
            }
            Block::Heading {
                level,
                align,
                content,
            } => {
                let tag = format!("h{}", level);
                let open = match align {
                    Some(align) => open_aligned(&tag, *align),
                    None => format!("<{}>", tag),
                };
                events.push(Event::Html(open.into()));
                self.inlines(content, events);
                events.push(Event::Html(format!("</{}>\n", tag).into()));
            }
            Block::BulletList { items } => {
                events.push(Event::Start(Tag::List(None)));
                self.items(items, events);
                events.push(Event::End(TagEnd::List(false)));
            }
            Block::OrderedList { start, items } => {
                events.push(Event::Start(Tag::List(Some(*start))));
                self.items(items, events);
                events.push(Event::End(TagEnd::List(true)));
            }
            Block::Blockquote { blocks } => {
                events.push(Event::Start(Tag::BlockQuote(None)));
                for inner in blocks {
                    self.block(inner, events);
                }
                events.push(Event::End(TagEnd::BlockQuote(None)));
            }
            Block::CodeBlock { language, content } => {
                let lang = language.clone().unwrap_or_default();
                events.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang.into()))));
                if !content.is_empty() {
                    events.push(Event::Text(content.clone().into()));
                }
                events.push(Event::End(TagEnd::CodeBlock));
            }
            Block::HorizontalRule => events.push(Event::Rule),
            Block::YoutubeEmbed { url } => match media::youtube_embed_url(url) {
                Some(embed) => events.push(Event::Html(
                    format!(
                        "<div data-youtube-video=\"\"><iframe src=\"{}\" width=\"640\" height=\"480\" \
                         allowfullscreen=\"true\"></iframe></div>\n",
                        escape_attr(&embed)
                    )
                    .into(),
                )),
                None => {
                    tracing::debug!(%url, "video embed with an unrecognised address; showing a link");
                    events.push(Event::Start(Tag::Paragraph));
                    self.inlines(
                        &[Inline::marked(
                            url.clone(),
                            Marks::default().with(Mark::link(url.clone())),
                        )],
                        events,
                    );
                    events.push(Event::End(TagEnd::Paragraph));
                }
            },
        }
    }

    fn items(&self, items: &[ListItem], events: &mut Vec<Event<'static>>) {
        for item in items {
            events.push(Event::Start(Tag::Item));
            for block in &item.blocks {
                self.block(block, events);
            }
            events.push(Event::End(TagEnd::Item));
        }
    }

    fn inlines(&self, inlines: &[Inline], events: &mut Vec<Event<'static>>) {
        for inline in inlines {
            match inline {
                Inline::Text { text, marks } => text_run(text, marks, events),
                Inline::HardBreak => events.push(Event::HardBreak),
                Inline::Mention { entity_id, label } => {
                    let base = self.options.mention_base.trim_end_matches('/');
                    events.push(Event::InlineHtml(
                        format!(
                            "<a class=\"mention\" data-id=\"{}\" href=\"{}/{}\">@{}</a>",
                            entity_id,
                            escape_attr(base),
                            entity_id,
                            escape_text(label)
                        )
                        .into(),
                    ));
                }
                Inline::Image { src, alt, title } => {
                    if media::parse_web_url(src).is_err() {
                        tracing::debug!(%src, "dropping image with a non-http source");
                        if let Some(alt) = alt {
                            events.push(Event::Text(alt.clone().into()));
                        }
                        continue;
                    }
                    events.push(Event::Start(Tag::Image {
                        link_type: LinkType::Inline,
                        dest_url: src.clone().into(),
                        title: title.clone().unwrap_or_default().into(),
                        id: CowStr::Borrowed(""),
                    }));
                    if let Some(alt) = alt {
                        events.push(Event::Text(alt.clone().into()));
                    }
                    events.push(Event::End(TagEnd::Image));
                }
            }
        }
    }

    /// Text projection of a transport string, for previews.
    pub fn plain_text(&self, source: &str) -> String {
        plain_text(&codec::deserialize(source))
    }
}

/// Text projection of a document: block texts joined by newlines, mentions
/// as `@label`.
pub fn plain_text(doc: &Document) -> String {
    doc.to_string().trim_end_matches('\n').to_string()
}

/// Emit one text node with its marks as nested tags, outermost first:
/// link, bold, italic, strike, underline, highlight, sub/superscript, code.
fn text_run(text: &str, marks: &Marks, events: &mut Vec<Event<'static>>) {
    let link = marks
        .link
        .as_ref()
        .filter(|l| is_safe_href(&l.href))
        .map(|l| l.href.clone());

    if let Some(href) = &link {
        events.push(Event::Start(Tag::Link {
            link_type: LinkType::Inline,
            dest_url: href.clone().into(),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
    }
    if marks.bold {
        events.push(Event::Start(Tag::Strong));
    }
    if marks.italic {
        events.push(Event::Start(Tag::Emphasis));
    }
    if marks.strike {
        events.push(Event::Start(Tag::Strikethrough));
    }

    let mut raw_close = Vec::new();
    if marks.underline {
        events.push(Event::InlineHtml("<u>".into()));
        raw_close.push("</u>");
    }
    if let Some(highlight) = &marks.highlight {
        let open = match highlight.color.as_deref().filter(|c| media::is_safe_color(c)) {
            Some(color) => format!("<mark data-color=\"{0}\" style=\"background-color: {0}\">", color),
            None => "<mark>".to_string(),
        };
        events.push(Event::InlineHtml(open.into()));
        raw_close.push("</mark>");
    }
    if marks.subscript {
        events.push(Event::InlineHtml("<sub>".into()));
        raw_close.push("</sub>");
    } else if marks.superscript {
        events.push(Event::InlineHtml("<sup>".into()));
        raw_close.push("</sup>");
    }

    if marks.code {
        events.push(Event::Code(text.to_string().into()));
    } else {
        events.push(Event::Text(text.to_string().into()));
    }

    for close in raw_close.into_iter().rev() {
        events.push(Event::InlineHtml(close.into()));
    }
    if marks.strike {
        events.push(Event::End(TagEnd::Strikethrough));
    }
    if marks.italic {
        events.push(Event::End(TagEnd::Emphasis));
    }
    if marks.bold {
        events.push(Event::End(TagEnd::Strong));
    }
    if link.is_some() {
        events.push(Event::End(TagEnd::Link));
    }
}

/// Absolute http(s) and mailto links, plus site-relative paths.
fn is_safe_href(href: &str) -> bool {
    (href.starts_with('/') && !href.starts_with("//")) || media::parse_link_url(href).is_ok()
}

fn open_aligned(tag: &str, align: Alignment) -> String {
    format!("<{} style=\"text-align: {}\">", tag, align.as_str())
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;").replace('\'', "&#39;")
}

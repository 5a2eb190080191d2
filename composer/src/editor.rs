//! The composer: a document plus a selection, mutated only through commands.
//!
//! Every command that changes the document is one undoable step and fires
//! the content-change callback with the serialized document. Commands that
//! take a URL validate it first and leave the document alone on rejection.

use std::fmt;

use richdoc::document::{
    Alignment, Block, Inline, ListItem, Mark, MarkKind, Marks, UnitRef, inline_len, normalize_inlines,
    split_inlines, units,
};
use richdoc::{Document, media};

use crate::error::EditError;
use crate::history::{History, Snapshot};
use crate::key::Key;
use crate::lookup::{Entity, EntityLookup, LookupError};
use crate::mention::{KeyOutcome, LookupRequest, MentionConfig, MentionResolver, Suggestion};
use crate::position::{
    Position, Selection, Wrapper, block_at, block_at_mut, block_len, container_mut, leaves, prune_empty,
    textblocks, wrappers,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerConfig {
    pub mentions: MentionConfig,
    pub history_depth: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        ComposerConfig {
            mentions: MentionConfig::default(),
            history_depth: 100,
        }
    }
}

/// Target of [`Composer::set_block_type`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockType {
    Paragraph,
    /// Clamped to 1..=3.
    Heading(u8),
    CodeBlock { language: Option<String> },
}

type ChangeCallback = Box<dyn FnMut(&str) + Send>;

pub struct Composer {
    doc: Document,
    selection: Selection,
    /// Marks for the next typed text, set by toggling a mark on a collapsed
    /// selection.
    stored_marks: Option<Marks>,
    history: History,
    mentions: MentionResolver,
    on_change: Option<ChangeCallback>,
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("doc", &self.doc)
            .field("selection", &self.selection)
            .field("stored_marks", &self.stored_marks)
            .field("mentions", &self.mentions)
            .finish_non_exhaustive()
    }
}

impl Default for Composer {
    fn default() -> Self {
        Composer::new(ComposerConfig::default())
    }
}

impl Composer {
    /// An empty composer: one empty paragraph with the cursor in it.
    pub fn new(config: ComposerConfig) -> Self {
        let mut composer = Composer {
            doc: Document::empty(),
            selection: Selection::default(),
            stored_marks: None,
            history: History::new(config.history_depth),
            mentions: MentionResolver::new(config.mentions),
            on_change: None,
        };
        composer.ensure_cursor();
        composer
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn stored_marks(&self) -> Option<&Marks> {
        self.stored_marks.as_ref()
    }

    pub fn mentions(&self) -> &MentionResolver {
        &self.mentions
    }

    pub fn suggestion(&self) -> Option<&Suggestion> {
        self.mentions.suggestion()
    }

    /// The document in transport form.
    pub fn serialized(&self) -> String {
        richdoc::serialize(&self.doc)
    }

    /// Register the callback fired with the serialized document after every
    /// committed change. Replaces any earlier callback.
    pub fn on_content_change(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    /// Replace the content with a stored post body, for editing. History is
    /// cleared and the cursor lands at the start.
    pub fn load(&mut self, transport: &str) {
        self.doc = richdoc::deserialize(transport);
        self.reset_state();
        tracing::debug!(blocks = self.doc.nodes.len(), "loaded document");
    }

    /// Hand the document off (for submission) and start over empty.
    pub fn take_document(&mut self) -> Document {
        let doc = std::mem::replace(&mut self.doc, Document::empty());
        self.reset_state();
        doc
    }

    fn reset_state(&mut self) {
        self.selection = Selection::default();
        self.stored_marks = None;
        self.history.clear();
        self.mentions.reset();
        self.ensure_cursor();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let current = self.snapshot();
        let Some(previous) = self.history.undo(current) else {
            return false;
        };
        self.restore(previous);
        true
    }

    pub fn redo(&mut self) -> bool {
        let current = self.snapshot();
        let Some(next) = self.history.redo(current) else {
            return false;
        };
        self.restore(next);
        true
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.doc = snapshot.doc;
        self.selection = snapshot.selection;
        self.stored_marks = None;
        self.mentions.reset();
        self.ensure_cursor();
        self.emit();
    }

    /// Route one keystroke. An open suggestion list sees it first.
    pub fn handle_key(&mut self, key: Key) -> Result<(), EditError> {
        match self.mentions.handle_key(&key) {
            KeyOutcome::Confirm(entity) => return self.insert_mention(&entity),
            KeyOutcome::Consumed => return Ok(()),
            KeyOutcome::Ignored => {}
        }

        match key {
            Key::Char(c) => {
                let mut buf = [0u8; 4];
                self.insert_text(c.encode_utf8(&mut buf));
            }
            Key::Enter => self.split_block(),
            Key::ShiftEnter => self.insert_hard_break(),
            Key::Backspace => self.delete_backward(),
            Key::Delete => self.delete_forward(),
            Key::Left => self.move_left(),
            Key::Right => self.move_right(),
            Key::Home => self.move_to_block_start(),
            Key::End => self.move_to_block_end(),
            Key::Tab | Key::Up | Key::Down | Key::Escape => {}
        }
        Ok(())
    }

    /// The suggestion query still waiting for candidates. Hosts that run
    /// lookups concurrently take requests here and hand results back through
    /// [`Composer::apply_lookup`] in whatever order they complete.
    pub fn begin_lookup(&mut self) -> Option<LookupRequest> {
        self.mentions.begin_lookup()
    }

    /// Returns false when `query` is no longer the one being typed.
    pub fn apply_lookup(&mut self, query: &str, result: Result<Vec<Entity>, LookupError>) -> bool {
        self.mentions.apply_lookup(query, result)
    }

    /// Run the pending suggestion lookup, if any, and apply its result.
    /// Returns whether the suggestion changed.
    pub async fn refresh_suggestions(&mut self, lookup: &dyn EntityLookup) -> bool {
        let Some(request) = self.begin_lookup() else {
            return false;
        };
        let result = lookup.lookup(&request.query).await;
        self.apply_lookup(&request.query, result)
    }

    // Text.

    pub fn insert_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.ensure_cursor();
        let before = self.snapshot();
        if !self.selection.is_collapsed() {
            self.delete_selected();
        }

        let typed = if self.in_code_block() {
            self.insert_plain(text, Marks::default())
        } else {
            let marks = self.marks_for_insert();
            let mut typed = 0;
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    self.split_here();
                }
                typed = self.insert_plain(line, marks.clone());
            }
            typed
        };

        self.stored_marks = None;
        self.after_edit(typed);
        self.commit(before, "insert_text");
    }

    pub fn insert_hard_break(&mut self) {
        self.ensure_cursor();
        let before = self.snapshot();
        if !self.selection.is_collapsed() {
            self.delete_selected();
        }
        if self.in_code_block() {
            self.insert_plain("\n", Marks::default());
        } else {
            self.insert_inline(Inline::HardBreak);
        }
        self.after_edit(0);
        self.commit(before, "insert_hard_break");
    }

    /// Enter. Splits the block (or list item) at the cursor; in a code block
    /// it inserts a newline instead. Enter in an empty last list item leaves
    /// the list.
    pub fn split_block(&mut self) {
        self.ensure_cursor();
        let before = self.snapshot();
        if !self.selection.is_collapsed() {
            self.delete_selected();
        }
        if self.in_code_block() {
            self.insert_plain("\n", Marks::default());
        } else {
            self.split_here();
        }
        self.stored_marks = None;
        self.after_edit(0);
        self.commit(before, "split_block");
    }

    /// Backspace. A mention before the cursor goes as a whole.
    pub fn delete_backward(&mut self) {
        self.ensure_cursor();
        let before = self.snapshot();
        if !self.selection.is_collapsed() {
            self.delete_selected();
        } else {
            let at = self.selection.head.clone();
            if at.offset > 0 {
                self.splice(&at.path, at.offset - 1, at.offset, Vec::new());
                self.selection = Selection::collapsed(Position::new(at.path, at.offset - 1));
            } else {
                self.join_backward(&at.path);
            }
        }
        self.stored_marks = None;
        self.after_edit(0);
        self.commit(before, "delete_backward");
    }

    /// Delete. A mention after the cursor goes as a whole.
    pub fn delete_forward(&mut self) {
        self.ensure_cursor();
        let before = self.snapshot();
        if !self.selection.is_collapsed() {
            self.delete_selected();
        } else {
            let at = self.selection.head.clone();
            if at.offset < block_len(&self.doc.nodes, &at.path) {
                self.splice(&at.path, at.offset, at.offset + 1, Vec::new());
            } else {
                self.join_forward(&at.path);
            }
        }
        self.stored_marks = None;
        self.after_edit(0);
        self.commit(before, "delete_forward");
    }

    pub fn delete_selection(&mut self) {
        self.ensure_cursor();
        if self.selection.is_collapsed() {
            return;
        }
        let before = self.snapshot();
        self.delete_selected();
        self.after_edit(0);
        self.commit(before, "delete_selection");
    }

    // Cursor.

    pub fn move_left(&mut self) {
        self.ensure_cursor();
        let at = if !self.selection.is_collapsed() {
            self.selection.from().clone()
        } else {
            let head = self.selection.head.clone();
            if head.offset > 0 {
                Position::new(head.path, head.offset - 1)
            } else {
                match self.neighbor_textblock(&head.path, -1) {
                    Some(prev) => {
                        let len = block_len(&self.doc.nodes, &prev);
                        Position::new(prev, len)
                    }
                    None => head,
                }
            }
        };
        self.move_to(at);
    }

    pub fn move_right(&mut self) {
        self.ensure_cursor();
        let at = if !self.selection.is_collapsed() {
            self.selection.to().clone()
        } else {
            let head = self.selection.head.clone();
            if head.offset < block_len(&self.doc.nodes, &head.path) {
                Position::new(head.path, head.offset + 1)
            } else {
                match self.neighbor_textblock(&head.path, 1) {
                    Some(next) => Position::new(next, 0),
                    None => head,
                }
            }
        };
        self.move_to(at);
    }

    pub fn move_to_block_start(&mut self) {
        self.ensure_cursor();
        let path = self.selection.head.path.clone();
        self.move_to(Position::new(path, 0));
    }

    pub fn move_to_block_end(&mut self) {
        self.ensure_cursor();
        let path = self.selection.head.path.clone();
        let len = block_len(&self.doc.nodes, &path);
        self.move_to(Position::new(path, len));
    }

    fn move_to(&mut self, at: Position) {
        self.selection = Selection::collapsed(at);
        self.stored_marks = None;
        self.after_edit(0);
    }

    /// Both ends must name textblocks; offsets are clamped to the block.
    pub fn set_selection(&mut self, selection: Selection) -> Result<(), EditError> {
        self.ensure_cursor();
        let blocks = textblocks(&self.doc.nodes);
        for end in [&selection.anchor, &selection.head] {
            if !blocks.contains(&end.path) {
                return Err(EditError::InvalidPosition(end.path.clone()));
            }
        }
        let clamp = |p: Position| {
            let len = block_len(&self.doc.nodes, &p.path);
            Position::new(p.path, p.offset.min(len))
        };
        self.selection = Selection::new(clamp(selection.anchor), clamp(selection.head));
        self.stored_marks = None;
        self.after_edit(0);
        Ok(())
    }

    pub fn select_all(&mut self) {
        self.ensure_cursor();
        let blocks = textblocks(&self.doc.nodes);
        let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
            return;
        };
        let len = block_len(&self.doc.nodes, last);
        self.selection = Selection::new(Position::new(first.clone(), 0), Position::new(last.clone(), len));
        self.stored_marks = None;
        self.mentions.reset();
    }

    // Formatting.

    /// Toggle `mark` over the selection. On a collapsed selection the change
    /// applies to the next typed text. A mark counts as present only when
    /// every selected character carries it; highlight and link compare with
    /// their attributes, so a different color replaces the old one.
    pub fn toggle_mark(&mut self, mark: Mark) {
        self.ensure_cursor();
        if self.selection.is_collapsed() {
            let mut marks = self.marks_for_insert();
            if marks.contains(&mark) {
                marks.remove(mark.kind());
            } else {
                marks.insert(mark);
            }
            self.stored_marks = Some(marks);
            return;
        }

        let before = self.snapshot();
        let (from, to) = (self.selection.from().clone(), self.selection.to().clone());
        if self.range_has_mark(&from, &to, &mark) {
            let kind = mark.kind();
            self.map_marks(&from, &to, |marks| marks.remove(kind));
        } else {
            self.map_marks(&from, &to, |marks| marks.insert(mark.clone()));
        }
        self.commit(before, "toggle_mark");
    }

    /// Add a link over the selection, or edit the link under the cursor. On a
    /// collapsed selection outside any link the URL itself is inserted as
    /// linked text. An empty `url` removes the link. Code blocks carry no
    /// links, so a selection covering only code is refused.
    pub fn set_link(&mut self, url: &str) -> Result<(), EditError> {
        self.ensure_cursor();
        let url = url.trim();
        let (from, to) = if self.selection.is_collapsed() {
            self.link_extent().unwrap_or_else(|| {
                let at = self.selection.head.clone();
                (at.clone(), at)
            })
        } else {
            (self.selection.from().clone(), self.selection.to().clone())
        };

        if url.is_empty() {
            if from == to {
                return Ok(());
            }
            let before = self.snapshot();
            self.map_marks(&from, &to, |marks| marks.remove(MarkKind::Link));
            self.commit(before, "unset_link");
            return Ok(());
        }

        media::parse_link_url(url)?;
        if self.only_code(&from, &to) {
            return Err(EditError::NotInCodeBlock { what: "a link" });
        }

        let before = self.snapshot();
        if from == to {
            let marks = self.marks_for_insert().with(Mark::link(url));
            self.insert_plain(url, marks);
        } else {
            self.map_marks(&from, &to, |marks| marks.insert(Mark::link(url)));
        }
        self.after_edit(0);
        self.commit(before, "set_link");
        Ok(())
    }

    /// Convert every textblock touched by the selection. Blocks holding
    /// mentions or images stay as they are when the target is a code block.
    pub fn set_block_type(&mut self, target: BlockType) {
        self.ensure_cursor();
        let before = self.snapshot();
        let (from, to) = (self.selection.from().clone(), self.selection.to().clone());
        let to_code = matches!(target, BlockType::CodeBlock { .. });
        for path in self.touched_textblocks(&from, &to) {
            if let Some(block) = block_at_mut(&mut self.doc.nodes, &path) {
                if to_code && holds_atoms(&block.inlines()) {
                    tracing::trace!(?path, "block with inline atoms kept out of code");
                    continue;
                }
                *block = convert_block(block, &target);
            }
        }
        self.clamp_selection();
        self.after_edit(0);
        self.commit(before, "set_block_type");
    }

    /// `None` restores the default alignment. Code blocks are left alone.
    pub fn set_text_align(&mut self, alignment: Option<Alignment>) {
        self.ensure_cursor();
        let before = self.snapshot();
        let (from, to) = (self.selection.from().clone(), self.selection.to().clone());
        for path in self.touched_textblocks(&from, &to) {
            if let Some(Block::Paragraph { align, .. } | Block::Heading { align, .. }) =
                block_at_mut(&mut self.doc.nodes, &path)
            {
                *align = alignment;
            }
        }
        self.commit(before, "set_text_align");
    }

    pub fn toggle_bullet_list(&mut self) {
        self.toggle_wrapper(Wrapper::BulletList);
    }

    pub fn toggle_ordered_list(&mut self) {
        self.toggle_wrapper(Wrapper::OrderedList);
    }

    pub fn toggle_blockquote(&mut self) {
        self.toggle_wrapper(Wrapper::Blockquote);
    }

    /// Unwrap the nearest wrapper of the same family around the selection
    /// start, switch a list to the other list kind, or wrap the selected run
    /// of sibling blocks.
    fn toggle_wrapper(&mut self, kind: Wrapper) {
        self.ensure_cursor();
        let before = self.snapshot();
        let from = self.selection.from().clone();
        let is_list = |w: Wrapper| matches!(w, Wrapper::BulletList | Wrapper::OrderedList);
        let nearest = wrappers(&self.doc.nodes, &from.path)
            .into_iter()
            .rev()
            .find(|(_, w)| if is_list(kind) { is_list(*w) } else { *w == kind });

        self.preserving_selection(|composer| match nearest {
            Some((path, w)) if w == kind => composer.unwrap_at(&path),
            Some((path, _)) => composer.switch_list(&path, kind),
            None => composer.wrap_selected(kind),
        });
        self.after_edit(0);
        self.commit(before, "toggle_wrapper");
    }

    // Insertion.

    pub fn insert_horizontal_rule(&mut self) {
        self.ensure_cursor();
        let before = self.snapshot();
        self.insert_blocks(vec![Block::HorizontalRule]);
        self.after_edit(0);
        self.commit(before, "insert_horizontal_rule");
    }

    pub fn insert_youtube(&mut self, url: &str) -> Result<(), EditError> {
        let url = url.trim();
        media::youtube_video_id(url)?;
        self.ensure_cursor();
        let before = self.snapshot();
        self.insert_blocks(vec![Block::YoutubeEmbed { url: url.to_string() }]);
        self.after_edit(0);
        self.commit(before, "insert_youtube");
        Ok(())
    }

    pub fn insert_image(&mut self, url: &str, alt: Option<&str>) -> Result<(), EditError> {
        let url = url.trim();
        media::parse_web_url(url)?;
        self.ensure_cursor();
        if self.in_code_block() {
            return Err(EditError::NotInCodeBlock { what: "an image" });
        }
        let before = self.snapshot();
        if !self.selection.is_collapsed() {
            self.delete_selected();
        }
        self.insert_inline(Inline::Image {
            src: url.to_string(),
            alt: alt.map(str::to_string).filter(|a| !a.is_empty()),
            title: None,
        });
        self.after_edit(0);
        self.commit(before, "insert_image");
        Ok(())
    }

    /// Insert a mention of `entity`. With an open suggestion span the span
    /// (trigger through cursor) is replaced; otherwise the mention goes in at
    /// the cursor. One space follows the mention.
    pub fn insert_mention(&mut self, entity: &Entity) -> Result<(), EditError> {
        self.ensure_cursor();
        if self.in_code_block() {
            return Err(EditError::NotInCodeBlock { what: "a mention" });
        }
        let before = self.snapshot();

        let head = self.selection.head.clone();
        let anchor = self
            .mentions
            .suggestion()
            .map(|s| s.anchor.clone())
            .filter(|a| self.selection.is_collapsed() && a.path == head.path && a.offset < head.offset);
        let (path, start, end) = match anchor {
            Some(anchor) => (anchor.path, anchor.offset, head.offset),
            None => {
                if !self.selection.is_collapsed() {
                    self.delete_selected();
                }
                let at = self.selection.head.clone();
                (at.path, at.offset, at.offset)
            }
        };

        self.splice(&path, start, end, vec![Inline::mention(entity.id, entity.name.clone())]);
        let after = start + 1;
        let inlines = self.inlines_at(&path);
        if !matches!(units(&inlines).nth(after), Some(UnitRef::Char(' ', _))) {
            self.splice(&path, after, after, vec![Inline::text(" ")]);
        }
        self.selection = Selection::collapsed(Position::new(path, after + 1));
        self.stored_marks = None;
        self.mentions.reset();
        tracing::debug!(entity = entity.id, label = %entity.name, "inserted mention");
        self.commit(before, "insert_mention");
        Ok(())
    }

    /// Paste Markdown at the cursor. A single pasted paragraph flows into
    /// the current block; anything else goes in as blocks.
    pub fn paste_markdown(&mut self, markdown: &str) {
        self.ensure_cursor();
        if self.in_code_block() {
            self.insert_text(markdown);
            return;
        }
        let pasted = richdoc::from_markdown(markdown);
        if pasted.is_empty() {
            return;
        }

        let before = self.snapshot();
        if !self.selection.is_collapsed() {
            self.delete_selected();
        }
        match pasted.nodes.as_slice() {
            [Block::Paragraph { content, .. }] => {
                let at = self.selection.head.clone();
                let len = inline_len(content);
                self.splice(&at.path, at.offset, at.offset, content.clone());
                self.selection = Selection::collapsed(Position::new(at.path, at.offset + len));
            }
            _ => self.insert_blocks(pasted.nodes),
        }
        self.after_edit(0);
        self.commit(before, "paste_markdown");
    }

    // Internals.

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            doc: self.doc.clone(),
            selection: self.selection.clone(),
        }
    }

    /// Record `before` as an undo step when the document changed.
    fn commit(&mut self, before: Snapshot, command: &'static str) -> bool {
        if before.doc == self.doc {
            return false;
        }
        tracing::trace!(command, "committed");
        self.history.record(before);
        self.emit();
        true
    }

    fn emit(&mut self) {
        if self.on_change.is_none() {
            return;
        }
        let serialized = richdoc::serialize(&self.doc);
        if let Some(callback) = self.on_change.as_mut() {
            callback(&serialized);
        }
    }

    /// Keep at least one textblock and both selection ends inside one.
    fn ensure_cursor(&mut self) {
        if textblocks(&self.doc.nodes).is_empty() {
            self.doc.nodes.push(Block::paragraph(Vec::new()));
            let at = Position::new(vec![self.doc.nodes.len() - 1], 0);
            self.selection = Selection::collapsed(at);
            return;
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let blocks = textblocks(&self.doc.nodes);
        let anchor = clamp_position(&self.doc.nodes, &blocks, &self.selection.anchor);
        let head = clamp_position(&self.doc.nodes, &blocks, &self.selection.head);
        self.selection = Selection::new(anchor, head);
    }

    /// Let the mention resolver follow the edit.
    fn after_edit(&mut self, typed: usize) {
        if !self.selection.is_collapsed() {
            self.mentions.reset();
            return;
        }
        let cursor = self.selection.head.clone();
        let inlines = self.inlines_at(&cursor.path);
        let in_code = self.in_code_block();
        self.mentions.observe(&inlines, &cursor, in_code, typed);
    }

    fn in_code_block(&self) -> bool {
        matches!(
            block_at(&self.doc.nodes, &self.selection.head.path),
            Some(Block::CodeBlock { .. })
        )
    }

    fn inlines_at(&self, path: &[usize]) -> Vec<Inline> {
        block_at(&self.doc.nodes, path)
            .map(Block::inlines)
            .unwrap_or_default()
    }

    /// Inlines of the textblock at `path` as they read once moved into
    /// another block: code lines come apart at hard breaks.
    fn movable_inlines(&self, path: &[usize]) -> Vec<Inline> {
        match block_at(&self.doc.nodes, path) {
            Some(Block::CodeBlock { content, .. }) => code_to_inlines(content),
            _ => self.inlines_at(path),
        }
    }

    /// Whether `inlines` can move into the textblock at `path` without
    /// losing anything. Code blocks hold plain text only.
    fn accepts(&self, path: &[usize], inlines: &[Inline]) -> bool {
        !(matches!(block_at(&self.doc.nodes, path), Some(Block::CodeBlock { .. })) && holds_atoms(inlines))
    }

    fn set_inlines_at(&mut self, path: &[usize], inlines: Vec<Inline>) {
        if let Some(block) = block_at_mut(&mut self.doc.nodes, path) {
            block.set_inlines(inlines);
        }
    }

    /// Replace units `from..to` of the textblock at `path`.
    fn splice(&mut self, path: &[usize], from: usize, to: usize, insert: Vec<Inline>) {
        let (mut out, rest) = split_inlines(self.inlines_at(path), from);
        let (_, right) = split_inlines(rest, to.saturating_sub(from));
        out.extend(insert);
        out.extend(right);
        self.set_inlines_at(path, out);
    }

    /// Insert text at the collapsed cursor and move past it. Returns the
    /// number of units inserted.
    fn insert_plain(&mut self, text: &str, marks: Marks) -> usize {
        if text.is_empty() {
            return 0;
        }
        let at = self.selection.head.clone();
        let len = text.chars().count();
        self.splice(&at.path, at.offset, at.offset, vec![Inline::marked(text, marks)]);
        self.selection = Selection::collapsed(Position::new(at.path, at.offset + len));
        len
    }

    fn insert_inline(&mut self, inline: Inline) {
        let at = self.selection.head.clone();
        self.splice(&at.path, at.offset, at.offset, vec![inline]);
        self.selection = Selection::collapsed(Position::new(at.path, at.offset + 1));
    }

    /// Marks that typed text picks up: stored marks, else those of the
    /// character before the cursor (or after it at the block start).
    fn marks_for_insert(&self) -> Marks {
        if let Some(marks) = &self.stored_marks {
            return marks.clone();
        }
        let at = &self.selection.head;
        let inlines = self.inlines_at(&at.path);
        let unit = match at.offset.checked_sub(1) {
            Some(i) => units(&inlines).nth(i),
            None => units(&inlines).next(),
        };
        match unit {
            Some(UnitRef::Char(_, marks)) => marks.clone(),
            _ => Marks::default(),
        }
    }

    fn neighbor_textblock(&self, path: &[usize], step: isize) -> Option<Vec<usize>> {
        let blocks = textblocks(&self.doc.nodes);
        let i = blocks.iter().position(|p| p == path)?;
        let j = i.checked_add_signed(step)?;
        blocks.get(j).cloned()
    }

    /// `(path, start, end)` for every textblock between `from` and `to`.
    fn touched_segments(&self, from: &Position, to: &Position) -> Vec<(Vec<usize>, usize, usize)> {
        textblocks(&self.doc.nodes)
            .into_iter()
            .filter(|path| *path >= from.path && *path <= to.path)
            .map(|path| {
                let start = if path == from.path { from.offset } else { 0 };
                let end = if path == to.path {
                    to.offset
                } else {
                    block_len(&self.doc.nodes, &path)
                };
                (path, start, end)
            })
            .collect()
    }

    /// True when every textblock in `from..=to` is a code block.
    fn only_code(&self, from: &Position, to: &Position) -> bool {
        self.touched_textblocks(from, to)
            .iter()
            .all(|path| matches!(block_at(&self.doc.nodes, path), Some(Block::CodeBlock { .. })))
    }

    fn touched_textblocks(&self, from: &Position, to: &Position) -> Vec<Vec<usize>> {
        self.touched_segments(from, to)
            .into_iter()
            .map(|(path, _, _)| path)
            .collect()
    }

    /// Apply `f` to the marks of every text unit in `from..to`. Code blocks
    /// carry no marks and are skipped.
    fn map_marks(&mut self, from: &Position, to: &Position, f: impl Fn(&mut Marks)) {
        for (path, start, end) in self.touched_segments(from, to) {
            if start >= end || matches!(block_at(&self.doc.nodes, &path), Some(Block::CodeBlock { .. })) {
                continue;
            }
            let (mut out, rest) = split_inlines(self.inlines_at(&path), start);
            let (middle, right) = split_inlines(rest, end - start);
            out.extend(middle.into_iter().map(|inline| match inline {
                Inline::Text { text, mut marks } => {
                    f(&mut marks);
                    Inline::Text { text, marks }
                }
                other => other,
            }));
            out.extend(right);
            self.set_inlines_at(&path, out);
        }
    }

    fn range_has_mark(&self, from: &Position, to: &Position, mark: &Mark) -> bool {
        let mut seen = false;
        for (path, start, end) in self.touched_segments(from, to) {
            if matches!(block_at(&self.doc.nodes, &path), Some(Block::CodeBlock { .. })) {
                continue;
            }
            let inlines = self.inlines_at(&path);
            for unit in units(&inlines).skip(start).take(end.saturating_sub(start)) {
                if let UnitRef::Char(_, marks) = unit {
                    if !marks.contains(mark) {
                        return false;
                    }
                    seen = true;
                }
            }
        }
        seen
    }

    /// The run of same-link text touching the collapsed cursor.
    fn link_extent(&self) -> Option<(Position, Position)> {
        let at = &self.selection.head;
        let inlines = self.inlines_at(&at.path);
        let links: Vec<Option<&str>> = units(&inlines)
            .map(|unit| match unit {
                UnitRef::Char(_, marks) => marks.link.as_ref().map(|l| l.href.as_str()),
                UnitRef::Node(_) => None,
            })
            .collect();
        let hit = at
            .offset
            .checked_sub(1)
            .filter(|&i| links.get(i).copied().flatten().is_some())
            .or_else(|| Some(at.offset).filter(|&i| links.get(i).copied().flatten().is_some()))?;
        let href = links[hit];

        let mut start = hit;
        while start > 0 && links[start - 1] == href {
            start -= 1;
        }
        let mut end = hit + 1;
        while end < links.len() && links[end] == href {
            end += 1;
        }
        Some((
            Position::new(at.path.clone(), start),
            Position::new(at.path.clone(), end),
        ))
    }

    /// Delete the selected range and collapse onto its start.
    fn delete_selected(&mut self) {
        let (from, to) = (self.selection.from().clone(), self.selection.to().clone());
        let path = self.delete_range(&from, &to);
        self.selection = Selection::collapsed(Position::new(path, from.offset));
    }

    /// Returns the path of the block holding `from` afterwards.
    fn delete_range(&mut self, from: &Position, to: &Position) -> Vec<usize> {
        if from.path == to.path {
            self.splice(&from.path, from.offset, to.offset, Vec::new());
            return from.path.clone();
        }

        let (_, tail) = split_inlines(self.movable_inlines(&to.path), to.offset);
        if !self.accepts(&from.path, &tail) {
            if let Some(block) = block_at_mut(&mut self.doc.nodes, &from.path) {
                *block = convert_block(block, &BlockType::Paragraph);
            }
        }
        let (mut merged, _) = split_inlines(self.inlines_at(&from.path), from.offset);
        merged.extend(tail);
        self.set_inlines_at(&from.path, merged);

        let doomed: Vec<Vec<usize>> = leaves(&self.doc.nodes)
            .into_iter()
            .filter(|p| *p > from.path && *p <= to.path)
            .collect();
        self.remove_leaves(doomed, &from.path)
    }

    /// Remove the given leaf blocks and any container they leave empty.
    /// `keep` is a textblock that is not removed; its new path is returned.
    /// Removed leaves must be atoms or come after `keep`.
    fn remove_leaves(&mut self, mut doomed: Vec<Vec<usize>>, keep: &[usize]) -> Vec<usize> {
        let keep_index = textblocks(&self.doc.nodes).iter().position(|p| p == keep);
        doomed.sort();
        for path in doomed.iter().rev() {
            let Some((&last, prefix)) = path.split_last() else {
                continue;
            };
            if let Some(container) = container_mut(&mut self.doc.nodes, prefix) {
                if last < container.len() {
                    container.remove(last);
                }
            }
        }
        prune_empty(&mut self.doc.nodes);
        keep_index
            .and_then(|i| textblocks(&self.doc.nodes).get(i).cloned())
            .unwrap_or_else(|| keep.to_vec())
    }

    /// Backspace at the start of a block.
    fn join_backward(&mut self, path: &[usize]) {
        let all = leaves(&self.doc.nodes);
        let Some(i) = all.iter().position(|p| p == path) else {
            return;
        };
        let Some(prev) = i.checked_sub(1).map(|j| all[j].clone()) else {
            // At the very start a heading or code block falls back to a paragraph.
            if let Some(block) = block_at_mut(&mut self.doc.nodes, path) {
                if matches!(block, Block::Heading { .. } | Block::CodeBlock { .. }) {
                    *block = convert_block(block, &BlockType::Paragraph);
                }
            }
            return;
        };

        if block_at(&self.doc.nodes, &prev).is_some_and(Block::is_atom) {
            let kept = self.remove_leaves(vec![prev], path);
            self.selection = Selection::collapsed(Position::new(kept, 0));
            return;
        }

        let offset = block_len(&self.doc.nodes, &prev);
        let moving = self.movable_inlines(path);
        if !self.accepts(&prev, &moving) {
            self.selection = Selection::collapsed(Position::new(prev, offset));
            return;
        }
        let mut merged = self.inlines_at(&prev);
        merged.extend(moving);
        self.set_inlines_at(&prev, merged);
        let kept = self.remove_leaves(vec![path.to_vec()], &prev);
        self.selection = Selection::collapsed(Position::new(kept, offset));
    }

    /// Delete at the end of a block.
    fn join_forward(&mut self, path: &[usize]) {
        let all = leaves(&self.doc.nodes);
        let Some(next) = all
            .iter()
            .position(|p| p == path)
            .and_then(|i| all.get(i + 1))
            .cloned()
        else {
            return;
        };
        let offset = self.selection.head.offset;

        if !block_at(&self.doc.nodes, &next).is_some_and(Block::is_atom) {
            let moving = self.movable_inlines(&next);
            if !self.accepts(path, &moving) {
                self.selection = Selection::collapsed(Position::new(next, 0));
                return;
            }
            let mut merged = self.inlines_at(path);
            merged.extend(moving);
            self.set_inlines_at(path, merged);
        }
        let kept = self.remove_leaves(vec![next], path);
        self.selection = Selection::collapsed(Position::new(kept, offset));
    }

    /// Split the textblock at the collapsed cursor.
    fn split_here(&mut self) {
        let at = self.selection.head.clone();
        if let Some(path) = self.lift_empty_list_item(&at.path) {
            self.selection = Selection::collapsed(Position::new(path, 0));
            return;
        }
        let Some(block) = block_at(&self.doc.nodes, &at.path).cloned() else {
            return;
        };
        let Some((&index, prefix)) = at.path.split_last() else {
            return;
        };

        let at_end = at.offset >= block_len(&self.doc.nodes, &at.path);
        let (left, right) = split_inlines(block.inlines(), at.offset);
        let mut first = block.clone();
        first.set_inlines(left);
        let mut second = match &block {
            Block::Heading { align, .. } if at_end => Block::Paragraph {
                align: *align,
                content: Vec::new(),
            },
            _ => block,
        };
        second.set_inlines(right);

        let in_item = matches!(
            wrappers(&self.doc.nodes, &at.path).last(),
            Some((p, Wrapper::BulletList | Wrapper::OrderedList)) if p.len() + 2 == at.path.len()
        );

        let new_path = if in_item {
            let list_path = &prefix[..prefix.len() - 1];
            let item_index = prefix[prefix.len() - 1];
            let Some(Block::BulletList { items } | Block::OrderedList { items, .. }) =
                block_at_mut(&mut self.doc.nodes, list_path)
            else {
                return;
            };
            let Some(item) = items.get_mut(item_index) else {
                return;
            };
            let rest = item.blocks.split_off(index + 1);
            item.blocks[index] = first;
            let mut moved = vec![second];
            moved.extend(rest);
            items.insert(item_index + 1, ListItem { blocks: moved });
            let mut path = list_path.to_vec();
            path.extend([item_index + 1, 0]);
            path
        } else {
            let Some(container) = container_mut(&mut self.doc.nodes, prefix) else {
                return;
            };
            container[index] = first;
            container.insert(index + 1, second);
            let mut path = prefix.to_vec();
            path.push(index + 1);
            path
        };
        self.selection = Selection::collapsed(Position::new(new_path, 0));
    }

    /// Enter in an empty paragraph that is the only block of the last list
    /// item moves it out below the list. Returns its new path.
    fn lift_empty_list_item(&mut self, path: &[usize]) -> Option<Vec<usize>> {
        if path.len() < 3 {
            return None;
        }
        if !matches!(block_at(&self.doc.nodes, path)?, Block::Paragraph { content, .. } if content.is_empty()) {
            return None;
        }
        let list_path = &path[..path.len() - 2];
        let item_index = path[path.len() - 2];
        let (&list_index, list_prefix) = list_path.split_last()?;

        let container = container_mut(&mut self.doc.nodes, list_prefix)?;
        let (Block::BulletList { items } | Block::OrderedList { items, .. }) = container.get_mut(list_index)? else {
            return None;
        };
        if item_index + 1 != items.len() || items[item_index].blocks.len() != 1 {
            return None;
        }
        items.pop();
        let emptied = items.is_empty();

        let mut new_path = list_prefix.to_vec();
        if emptied {
            container[list_index] = Block::paragraph(Vec::new());
            new_path.push(list_index);
        } else {
            container.insert(list_index + 1, Block::paragraph(Vec::new()));
            new_path.push(list_index + 1);
        }
        Some(new_path)
    }

    /// Insert whole blocks at the cursor, splitting the current textblock
    /// around them. The cursor lands at the start of the split-off tail.
    fn insert_blocks(&mut self, blocks: Vec<Block>) {
        if !self.selection.is_collapsed() {
            self.delete_selected();
        }
        let at = self.selection.head.clone();
        let Some(block) = block_at(&self.doc.nodes, &at.path).cloned() else {
            return;
        };
        let Some((&index, prefix)) = at.path.split_last() else {
            return;
        };

        let (left, right) = split_inlines(block.inlines(), at.offset);
        let keep_first = at.offset > 0;
        let mut first = block.clone();
        first.set_inlines(left);
        let mut second = block;
        second.set_inlines(right);

        let inserted = blocks.len();
        let mut replacement = Vec::with_capacity(inserted + 2);
        if keep_first {
            replacement.push(first);
        }
        replacement.extend(blocks);
        replacement.push(second);

        let Some(container) = container_mut(&mut self.doc.nodes, prefix) else {
            return;
        };
        container.splice(index..=index, replacement);

        let mut path = prefix.to_vec();
        path.push(index + inserted + usize::from(keep_first));
        self.selection = Selection::collapsed(Position::new(path, 0));
        self.clamp_selection();
    }

    /// Run a structural change that keeps the set of textblocks intact and
    /// follow the selection by textblock index.
    fn preserving_selection(&mut self, change: impl FnOnce(&mut Self)) {
        let blocks = textblocks(&self.doc.nodes);
        let index_of = |p: &Position| blocks.iter().position(|b| *b == p.path);
        let anchor = (index_of(&self.selection.anchor), self.selection.anchor.offset);
        let head = (index_of(&self.selection.head), self.selection.head.offset);

        change(self);

        let blocks = textblocks(&self.doc.nodes);
        let relocate = |(index, offset): (Option<usize>, usize), fallback: &Position| match index
            .and_then(|i| blocks.get(i))
        {
            Some(path) => Position::new(path.clone(), offset),
            None => fallback.clone(),
        };
        self.selection = Selection::new(
            relocate(anchor, &self.selection.anchor),
            relocate(head, &self.selection.head),
        );
        self.clamp_selection();
    }

    fn unwrap_at(&mut self, path: &[usize]) {
        let Some((&index, prefix)) = path.split_last() else {
            return;
        };
        let Some(container) = container_mut(&mut self.doc.nodes, prefix) else {
            return;
        };
        if index >= container.len() {
            return;
        }
        let inner = match container.remove(index) {
            Block::Blockquote { blocks } => blocks,
            Block::BulletList { items } | Block::OrderedList { items, .. } => {
                items.into_iter().flat_map(|item| item.blocks).collect()
            }
            other => vec![other],
        };
        container.splice(index..index, inner);
    }

    fn switch_list(&mut self, path: &[usize], kind: Wrapper) {
        let Some(block) = block_at_mut(&mut self.doc.nodes, path) else {
            return;
        };
        let items = match block {
            Block::BulletList { items } | Block::OrderedList { items, .. } => std::mem::take(items),
            _ => return,
        };
        *block = match kind {
            Wrapper::OrderedList => Block::OrderedList { start: 1, items },
            _ => Block::BulletList { items },
        };
    }

    /// Wrap the run of siblings from the selection start's block to the
    /// sibling that contains the selection end.
    fn wrap_selected(&mut self, kind: Wrapper) {
        let (from, to) = (self.selection.from().clone(), self.selection.to().clone());
        let Some((&first, prefix)) = from.path.split_last() else {
            return;
        };
        let last = if to.path.len() > prefix.len() && to.path[..prefix.len()] == *prefix {
            to.path[prefix.len()].max(first)
        } else {
            first
        };
        let Some(container) = container_mut(&mut self.doc.nodes, prefix) else {
            return;
        };
        if last >= container.len() {
            return;
        }

        let run: Vec<Block> = container.drain(first..=last).collect();
        let into_items = |run: Vec<Block>| -> Vec<ListItem> {
            run.into_iter()
                .map(|block| ListItem { blocks: vec![block] })
                .collect()
        };
        let wrapped = match kind {
            Wrapper::Blockquote => Block::Blockquote { blocks: run },
            Wrapper::BulletList => Block::BulletList {
                items: into_items(run),
            },
            Wrapper::OrderedList => Block::OrderedList {
                start: 1,
                items: into_items(run),
            },
        };
        container.insert(first, wrapped);
    }
}

fn clamp_position(blocks: &[Block], textblocks: &[Vec<usize>], pos: &Position) -> Position {
    let path = if textblocks.contains(&pos.path) {
        pos.path.clone()
    } else {
        textblocks
            .iter()
            .find(|p| **p >= pos.path)
            .or(textblocks.last())
            .cloned()
            .unwrap_or_default()
    };
    let len = block_len(blocks, &path);
    Position::new(path, pos.offset.min(len))
}

/// Convert a textblock, keeping its content. Code block newlines become
/// hard breaks and back, so unit offsets survive.
fn convert_block(block: &Block, target: &BlockType) -> Block {
    let align = match block {
        Block::Paragraph { align, .. } | Block::Heading { align, .. } => *align,
        _ => None,
    };
    let content = match block {
        Block::CodeBlock { content, .. } => code_to_inlines(content),
        other => other.inlines(),
    };
    match target {
        BlockType::Paragraph => Block::Paragraph { align, content },
        BlockType::Heading(level) => Block::Heading {
            level: (*level).clamp(1, 3),
            align,
            content,
        },
        BlockType::CodeBlock { language } => {
            let mut code = Block::CodeBlock {
                language: language.clone(),
                content: String::new(),
            };
            code.set_inlines(content);
            code
        }
    }
}

fn holds_atoms(inlines: &[Inline]) -> bool {
    inlines
        .iter()
        .any(|i| matches!(i, Inline::Mention { .. } | Inline::Image { .. }))
}

fn code_to_inlines(code: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    for (i, line) in code.split('\n').enumerate() {
        if i > 0 {
            out.push(Inline::HardBreak);
        }
        out.push(Inline::text(line));
    }
    normalize_inlines(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use richdoc::document::Highlight;

    fn typed(text: &str) -> Composer {
        let mut composer = Composer::default();
        composer.insert_text(text);
        composer
    }

    fn select(composer: &mut Composer, path: &[usize], from: usize, to: usize) {
        composer
            .set_selection(Selection::new(
                Position::new(path.to_vec(), from),
                Position::new(path.to_vec(), to),
            ))
            .unwrap();
    }

    fn paragraphs(doc: &Document) -> Vec<String> {
        doc.to_string().lines().map(str::to_string).collect()
    }

    #[test]
    fn starts_with_one_empty_paragraph() {
        let composer = Composer::default();
        assert_eq!(composer.document().nodes, vec![Block::paragraph(vec![])]);
        assert_eq!(composer.selection().head, Position::new(vec![0], 0));
        assert!(!composer.can_undo());
    }

    #[test]
    fn typing_and_newlines_split_paragraphs() {
        let composer = typed("one\ntwo");
        assert_eq!(paragraphs(composer.document()), vec!["one", "two"]);
        assert_eq!(composer.selection().head, Position::new(vec![1], 3));
    }

    #[test]
    fn stored_marks_apply_to_the_next_text() {
        let mut composer = typed("a");
        composer.toggle_mark(Mark::Bold);
        composer.insert_text("b");
        composer.toggle_mark(Mark::Bold);
        composer.insert_text("c");
        let bold = Marks::default().with(Mark::Bold);
        assert_eq!(
            composer.document().nodes,
            vec![Block::paragraph(vec![
                Inline::text("a"),
                Inline::marked("b", bold),
                Inline::text("c"),
            ])]
        );
    }

    #[test]
    fn toggling_a_mark_twice_over_a_range_removes_it() {
        let mut composer = typed("hello world");
        select(&mut composer, &[0], 0, 5);
        composer.toggle_mark(Mark::Italic);
        let italic = Marks::default().with(Mark::Italic);
        assert_eq!(
            composer.document().nodes[0],
            Block::paragraph(vec![Inline::marked("hello", italic), Inline::text(" world")])
        );
        composer.toggle_mark(Mark::Italic);
        assert_eq!(composer.document().nodes[0], Block::paragraph(vec![Inline::text("hello world")]));
    }

    #[test]
    fn highlight_with_another_color_replaces_the_old_one() {
        let mut composer = typed("hi");
        select(&mut composer, &[0], 0, 2);
        composer.toggle_mark(Mark::highlight(Some("#ffc078")));
        composer.toggle_mark(Mark::highlight(Some("#8ce99a")));
        let Block::Paragraph { content, .. } = &composer.document().nodes[0] else {
            panic!("expected a paragraph");
        };
        let Inline::Text { marks, .. } = &content[0] else {
            panic!("expected text");
        };
        assert_eq!(
            marks.highlight,
            Some(Highlight {
                color: Some("#8ce99a".into())
            })
        );
    }

    #[test]
    fn backspace_joins_with_the_previous_block() {
        let mut composer = typed("ab\ncd");
        composer.move_to_block_start();
        composer.delete_backward();
        assert_eq!(paragraphs(composer.document()), vec!["abcd"]);
        assert_eq!(composer.selection().head, Position::new(vec![0], 2));
    }

    #[test]
    fn backspace_after_a_rule_removes_the_rule() {
        let mut composer = typed("ab");
        composer.insert_horizontal_rule();
        assert_eq!(composer.document().nodes.len(), 3);
        assert_eq!(composer.document().nodes[1], Block::HorizontalRule);
        assert_eq!(composer.selection().head, Position::new(vec![2], 0));
        composer.delete_backward();
        assert_eq!(
            composer.document().nodes,
            vec![Block::paragraph(vec![Inline::text("ab")]), Block::paragraph(vec![])]
        );
        assert_eq!(composer.selection().head, Position::new(vec![1], 0));
    }

    #[test]
    fn rule_in_the_middle_splits_the_block() {
        let mut composer = typed("abcd");
        select(&mut composer, &[0], 2, 2);
        composer.insert_horizontal_rule();
        assert_eq!(
            composer.document().nodes,
            vec![
                Block::paragraph(vec![Inline::text("ab")]),
                Block::HorizontalRule,
                Block::paragraph(vec![Inline::text("cd")]),
            ]
        );
        assert_eq!(composer.selection().head, Position::new(vec![2], 0));
    }

    #[test]
    fn deleting_across_blocks_merges_the_ends() {
        let mut composer = typed("one\ntwo\nthree");
        composer
            .set_selection(Selection::new(Position::new(vec![0], 1), Position::new(vec![2], 2)))
            .unwrap();
        composer.delete_selection();
        assert_eq!(paragraphs(composer.document()), vec!["oree"]);
        assert_eq!(composer.selection().head, Position::new(vec![0], 1));
    }

    #[test]
    fn heading_enter_at_end_continues_with_a_paragraph() {
        let mut composer = typed("Title");
        composer.set_block_type(BlockType::Heading(2));
        composer.split_block();
        composer.insert_text("body");
        assert_eq!(
            composer.document().nodes,
            vec![
                Block::heading(2, vec![Inline::text("Title")]),
                Block::paragraph(vec![Inline::text("body")]),
            ]
        );
    }

    #[test]
    fn code_block_conversion_keeps_lines() {
        let mut composer = typed("let x = 1;");
        composer.insert_hard_break();
        composer.insert_text("x");
        composer.set_block_type(BlockType::CodeBlock {
            language: Some("rust".into()),
        });
        assert_eq!(
            composer.document().nodes,
            vec![Block::CodeBlock {
                language: Some("rust".into()),
                content: "let x = 1;\nx".into(),
            }]
        );
        composer.split_block();
        composer.insert_text("y");
        assert_eq!(composer.document().to_string(), "```rust\nlet x = 1;\nx\ny\n```\n");
    }

    #[test]
    fn lists_split_per_item_and_exit_on_empty_item() {
        let mut composer = typed("first");
        composer.toggle_bullet_list();
        composer.split_block();
        composer.insert_text("second");
        composer.split_block();
        composer.split_block();
        composer.insert_text("after");
        assert_eq!(
            composer.document().nodes,
            vec![
                Block::BulletList {
                    items: vec![
                        ListItem::paragraph(vec![Inline::text("first")]),
                        ListItem::paragraph(vec![Inline::text("second")]),
                    ],
                },
                Block::paragraph(vec![Inline::text("after")]),
            ]
        );
    }

    #[test]
    fn list_toggles_switch_and_unwrap() {
        let mut composer = typed("a\nb");
        composer.select_all();
        composer.toggle_ordered_list();
        assert!(matches!(&composer.document().nodes[0], Block::OrderedList { items, .. } if items.len() == 2));
        composer.toggle_bullet_list();
        assert!(matches!(&composer.document().nodes[0], Block::BulletList { items } if items.len() == 2));
        composer.toggle_bullet_list();
        assert_eq!(paragraphs(composer.document()), vec!["a", "b"]);
        assert_eq!(composer.selection().head, Position::new(vec![1], 1));
    }

    #[test]
    fn blockquote_wraps_and_unwraps() {
        let mut composer = typed("quote me");
        composer.toggle_blockquote();
        assert_eq!(
            composer.document().nodes,
            vec![Block::Blockquote {
                blocks: vec![Block::paragraph(vec![Inline::text("quote me")])],
            }]
        );
        assert_eq!(composer.selection().head, Position::new(vec![0, 0], 8));
        composer.toggle_blockquote();
        assert_eq!(composer.document().nodes, vec![Block::paragraph(vec![Inline::text("quote me")])]);
    }

    #[test]
    fn alignment_is_stored_on_the_block() {
        let mut composer = typed("centered");
        composer.set_text_align(Some(Alignment::Center));
        assert_eq!(
            composer.document().nodes[0],
            Block::Paragraph {
                align: Some(Alignment::Center),
                content: vec![Inline::text("centered")],
            }
        );
    }

    #[test]
    fn collapsed_link_inserts_the_url_and_empty_url_unlinks() {
        let mut composer = typed("see ");
        composer.set_link("https://example.com").unwrap();
        let linked = Marks::default().with(Mark::link("https://example.com"));
        assert_eq!(
            composer.document().nodes[0],
            Block::paragraph(vec![
                Inline::text("see "),
                Inline::marked("https://example.com", linked),
            ])
        );
        composer.set_link("").unwrap();
        assert_eq!(
            composer.document().nodes[0],
            Block::paragraph(vec![Inline::text("see https://example.com")])
        );
    }

    #[test]
    fn media_commands_validate_first() {
        let mut composer = typed("x");
        assert_eq!(
            composer.insert_image("ftp://host/pic.png", None),
            Err(EditError::InvalidUrl("ftp://host/pic.png".into()))
        );
        assert!(matches!(
            composer.insert_youtube("https://vimeo.com/1"),
            Err(EditError::NotAVideoUrl(_))
        ));
        assert_eq!(composer.document().nodes, vec![Block::paragraph(vec![Inline::text("x")])]);

        composer
            .insert_youtube("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .unwrap();
        assert!(composer.document().nodes.contains(&Block::YoutubeEmbed {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into()
        }));
    }

    #[test]
    fn images_are_one_unit() {
        let mut composer = typed("a");
        composer
            .insert_image("https://cdn.uni.edu/a.png", Some("poster"))
            .unwrap();
        composer.insert_text("b");
        assert_eq!(composer.selection().head, Position::new(vec![0], 3));
        composer.move_left();
        composer.delete_backward();
        assert_eq!(composer.document().nodes, vec![Block::paragraph(vec![Inline::text("ab")])]);
    }

    #[test]
    fn mentions_are_refused_in_code() {
        let mut composer = Composer::default();
        composer.set_block_type(BlockType::CodeBlock { language: None });
        assert_eq!(
            composer.insert_mention(&Entity::new(7, "Chess Club")),
            Err(EditError::NotInCodeBlock { what: "a mention" })
        );
    }

    #[test]
    fn pasted_markdown_flows_or_splits() {
        let mut composer = typed("x");
        composer.paste_markdown("**bold**");
        let bold = Marks::default().with(Mark::Bold);
        assert_eq!(
            composer.document().nodes,
            vec![Block::paragraph(vec![Inline::text("x"), Inline::marked("bold", bold)])]
        );

        let mut composer = Composer::default();
        composer.paste_markdown("# Title\n\n- item");
        assert_eq!(composer.document().nodes[0], Block::heading(1, vec![Inline::text("Title")]));
        assert!(matches!(composer.document().nodes[1], Block::BulletList { .. }));
    }

    #[test]
    fn cursor_moves_hop_between_blocks() {
        let mut composer = typed("ab\ncd");
        composer.move_to_block_start();
        composer.move_left();
        assert_eq!(composer.selection().head, Position::new(vec![0], 2));
        composer.move_right();
        assert_eq!(composer.selection().head, Position::new(vec![1], 0));
    }

    #[test]
    fn selection_outside_textblocks_is_rejected() {
        let mut composer = typed("a");
        composer.insert_horizontal_rule();
        let err = composer.set_selection(Selection::collapsed(Position::new(vec![1], 0)));
        assert_eq!(err, Err(EditError::InvalidPosition(vec![1])));
    }

    #[test]
    fn take_document_resets() {
        let mut composer = typed("draft");
        let doc = composer.take_document();
        assert_eq!(doc.to_string(), "draft\n");
        assert_eq!(composer.document().nodes, vec![Block::paragraph(vec![])]);
        assert!(!composer.can_undo());
    }

    const CODE_THEN_MENTION: &str = r#"{"type":"doc","content":[
        {"type":"codeBlock","content":[{"type":"text","text":"ab\ncd"}]},
        {"type":"paragraph","content":[{"type":"text","text":"xy"},
            {"type":"mention","attrs":{"id":7,"label":"Chess Club"}},{"type":"text","text":" z"}]}]}"#;

    #[test]
    fn deleting_from_code_into_a_mention_keeps_the_mention() {
        let mut composer = Composer::default();
        composer.load(CODE_THEN_MENTION);
        composer
            .set_selection(Selection::new(
                Position::new(vec![0], 2),
                Position::new(vec![1], 1),
            ))
            .unwrap();
        composer.delete_selection();
        assert_eq!(
            composer.document().nodes,
            vec![Block::paragraph(vec![
                Inline::text("aby"),
                Inline::mention(7, "Chess Club"),
                Inline::text(" z"),
            ])]
        );
        assert_eq!(composer.selection().head, Position::new(vec![0], 2));
    }

    #[test]
    fn delete_at_the_end_of_code_steps_over_a_mention_paragraph() {
        let mut composer = Composer::default();
        composer.load(CODE_THEN_MENTION);
        composer
            .set_selection(Selection::collapsed(Position::new(vec![0], 5)))
            .unwrap();
        let before = composer.document().clone();
        composer.delete_forward();
        assert_eq!(composer.document(), &before);
        assert_eq!(composer.selection().head, Position::new(vec![1], 0));
        assert!(!composer.can_undo());
    }

    #[test]
    fn joining_code_into_a_paragraph_turns_lines_into_breaks() {
        let mut composer = Composer::default();
        composer.load(
            r#"{"type":"doc","content":[{"type":"paragraph","content":[{"type":"text","text":"a"}]},
            {"type":"codeBlock","content":[{"type":"text","text":"x\ny"}]}]}"#,
        );
        composer
            .set_selection(Selection::collapsed(Position::new(vec![1], 0)))
            .unwrap();
        composer.delete_backward();
        assert_eq!(
            composer.document().nodes,
            vec![Block::paragraph(vec![
                Inline::text("ax"),
                Inline::HardBreak,
                Inline::text("y"),
            ])]
        );
        assert_eq!(composer.selection().head, Position::new(vec![0], 1));
    }

    #[test]
    fn blocks_with_mentions_are_not_turned_into_code() {
        let mut composer = Composer::default();
        composer.load(CODE_THEN_MENTION);
        composer
            .set_selection(Selection::new(
                Position::new(vec![0], 0),
                Position::new(vec![1], 2),
            ))
            .unwrap();
        composer.set_block_type(BlockType::CodeBlock { language: None });
        assert_eq!(composer.document().mentions(), vec![(7, "Chess Club")]);
        assert!(matches!(composer.document().nodes[1], Block::Paragraph { .. }));
        assert!(!composer.can_undo());
    }

    #[test]
    fn links_over_code_only_are_refused() {
        let mut composer = Composer::default();
        composer.load(CODE_THEN_MENTION);
        select(&mut composer, &[0], 0, 2);
        let before = composer.document().clone();
        assert_eq!(
            composer.set_link("https://example.com"),
            Err(EditError::NotInCodeBlock { what: "a link" })
        );
        assert_eq!(composer.document(), &before);

        // A selection reaching into a paragraph links the paragraph part.
        composer
            .set_selection(Selection::new(
                Position::new(vec![0], 0),
                Position::new(vec![1], 2),
            ))
            .unwrap();
        composer.set_link("https://example.com").unwrap();
        let linked = Marks::default().with(Mark::link("https://example.com"));
        assert_eq!(
            composer.document().nodes[1].inlines()[0],
            Inline::marked("xy", linked)
        );
    }
}

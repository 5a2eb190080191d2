//! Mention resolver.
//!
//! Typing the trigger character at a word boundary opens a suggestion span.
//! The text between the trigger and the cursor is the query. Lookups run
//! outside the resolver: [`MentionResolver::begin_lookup`] hands out the
//! query to search for and [`MentionResolver::apply_lookup`] takes the answer
//! back, dropping it when the query has moved on in the meantime.

use richdoc::document::{Inline, UnitRef, units};

use crate::key::Key;
use crate::lookup::{Entity, LookupError, MIN_LIMIT, MatchMode, rank_candidates};
use crate::position::Position;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionConfig {
    pub trigger: char,
    /// Whether the query may contain spaces. Club names usually do.
    pub allow_spaces: bool,
    pub match_mode: MatchMode,
    pub limit: usize,
}

impl Default for MentionConfig {
    fn default() -> Self {
        MentionConfig {
            trigger: '@',
            allow_spaces: true,
            match_mode: MatchMode::Prefix,
            limit: MIN_LIMIT,
        }
    }
}

/// An open suggestion span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub query: String,
    /// Position of the trigger character.
    pub anchor: Position,
    pub candidates: Vec<Entity>,
    /// Always a valid index into `candidates` when there are any.
    pub highlighted: usize,
    requested: bool,
}

impl Suggestion {
    fn new(anchor: Position) -> Self {
        Suggestion {
            query: String::new(),
            anchor,
            candidates: Vec::new(),
            highlighted: 0,
            requested: false,
        }
    }

    pub fn highlighted_candidate(&self) -> Option<&Entity> {
        self.candidates.get(self.highlighted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResolverState {
    #[default]
    Idle,
    /// Waiting for candidates for the current query.
    Composing(Suggestion),
    /// Candidates are showing.
    Open(Suggestion),
}

/// A query the owner should run against an entity lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub query: String,
}

/// What the resolver did with a keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not for the resolver; the editor handles it.
    Ignored,
    /// Handled; the editor must not act on it.
    Consumed,
    /// The user picked this candidate.
    Confirm(Entity),
}

#[derive(Debug, Clone, Default)]
pub struct MentionResolver {
    config: MentionConfig,
    state: ResolverState,
}

impl MentionResolver {
    pub fn new(config: MentionConfig) -> Self {
        MentionResolver {
            config,
            state: ResolverState::Idle,
        }
    }

    pub fn config(&self) -> &MentionConfig {
        &self.config
    }

    pub fn state(&self) -> &ResolverState {
        &self.state
    }

    pub fn suggestion(&self) -> Option<&Suggestion> {
        match &self.state {
            ResolverState::Idle => None,
            ResolverState::Composing(s) | ResolverState::Open(s) => Some(s),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, ResolverState::Idle)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ResolverState::Open(_))
    }

    pub fn reset(&mut self) {
        self.state = ResolverState::Idle;
    }

    /// Follow an edit or cursor move. `typed` is the number of units just
    /// inserted before the cursor; only typed text can open a span.
    pub fn observe(&mut self, inlines: &[Inline], cursor: &Position, in_code: bool, typed: usize) {
        if in_code {
            self.reset();
            return;
        }
        if !self.is_active() && typed > 0 {
            self.try_open(inlines, cursor, typed);
        }
        if self.is_active() {
            self.sync(inlines, cursor);
        }
    }

    fn try_open(&mut self, inlines: &[Inline], cursor: &Position, typed: usize) {
        let all: Vec<UnitRef<'_>> = units(inlines).take(cursor.offset).collect();
        let start = cursor.offset.saturating_sub(typed);
        for at in (start..all.len()).rev() {
            let is_trigger = matches!(all[at], UnitRef::Char(c, _) if c == self.config.trigger);
            if is_trigger && is_boundary(&all, at) {
                tracing::trace!(offset = at, "mention span opened");
                self.state = ResolverState::Composing(Suggestion::new(Position::new(cursor.path.clone(), at)));
                return;
            }
        }
    }

    fn sync(&mut self, inlines: &[Inline], cursor: &Position) {
        let Some(anchor) = self.suggestion().map(|s| s.anchor.clone()) else {
            return;
        };
        let Some(query) = self.query_between(inlines, &anchor, cursor) else {
            tracing::trace!("mention span closed");
            self.reset();
            return;
        };

        let state = std::mem::take(&mut self.state);
        self.state = match state {
            ResolverState::Composing(s) | ResolverState::Open(s) if s.query != query => {
                ResolverState::Composing(Suggestion {
                    query,
                    ..Suggestion::new(s.anchor)
                })
            }
            unchanged => unchanged,
        };
    }

    /// The query typed after the trigger at `anchor`, or `None` when the span
    /// no longer holds one.
    fn query_between(&self, inlines: &[Inline], anchor: &Position, cursor: &Position) -> Option<String> {
        if cursor.path != anchor.path || cursor.offset <= anchor.offset {
            return None;
        }
        let mut span = units(inlines)
            .skip(anchor.offset)
            .take(cursor.offset - anchor.offset);
        match span.next()? {
            UnitRef::Char(c, _) if c == self.config.trigger => {}
            _ => return None,
        }

        let mut query = String::new();
        for unit in span {
            match unit {
                UnitRef::Char('\n', _) | UnitRef::Node(_) => return None,
                UnitRef::Char(c, _) if c.is_whitespace() && !self.config.allow_spaces => return None,
                UnitRef::Char(c, _) => query.push(c),
            }
        }
        // "@ " is not a mention, and two spaces end one.
        if query.starts_with(char::is_whitespace) || query.ends_with("  ") {
            return None;
        }
        Some(query)
    }

    /// The query to look up, once per query.
    pub fn begin_lookup(&mut self) -> Option<LookupRequest> {
        match &mut self.state {
            ResolverState::Composing(s) if !s.requested => {
                s.requested = true;
                Some(LookupRequest {
                    query: s.query.clone(),
                })
            }
            _ => None,
        }
    }

    /// Deliver a lookup result for `query`. Returns false when the result
    /// is stale (the query changed or the span closed) and was dropped.
    pub fn apply_lookup(&mut self, query: &str, result: Result<Vec<Entity>, LookupError>) -> bool {
        let current = match &self.state {
            ResolverState::Composing(s) | ResolverState::Open(s) if s.query == query => s.clone(),
            _ => {
                tracing::debug!(query, "discarding stale mention lookup");
                return false;
            }
        };

        self.state = match result {
            Ok(entities) => {
                let candidates = rank_candidates(entities, query, self.config.match_mode, self.config.limit);
                ResolverState::Open(Suggestion {
                    candidates,
                    highlighted: 0,
                    ..current
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, query, "mention lookup failed");
                ResolverState::Composing(Suggestion {
                    candidates: Vec::new(),
                    highlighted: 0,
                    ..current
                })
            }
        };
        true
    }

    pub fn handle_key(&mut self, key: &Key) -> KeyOutcome {
        if !self.is_active() {
            return KeyOutcome::Ignored;
        }
        if *key == Key::Escape {
            tracing::trace!("mention span cancelled");
            self.reset();
            return KeyOutcome::Consumed;
        }
        let ResolverState::Open(s) = &mut self.state else {
            return KeyOutcome::Ignored;
        };

        let len = s.candidates.len();
        match key {
            Key::Up => {
                if len > 0 {
                    s.highlighted = (s.highlighted + len - 1) % len;
                }
                KeyOutcome::Consumed
            }
            Key::Down => {
                if len > 0 {
                    s.highlighted = (s.highlighted + 1) % len;
                }
                KeyOutcome::Consumed
            }
            Key::Enter | Key::Tab => match s.highlighted_candidate() {
                Some(entity) => KeyOutcome::Confirm(entity.clone()),
                None => KeyOutcome::Consumed,
            },
            _ => KeyOutcome::Ignored,
        }
    }
}

/// A trigger opens a span only at the start of a block, after whitespace or
/// right after another inline node.
fn is_boundary(units: &[UnitRef<'_>], at: usize) -> bool {
    match at.checked_sub(1).and_then(|i| units.get(i)) {
        None => true,
        Some(UnitRef::Char(c, _)) => c.is_whitespace(),
        Some(UnitRef::Node(_)) => true,
    }
}

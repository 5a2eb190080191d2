use std::collections::VecDeque;

use richdoc::Document;

use crate::position::Selection;

/// Editor state captured before a committed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub doc: Document,
    pub selection: Selection,
}

/// Bounded linear undo history. Recording a new step drops the redo tail;
/// past `depth` steps the oldest one is forgotten.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    depth: usize,
}

impl History {
    pub fn new(depth: usize) -> Self {
        History {
            undo: VecDeque::new(),
            redo: Vec::new(),
            depth: depth.max(1),
        }
    }

    pub fn record(&mut self, before: Snapshot) {
        self.redo.clear();
        self.undo.push_back(before);
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
    }

    /// Step back. `current` becomes the redo target.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Step forward again. `current` becomes the undo target.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        History::new(100)
    }
}

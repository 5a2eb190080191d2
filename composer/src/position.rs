//! Cursor addressing.
//!
//! A [`Position`] names a textblock by its index path through the block
//! tree and a unit offset inside it. A list contributes two path steps (the
//! item, then the block inside the item); a blockquote contributes one.
//! Paths of leaves compare in reading order, so `Position` derives `Ord`.

use richdoc::document::{Block, inline_len};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl Position {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        Position { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub anchor: Position,
    pub head: Position,
}

impl Selection {
    pub fn collapsed(at: Position) -> Self {
        Selection {
            anchor: at.clone(),
            head: at,
        }
    }

    pub fn new(anchor: Position, head: Position) -> Self {
        Selection { anchor, head }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Start of the selected range in reading order.
    pub fn from(&self) -> &Position {
        if self.anchor <= self.head {
            &self.anchor
        } else {
            &self.head
        }
    }

    /// End of the selected range in reading order.
    pub fn to(&self) -> &Position {
        if self.anchor > self.head {
            &self.anchor
        } else {
            &self.head
        }
    }
}

/// How a block wraps the blocks below it on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    Blockquote,
    BulletList,
    OrderedList,
}

pub fn block_at<'a>(blocks: &'a [Block], path: &[usize]) -> Option<&'a Block> {
    let (&first, rest) = path.split_first()?;
    let block = blocks.get(first)?;
    if rest.is_empty() {
        return Some(block);
    }
    match block {
        Block::Blockquote { blocks } => block_at(blocks, rest),
        Block::BulletList { items } | Block::OrderedList { items, .. } => {
            let (&item, rest) = rest.split_first()?;
            block_at(&items.get(item)?.blocks, rest)
        }
        _ => None,
    }
}

/// The sibling list that holds the block at `prefix + [i]`.
pub fn container_mut<'a>(blocks: &'a mut Vec<Block>, prefix: &[usize]) -> Option<&'a mut Vec<Block>> {
    let Some((&first, rest)) = prefix.split_first() else {
        return Some(blocks);
    };
    match blocks.get_mut(first)? {
        Block::Blockquote { blocks } => container_mut(blocks, rest),
        Block::BulletList { items } | Block::OrderedList { items, .. } => {
            let (&item, rest) = rest.split_first()?;
            container_mut(&mut items.get_mut(item)?.blocks, rest)
        }
        _ => None,
    }
}

pub fn block_at_mut<'a>(blocks: &'a mut Vec<Block>, path: &[usize]) -> Option<&'a mut Block> {
    let (&last, prefix) = path.split_last()?;
    container_mut(blocks, prefix)?.get_mut(last)
}

/// Paths of every leaf block (textblocks and atoms) in reading order.
pub fn leaves(blocks: &[Block]) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    walk(blocks, &mut Vec::new(), &mut out);
    out
}

fn walk(blocks: &[Block], prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (i, block) in blocks.iter().enumerate() {
        prefix.push(i);
        match block {
            Block::Blockquote { blocks } => walk(blocks, prefix, out),
            Block::BulletList { items } | Block::OrderedList { items, .. } => {
                for (j, item) in items.iter().enumerate() {
                    prefix.push(j);
                    walk(&item.blocks, prefix, out);
                    prefix.pop();
                }
            }
            _ => out.push(prefix.clone()),
        }
        prefix.pop();
    }
}

/// Paths of every textblock in reading order.
pub fn textblocks(blocks: &[Block]) -> Vec<Vec<usize>> {
    leaves(blocks)
        .into_iter()
        .filter(|p| block_at(blocks, p).is_some_and(Block::is_textblock))
        .collect()
}

/// Length in units of the textblock at `path`, or 0.
pub fn block_len(blocks: &[Block], path: &[usize]) -> usize {
    match block_at(blocks, path) {
        Some(Block::CodeBlock { content, .. }) => content.chars().count(),
        Some(block) => inline_len(&block.inlines()),
        None => 0,
    }
}

/// Wrapping blocks above the block at `path`, outermost first, each with
/// its own path.
pub fn wrappers(blocks: &[Block], path: &[usize]) -> Vec<(Vec<usize>, Wrapper)> {
    let mut out = Vec::new();
    let mut current = blocks;
    let mut i = 0;
    while i + 1 < path.len() {
        let Some(block) = current.get(path[i]) else {
            break;
        };
        let prefix = path[..=i].to_vec();
        match block {
            Block::Blockquote { blocks } => {
                out.push((prefix, Wrapper::Blockquote));
                current = blocks;
                i += 1;
            }
            Block::BulletList { items } | Block::OrderedList { items, .. } => {
                let kind = if matches!(block, Block::OrderedList { .. }) {
                    Wrapper::OrderedList
                } else {
                    Wrapper::BulletList
                };
                out.push((prefix, kind));
                let Some(item) = path.get(i + 1).and_then(|&j| items.get(j)) else {
                    break;
                };
                current = &item.blocks;
                i += 2;
            }
            _ => break,
        }
    }
    out
}

/// Drop lists without items, items without blocks and empty blockquotes.
pub fn prune_empty(blocks: &mut Vec<Block>) {
    for block in blocks.iter_mut() {
        match block {
            Block::Blockquote { blocks } => prune_empty(blocks),
            Block::BulletList { items } | Block::OrderedList { items, .. } => {
                for item in items.iter_mut() {
                    prune_empty(&mut item.blocks);
                }
                items.retain(|item| !item.blocks.is_empty());
            }
            _ => {}
        }
    }
    blocks.retain(|block| match block {
        Block::Blockquote { blocks } => !blocks.is_empty(),
        Block::BulletList { items } | Block::OrderedList { items, .. } => !items.is_empty(),
        _ => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use richdoc::document::{Inline, ListItem};

    fn sample() -> Vec<Block> {
        vec![
            Block::paragraph(vec![Inline::text("intro")]),
            Block::BulletList {
                items: vec![
                    ListItem::paragraph(vec![Inline::text("one")]),
                    ListItem {
                        blocks: vec![
                            Block::paragraph(vec![Inline::text("two")]),
                            Block::Blockquote {
                                blocks: vec![Block::paragraph(vec![Inline::text("deep")])],
                            },
                        ],
                    },
                ],
            },
            Block::HorizontalRule,
            Block::CodeBlock {
                language: None,
                content: "x = 1".into(),
            },
        ]
    }

    #[test]
    fn leaves_come_in_reading_order() {
        let blocks = sample();
        let leaves = leaves(&blocks);
        assert_eq!(
            leaves,
            vec![
                vec![0],
                vec![1, 0, 0],
                vec![1, 1, 0],
                vec![1, 1, 1, 0],
                vec![2],
                vec![3],
            ]
        );
        let mut sorted = leaves.clone();
        sorted.sort();
        assert_eq!(sorted, leaves);
        assert_eq!(textblocks(&blocks).len(), 5);
    }

    #[test]
    fn addressing_reaches_nested_blocks() {
        let mut blocks = sample();
        assert_eq!(
            block_at(&blocks, &[1, 1, 1, 0]),
            Some(&Block::paragraph(vec![Inline::text("deep")]))
        );
        assert!(block_at(&blocks, &[1, 0]).is_none());
        assert_eq!(block_len(&blocks, &[3]), 5);

        let container = container_mut(&mut blocks, &[1, 1]).unwrap();
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn wrappers_are_listed_outermost_first() {
        let blocks = sample();
        assert_eq!(
            wrappers(&blocks, &[1, 1, 1, 0]),
            vec![(vec![1], Wrapper::BulletList), (vec![1, 1, 1], Wrapper::Blockquote)]
        );
        assert!(wrappers(&blocks, &[0]).is_empty());
    }

    #[test]
    fn pruning_removes_emptied_containers() {
        let mut blocks = vec![
            Block::BulletList {
                items: vec![ListItem { blocks: vec![] }],
            },
            Block::Blockquote { blocks: vec![] },
            Block::paragraph(vec![]),
        ];
        prune_empty(&mut blocks);
        assert_eq!(blocks, vec![Block::paragraph(vec![])]);
    }

    #[test]
    fn selection_orders_its_ends() {
        let a = Position::new(vec![2], 0);
        let b = Position::new(vec![0], 4);
        let sel = Selection::new(a.clone(), b.clone());
        assert_eq!(sel.from(), &b);
        assert_eq!(sel.to(), &a);
        assert!(!sel.is_collapsed());
    }
}

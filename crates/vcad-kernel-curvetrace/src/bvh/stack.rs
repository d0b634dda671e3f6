//! Caller-owned traversal stack.

use super::node::NodeRef;
use crate::mask::LaneMask;

/// A pending subtree with its entry distance and interested lanes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackItem {
    /// Subtree root.
    pub node: NodeRef,
    /// Conservative entry distance.
    pub dist: f32,
    /// Lanes that may hit the subtree.
    pub lanes: LaneMask,
}

impl StackItem {
    /// Placeholder for fixed-size buffers.
    pub const EMPTY: Self = Self {
        node: NodeRef::EMPTY,
        dist: f32::INFINITY,
        lanes: LaneMask::EMPTY,
    };
}

/// Saved position of an enclosing walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkMark(usize);

/// LIFO of pending subtrees, bounded by tree depth.
///
/// A single walk over a tree of fan-out `N` and depth `D` never holds more
/// than `1 + (N - 1) * D + 3` items. The stack has room for a packet walk
/// plus one nested single-ray walk started on top of it; a walk exceeding
/// the bound means the tree is deeper than declared and panics.
#[derive(Debug, Clone)]
pub struct TraversalStack {
    items: Vec<StackItem>,
    base: usize,
    walk_capacity: usize,
}

impl TraversalStack {
    /// Items one walk may hold for fan-out `n` and depth `max_depth`.
    pub const fn walk_capacity(n: usize, max_depth: usize) -> usize {
        1 + (n - 1) * max_depth + 3
    }

    /// Stack for trees of fan-out `n` up to `max_depth` levels.
    pub fn new(n: usize, max_depth: usize) -> Self {
        let walk_capacity = Self::walk_capacity(n, max_depth);
        Self {
            items: Vec::with_capacity(2 * walk_capacity),
            base: 0,
            walk_capacity,
        }
    }

    /// Items a single walk may hold.
    pub fn capacity(&self) -> usize {
        self.walk_capacity
    }

    /// Drop all items.
    pub fn clear(&mut self) {
        self.items.clear();
        self.base = 0;
    }

    /// Items in the current walk.
    pub fn len(&self) -> usize {
        self.items.len() - self.base
    }

    /// True when the current walk has no pending items.
    pub fn is_empty(&self) -> bool {
        self.items.len() == self.base
    }

    /// Push an item onto the current walk.
    #[inline]
    pub fn push(&mut self, item: StackItem) {
        assert!(
            self.len() < self.walk_capacity,
            "traversal stack overflow: tree deeper than configured max_depth"
        );
        self.items.push(item);
    }

    /// Pop the most recent item of the current walk.
    #[inline]
    pub fn pop(&mut self) -> Option<StackItem> {
        if self.is_empty() {
            None
        } else {
            self.items.pop()
        }
    }

    /// Push `children` so that the nearest entry pops first.
    pub fn push_nearest_first(&mut self, children: &mut [StackItem]) {
        children.sort_unstable_by(|a, b| b.dist.total_cmp(&a.dist));
        for child in children.iter() {
            self.push(*child);
        }
    }

    /// Start a nested walk above the current items.
    pub fn begin_walk(&mut self) -> WalkMark {
        let mark = WalkMark(self.base);
        self.base = self.items.len();
        mark
    }

    /// Discard the nested walk and resume the enclosing one.
    pub fn end_walk(&mut self, mark: WalkMark) {
        self.items.truncate(self.base);
        self.base = mark.0;
    }
}

//! Skip-list priority deque (spec §4.10): backs the priority limiter's
//! backlog. Not lock-free — the priority limiter serializes every mutation
//! under its own mutex (spec §5), so this is a plain (non-atomic) indexed
//! skip list, doubly linked at every level so both ends are O(log n).
//!
//! Ordering is supplied by the caller as a `less` relation over `T`; the
//! skip list itself has no opinion on FIFO vs priority+LIFO (spec §4.8) —
//! that policy lives in `backlog.rs`.

use crate::rng::{random_height, SkipListRng};
use std::cmp::Ordering;

const MAX_HEIGHT: usize = 8;

/// Opaque handle to a previously-inserted entry, used to cancel or evict it
/// before it would otherwise be polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

struct Node<T> {
    value: Option<T>,
    height: usize,
    next: [Option<usize>; MAX_HEIGHT],
    prev: [Option<usize>; MAX_HEIGHT],
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Self {
            value: None,
            height: MAX_HEIGHT,
            next: [None; MAX_HEIGHT],
            prev: [None; MAX_HEIGHT],
        }
    }
}

const HEAD: usize = 0;
const TAIL: usize = 1;

/// A bounded-height skip-list deque ordered by an injected `less` relation.
/// Head and tail sentinels compare as minus/plus infinity regardless of `T`
/// (spec §4.10).
pub struct SkipList<T, F> {
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    less: F,
    len: usize,
}

impl<T, F> SkipList<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    #[must_use]
    pub fn new(less: F) -> Self {
        let mut head = Node::sentinel();
        let mut tail = Node::sentinel();
        for lvl in 0..MAX_HEIGHT {
            head.next[lvl] = Some(TAIL);
            tail.prev[lvl] = Some(HEAD);
        }
        Self {
            nodes: vec![head, tail],
            free: Vec::new(),
            less,
            len: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn empty(&self) -> bool {
        self.len == 0
    }

    /// Finds, at each level from `MAX_HEIGHT - 1` down to 0, the last node
    /// strictly less than `value`. `update[lvl]` is that predecessor's index.
    fn find_predecessors(&self, value: &T) -> [usize; MAX_HEIGHT] {
        let mut update = [HEAD; MAX_HEIGHT];
        let mut cur = HEAD;
        for lvl in (0..MAX_HEIGHT).rev() {
            loop {
                let next = self.nodes[cur].next[lvl].unwrap_or(TAIL);
                let advance = next != TAIL
                    && (self.less)(self.nodes[next].value.as_ref().unwrap(), value) == Ordering::Less;
                if advance {
                    cur = next;
                } else {
                    break;
                }
            }
            update[lvl] = cur;
        }
        update
    }

    fn alloc(&mut self, value: T, height: usize) -> usize {
        let node = Node {
            value: Some(value),
            height,
            next: [None; MAX_HEIGHT],
            prev: [None; MAX_HEIGHT],
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    /// Inserts `value`, walking down from the current maximum height and
    /// advancing at each level while the successor is less than the new
    /// node (spec §4.10). Returns a handle for later cancellation/eviction.
    pub fn insert(&mut self, value: T, rng: &mut dyn SkipListRng) -> NodeId {
        let height = random_height(rng, MAX_HEIGHT);
        let update = self.find_predecessors(&value);
        let idx = self.alloc(value, height);

        for lvl in 0..height {
            let pred = update[lvl];
            let succ = self.nodes[pred].next[lvl].unwrap_or(TAIL);
            self.nodes[idx].next[lvl] = Some(succ);
            self.nodes[idx].prev[lvl] = Some(pred);
            self.nodes[pred].next[lvl] = Some(idx);
            self.nodes[succ].prev[lvl] = Some(idx);
        }
        self.len += 1;
        NodeId(idx)
    }

    /// Unlinks `id` at every level it participates in and returns it to the
    /// free list (spec §4.10). No-op (returns `None`) if already removed.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let idx = id.0;
        if idx == HEAD || idx == TAIL || self.nodes[idx].value.is_none() {
            return None;
        }
        let height = self.nodes[idx].height;
        for lvl in 0..height {
            let pred = self.nodes[idx].prev[lvl];
            let succ = self.nodes[idx].next[lvl];
            if let (Some(pred), Some(succ)) = (pred, succ) {
                self.nodes[pred].next[lvl] = Some(succ);
                self.nodes[succ].prev[lvl] = Some(pred);
            }
        }
        let value = self.nodes[idx].value.take();
        self.free.push(idx);
        self.len -= 1;
        value
    }

    fn front_id(&self) -> Option<usize> {
        let first = self.nodes[HEAD].next[0].unwrap_or(TAIL);
        if first == TAIL {
            None
        } else {
            Some(first)
        }
    }

    fn back_id(&self) -> Option<usize> {
        let last = self.nodes[TAIL].prev[0].unwrap_or(HEAD);
        if last == HEAD {
            None
        } else {
            Some(last)
        }
    }

    #[must_use]
    pub fn peek_first(&self) -> Option<&T> {
        self.front_id().and_then(|idx| self.nodes[idx].value.as_ref())
    }

    #[must_use]
    pub fn peek_first_id(&self) -> Option<NodeId> {
        self.front_id().map(NodeId)
    }

    pub fn poll_first(&mut self) -> Option<T> {
        let idx = self.front_id()?;
        self.remove(NodeId(idx))
    }

    #[must_use]
    pub fn peek_last(&self) -> Option<&T> {
        self.back_id().and_then(|idx| self.nodes[idx].value.as_ref())
    }

    #[must_use]
    pub fn peek_last_id(&self) -> Option<NodeId> {
        self.back_id().map(NodeId)
    }

    pub fn poll_last(&mut self) -> Option<T> {
        let idx = self.back_id()?;
        self.remove(NodeId(idx))
    }

    /// Offer into a possibly-full deque (spec §4.8 tail-eviction policy):
    /// inserts unconditionally if `len < capacity`; otherwise, if `value`
    /// outranks the current tail (the lowest-priority waiter), evicts the
    /// tail and inserts `value`, returning the evicted value; otherwise
    /// refuses and returns `value` back to the caller unchanged.
    pub fn offer_bounded(
        &mut self,
        value: T,
        capacity: usize,
        rng: &mut dyn SkipListRng,
    ) -> Result<Option<T>, T> {
        if self.len < capacity {
            self.insert(value, rng);
            return Ok(None);
        }
        // `capacity == 0` and the deque is necessarily empty here (any
        // `capacity >= 1` would have taken the branch above while empty):
        // nothing to evict, so refuse outright.
        let Some(tail_id) = self.peek_last_id() else {
            return Err(value);
        };
        let tail_val = self.nodes[tail_id.0].value.as_ref().expect("tail has a value");
        let outranks = (self.less)(&value, tail_val) == Ordering::Less;
        if outranks {
            let evicted = self.remove(tail_id);
            self.insert(value, rng);
            Ok(evicted)
        } else {
            Err(value)
        }
    }
}

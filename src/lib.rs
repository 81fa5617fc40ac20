//! # btree-rs
//!
//! An in-memory ordered map built on the classic B-tree of fixed minimum
//! degree, as described by Cormen, Leiserson, Rivest, and Stein (chapter 18).
//!
//! Lookup, insertion, and deletion run in worst-case O(log n). Both mutating
//! operations work strictly top-down: insertion splits any full node it is
//! about to descend into, and deletion tops up any minimal node on its path
//! with a sibling rotation or merge, so no pass ever has to back up the tree
//! to restore balance.
//!
//! ## Example
//!
//! ```rust
//! use btree_rs::BTree;
//!
//! let mut tree: BTree<i32, &str> = BTree::new();
//! tree.insert(1, "one");
//! tree.insert(2, "two");
//!
//! assert_eq!(tree.get(&1), Some(&"one"));
//! assert_eq!(tree.remove(&2), Some("two"));
//! assert_eq!(tree.get(&2), None);
//! ```

use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::mem;

// =============================================================================
// Configuration
// =============================================================================

const MIN_DEGREE: usize = 2; // t: every non-root node holds t-1..=2t-1 keys
const MAX_KEYS: usize = 2 * MIN_DEGREE - 1; // a node with this many keys is full
const MAX_CHILDREN: usize = 2 * MIN_DEGREE;
const MIN_KEYS: usize = MIN_DEGREE - 1;

/// Pair buffer: inline storage for up to `MAX_KEYS` entries, never spills.
type PairBuf<K, V> = SmallVec<[Pair<K, V>; MAX_KEYS]>;
/// Child buffer: inline storage for up to `MAX_CHILDREN` owned subtrees.
type ChildBuf<K, V> = SmallVec<[Box<Node<K, V>>; MAX_CHILDREN]>;

// =============================================================================
// Key-value pairs
// =============================================================================

/// A key and its value, stored together in a node slot.
#[derive(Clone)]
struct Pair<K, V> {
    key: K,
    value: V,
}

// =============================================================================
// Nodes
// =============================================================================

/// A single B-tree node.
///
/// `pairs` is kept sorted by key. An internal node owns `pairs.len() + 1`
/// children; a leaf owns none. The buffers never exceed their inline
/// capacity, so a node is one contiguous allocation behind its box.
#[derive(Clone)]
struct Node<K, V> {
    pairs: PairBuf<K, V>,
    children: ChildBuf<K, V>,
    leaf: bool,
}

impl<K, V> Node<K, V> {
    fn new(leaf: bool) -> Self {
        Node {
            pairs: SmallVec::new(),
            children: SmallVec::new(),
            leaf,
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.pairs.len() == MAX_KEYS
    }

    /// A node can donate a key to a sibling without dropping below `MIN_KEYS`.
    #[inline]
    fn can_lend(&self) -> bool {
        self.pairs.len() >= MIN_DEGREE
    }

    /// Splits the full child at `idx` into two half-full nodes and hoists its
    /// median key into this node. The caller must not be full itself.
    fn split_child(&mut self, idx: usize) {
        debug_assert!(!self.is_full());
        let child = &mut self.children[idx];
        debug_assert!(child.is_full());

        let right_pairs: PairBuf<K, V> = child.pairs.drain(MIN_DEGREE..).collect();
        let median = child.pairs.pop().expect("a full node has a median key");
        let right_children: ChildBuf<K, V> = if child.leaf {
            SmallVec::new()
        } else {
            child.children.drain(MIN_DEGREE..).collect()
        };
        debug_assert_eq!(child.pairs.len(), MIN_KEYS);

        let right = Box::new(Node {
            pairs: right_pairs,
            children: right_children,
            leaf: child.leaf,
        });
        self.pairs.insert(idx, median);
        self.children.insert(idx + 1, right);
    }

    /// Moves one key from the left sibling of `children[idx]` through the
    /// separator into `children[idx]`, along with the sibling's last child.
    fn rotate_right(&mut self, idx: usize) {
        debug_assert!(idx > 0);
        let (left_half, right_half) = self.children.split_at_mut(idx);
        let left = &mut left_half[idx - 1];
        let node = &mut right_half[0];
        debug_assert!(left.can_lend());

        let donated = left.pairs.pop().expect("a lending sibling has a spare key");
        let separator = mem::replace(&mut self.pairs[idx - 1], donated);
        node.pairs.insert(0, separator);
        if let Some(child) = left.children.pop() {
            node.children.insert(0, child);
        }
    }

    /// Mirror image of `rotate_right`: borrows the first key and child of the
    /// right sibling of `children[idx]`.
    fn rotate_left(&mut self, idx: usize) {
        let (left_half, right_half) = self.children.split_at_mut(idx + 1);
        let node = &mut left_half[idx];
        let right = &mut right_half[0];
        debug_assert!(right.can_lend());

        let donated = right.pairs.remove(0);
        let separator = mem::replace(&mut self.pairs[idx], donated);
        node.pairs.push(separator);
        if !right.children.is_empty() {
            node.children.push(right.children.remove(0));
        }
    }

    /// Fuses `children[idx]`, the separator above it, and `children[idx + 1]`
    /// into a single full node at `idx`. The right sibling box is consumed.
    fn merge_children(&mut self, idx: usize) {
        let separator = self.pairs.remove(idx);
        let right = self.children.remove(idx + 1);
        let left = &mut self.children[idx];
        debug_assert_eq!(left.leaf, right.leaf);

        left.pairs.push(separator);
        let Node { pairs, children, .. } = *right;
        left.pairs.extend(pairs);
        left.children.extend(children);
        debug_assert_eq!(left.pairs.len(), MAX_KEYS);
    }

    /// Largest key in this subtree: the last key of the rightmost leaf.
    fn max_key(&self) -> &K {
        let mut node = self;
        while let Some(child) = node.children.last() {
            node = child;
        }
        &node
            .pairs
            .last()
            .expect("a non-root subtree holds at least one key")
            .key
    }

    /// Smallest key in this subtree: the first key of the leftmost leaf.
    fn min_key(&self) -> &K {
        let mut node = self;
        while let Some(child) = node.children.first() {
            node = child;
        }
        &node
            .pairs
            .first()
            .expect("a non-root subtree holds at least one key")
            .key
    }

    /// In-order visit of every pair in the subtree.
    fn for_each<'a, F: FnMut(&'a Pair<K, V>)>(&'a self, f: &mut F) {
        for (i, pair) in self.pairs.iter().enumerate() {
            if let Some(child) = self.children.get(i) {
                child.for_each(f);
            }
            f(pair);
        }
        if let Some(child) = self.children.get(self.pairs.len()) {
            child.for_each(f);
        }
    }
}

impl<K: Ord, V> Node<K, V> {
    /// Index of the first pair whose key is not below `key`; also the child
    /// index to descend into when the key is absent from this node.
    #[inline]
    fn lower_bound(&self, key: &K) -> usize {
        self.pairs.partition_point(|pair| pair.key < *key)
    }

    /// Inserts into a node known not to be full, splitting any full child
    /// just before descending into it.
    fn insert_nonfull(&mut self, key: K, value: V) -> Option<V> {
        debug_assert!(!self.is_full());
        let mut idx = self.lower_bound(&key);
        if let Some(pair) = self.pairs.get_mut(idx) {
            if pair.key == key {
                return Some(mem::replace(&mut pair.value, value));
            }
        }
        if self.leaf {
            self.pairs.insert(idx, Pair { key, value });
            return None;
        }
        if self.children[idx].is_full() {
            self.split_child(idx);
            // The median hoisted by the split may itself be the key, or may
            // push the descent one child to the right.
            match key.cmp(&self.pairs[idx].key) {
                Ordering::Less => {}
                Ordering::Equal => {
                    return Some(mem::replace(&mut self.pairs[idx].value, value));
                }
                Ordering::Greater => idx += 1,
            }
        }
        self.children[idx].insert_nonfull(key, value)
    }
}

impl<K: Ord + Clone, V> Node<K, V> {
    /// Removes `key` from the subtree and returns the evicted pair.
    ///
    /// Precondition: this node is the root, or holds at least `MIN_DEGREE`
    /// keys. Every recursive step re-establishes that precondition for the
    /// child it descends into, so underflow is repaired on the way down and
    /// never propagates back up.
    fn remove(&mut self, key: &K) -> Option<Pair<K, V>> {
        let idx = self.lower_bound(key);
        let found = matches!(self.pairs.get(idx), Some(pair) if pair.key == *key);

        if self.leaf {
            return found.then(|| self.pairs.remove(idx));
        }

        if found {
            // The key separates children idx and idx + 1. Replace it with its
            // predecessor or successor if either subtree can spare a key.
            if self.children[idx].can_lend() {
                let pred_key = self.children[idx].max_key().clone();
                let pred = self.children[idx]
                    .remove(&pred_key)
                    .expect("the predecessor key is present in the left subtree");
                return Some(mem::replace(&mut self.pairs[idx], pred));
            }
            if self.children[idx + 1].can_lend() {
                let succ_key = self.children[idx + 1].min_key().clone();
                let succ = self.children[idx + 1]
                    .remove(&succ_key)
                    .expect("the successor key is present in the right subtree");
                return Some(mem::replace(&mut self.pairs[idx], succ));
            }
            // Both neighbors are minimal: fuse them around the key, which
            // lands inside the merged child, and delete it there.
            self.merge_children(idx);
            return self.children[idx].remove(key);
        }

        // The key can only live under children[idx]. Top that child up to
        // MIN_DEGREE keys before descending: borrow from a sibling that can
        // lend, otherwise merge with one.
        let idx = if self.children[idx].can_lend() {
            idx
        } else if idx > 0 && self.children[idx - 1].can_lend() {
            self.rotate_right(idx);
            idx
        } else if idx < self.pairs.len() && self.children[idx + 1].can_lend() {
            self.rotate_left(idx);
            idx
        } else if idx == 0 {
            self.merge_children(0);
            0
        } else {
            self.merge_children(idx - 1);
            idx - 1
        };
        self.children[idx].remove(key)
    }
}

impl<K: fmt::Display, V> fmt::Display for Node<K, V> {
    /// Bracketed structural rendering. Children and keys print interleaved;
    /// an absent child prints as the literal `null`, so a leaf with keys 1
    /// and 2 renders as `" [ null 1 null 2 null ] "`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(" [ ")?;
        match self.children.first() {
            Some(child) => write!(f, "{child}")?,
            None => f.write_str("null")?,
        }
        for (i, pair) in self.pairs.iter().enumerate() {
            write!(f, " {} ", pair.key)?;
            match self.children.get(i + 1) {
                Some(child) => write!(f, "{child}")?,
                None => f.write_str("null")?,
            }
        }
        f.write_str(" ] ")
    }
}

// =============================================================================
// BTree
// =============================================================================

/// An ordered map backed by a B-tree of fixed minimum degree.
///
/// Every node stores its keys and child boxes in inline fixed-capacity
/// buffers, and every child is uniquely owned by its parent, so the whole
/// tree is a plain ownership hierarchy with no parent links and no interior
/// mutability.
#[derive(Clone)]
pub struct BTree<K, V> {
    root: Box<Node<K, V>>,
    len: usize,
}

impl<K: Ord, V> BTree<K, V> {
    /// An empty tree: a single key-less leaf at the root.
    pub fn new() -> Self {
        BTree {
            root: Box::new(Node::new(true)),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_key_value(key).map(|(_, value)| value)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let mut node = &*self.root;
        loop {
            let idx = node.lower_bound(key);
            if let Some(pair) = node.pairs.get(idx) {
                if pair.key == *key {
                    return Some((&pair.key, &pair.value));
                }
            }
            if node.leaf {
                return None;
            }
            node = &node.children[idx];
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get_key_value(key).is_some()
    }

    /// Inserts a pair, returning the previous value if the key was already
    /// present. A duplicate key replaces the stored value in place; the
    /// stored key is left untouched.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if self.root.is_full() {
            // Splitting the root is the only way the tree gains height.
            let old_root = mem::replace(&mut self.root, Box::new(Node::new(false)));
            self.root.children.push(old_root);
            self.root.split_child(0);
        }
        let old = self.root.insert_nonfull(key, value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }
}

impl<K: Ord + Clone, V> BTree<K, V> {
    /// Removes a key and returns its value, or `None` if it was absent.
    ///
    /// Removing an absent key never changes membership, though the descent
    /// may still rebalance nodes along its path.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.root.remove(key);
        if self.root.pairs.is_empty() && !self.root.leaf {
            // A merge consumed the root's last separator: drop one level.
            debug_assert_eq!(self.root.children.len(), 1);
            let child = self
                .root
                .children
                .pop()
                .expect("an empty internal root keeps its merged child");
            self.root = child;
        }
        if removed.is_some() {
            self.len -= 1;
        }
        removed.map(|pair| pair.value)
    }
}

impl<K: Ord, V> Default for BTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for BTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.root.for_each(&mut |pair| {
            map.entry(&pair.key, &pair.value);
        });
        map.finish()
    }
}

impl<K: fmt::Display, V> fmt::Display for BTree<K, V> {
    /// Renders the node structure from the root, in the bracketed form
    /// documented on the node renderer.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

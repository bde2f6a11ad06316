//! Self-adjusting ordered index.
//!
//! A splay tree over owned values. The tree carries no payload of its
//! own; each stored value exposes its key through [`Keyed`], so one
//! container serves address-keyed free-block bookkeeping and name-keyed
//! lookup tables alike.
//!
//! Lookups are access-biased: `find`, `minimum`, `successor` and
//! `predecessor` rotate the accessed node to the root, which biases
//! future lookups of recently used keys toward O(1). Callers therefore
//! must not assume shape stability across calls, and readers that share
//! a tree with writers must serialise on the writer's lock. [`iter`] is
//! the one read-only traversal and never rotates.
//!
//! [`iter`]: SplayTree::iter

use std::cmp::Ordering;

/// Key capability for values stored in a [`SplayTree`].
pub trait Keyed {
    /// Ordering key type.
    type Key: Ord;

    /// Returns the value's key. The key must stay stable for as long
    /// as the value is a member of a tree.
    fn key(&self) -> Self::Key;
}

struct Node<T> {
    item: T,
    left: Link<T>,
    right: Link<T>,
}

type Link<T> = Option<Box<Node<T>>>;

impl<T> Node<T> {
    fn boxed(item: T) -> Box<Self> {
        Box::new(Node {
            item,
            left: None,
            right: None,
        })
    }
}

/// Splays the node selected by `cmp` (or the last node on its search
/// path) to the root of the subtree and returns the new root.
///
/// `cmp` returns `Less` when the target orders before the probed item,
/// `Greater` when it orders after. A comparator that always answers
/// `Less` steers the splay to the minimum; always `Greater`, to the
/// maximum.
///
/// Top-down, one pass, O(1) stack. Free-block indexes reach spines of
/// hundreds of thousands of nodes under ascending release orders, far
/// past what recursion could descend.
fn splay<T, F>(mut root: Box<Node<T>>, cmp: &mut F) -> Box<Node<T>>
where
    F: FnMut(&T) -> Ordering,
{
    // Nodes passed on the way down land in one of two assembly stacks:
    // `lefts` holds everything ordered before the target, each with a
    // vacant right slot; `rights` everything after, vacant left slot.
    let mut lefts: Vec<Box<Node<T>>> = Vec::new();
    let mut rights: Vec<Box<Node<T>>> = Vec::new();
    loop {
        match cmp(&root.item) {
            Ordering::Equal => break,
            Ordering::Less => {
                let Some(mut child) = root.left.take() else {
                    break;
                };
                if cmp(&child.item) == Ordering::Less {
                    // zig-zig: rotate right before descending.
                    root.left = child.right.take();
                    child.right = Some(root);
                    root = child;
                    match root.left.take() {
                        Some(grand) => child = grand,
                        None => break,
                    }
                }
                rights.push(root);
                root = child;
            }
            Ordering::Greater => {
                let Some(mut child) = root.right.take() else {
                    break;
                };
                if cmp(&child.item) == Ordering::Greater {
                    // zig-zig, mirrored.
                    root.right = child.left.take();
                    child.left = Some(root);
                    root = child;
                    match root.right.take() {
                        Some(grand) => child = grand,
                        None => break,
                    }
                }
                lefts.push(root);
                root = child;
            }
        }
    }
    // Reassemble: each stack hangs beneath the final root in pop
    // order, the deepest linked node closest to the root's subtrees.
    let mut left = root.left.take();
    while let Some(mut node) = lefts.pop() {
        node.right = left;
        left = Some(node);
    }
    root.left = left;
    let mut right = root.right.take();
    while let Some(mut node) = rights.pop() {
        node.left = right;
        right = Some(node);
    }
    root.right = right;
    root
}

/// Generic ordered index with splay-to-root access bias.
pub struct SplayTree<T: Keyed> {
    root: Link<T>,
    len: usize,
}

impl<T: Keyed> Default for SplayTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed> SplayTree<T> {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Number of values in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn splay_with<F>(&mut self, mut cmp: F)
    where
        F: FnMut(&T) -> Ordering,
    {
        if let Some(root) = self.root.take() {
            self.root = Some(splay(root, &mut cmp));
        }
    }

    /// Inserts `item`, splaying it to the root.
    ///
    /// Returns the item back as `Err` if an equal-keyed value is
    /// already present; the tree is left unchanged in that case.
    pub fn insert(&mut self, item: T) -> Result<(), T> {
        let key = item.key();
        let Some(root) = self.root.take() else {
            self.root = Some(Node::boxed(item));
            self.len = 1;
            return Ok(());
        };
        let mut root = splay(root, &mut |probe: &T| key.cmp(&probe.key()));
        match key.cmp(&root.item.key()) {
            Ordering::Equal => {
                self.root = Some(root);
                Err(item)
            }
            Ordering::Less => {
                let mut node = Node::boxed(item);
                node.left = root.left.take();
                node.right = Some(root);
                self.root = Some(node);
                self.len += 1;
                Ok(())
            }
            Ordering::Greater => {
                let mut node = Node::boxed(item);
                node.right = root.right.take();
                node.left = Some(root);
                self.root = Some(node);
                self.len += 1;
                Ok(())
            }
        }
    }

    /// Finds the value with the given key, splaying it (or the nearest
    /// node on the search path) to the root.
    pub fn find(&mut self, key: &T::Key) -> Option<&T> {
        self.splay_with(|probe| key.cmp(&probe.key()));
        self.root
            .as_deref()
            .map(|node| &node.item)
            .filter(|item| item.key().cmp(key) == Ordering::Equal)
    }

    /// Mutable variant of [`find`](Self::find). The caller must not
    /// change the value's key while it is in the tree.
    pub fn find_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        self.splay_with(|probe| key.cmp(&probe.key()));
        self.root
            .as_deref_mut()
            .map(|node| &mut node.item)
            .filter(|item| item.key().cmp(key) == Ordering::Equal)
    }

    /// Returns the minimum-keyed value, splaying it to the root.
    ///
    /// An empty tree yields `None`, never an error.
    pub fn minimum(&mut self) -> Option<&T> {
        self.splay_with(|_| Ordering::Less);
        self.root.as_deref().map(|node| &node.item)
    }

    /// Returns the smallest value whose key is strictly greater than
    /// `key`, splaying it to the root.
    pub fn successor(&mut self, key: &T::Key) -> Option<&T> {
        self.splay_with(|probe| key.cmp(&probe.key()));
        let mut root = self.root.take()?;
        if root.item.key().cmp(key) == Ordering::Greater {
            self.root = Some(root);
        } else {
            // Root is the greatest key <= `key`; the successor is the
            // minimum of its right subtree.
            match root.right.take() {
                None => {
                    self.root = Some(root);
                    return None;
                }
                Some(right) => {
                    let mut min = splay(right, &mut |_| Ordering::Less);
                    min.left = Some(root);
                    self.root = Some(min);
                }
            }
        }
        self.root.as_deref().map(|node| &node.item)
    }

    /// Returns the greatest value whose key is strictly smaller than
    /// `key`, splaying it to the root.
    pub fn predecessor(&mut self, key: &T::Key) -> Option<&T> {
        self.splay_with(|probe| key.cmp(&probe.key()));
        let mut root = self.root.take()?;
        if root.item.key().cmp(key) == Ordering::Less {
            self.root = Some(root);
        } else {
            match root.left.take() {
                None => {
                    self.root = Some(root);
                    return None;
                }
                Some(left) => {
                    let mut max = splay(left, &mut |_| Ordering::Greater);
                    max.right = Some(root);
                    self.root = Some(max);
                }
            }
        }
        self.root.as_deref().map(|node| &node.item)
    }

    /// Removes and returns the value with the given key.
    ///
    /// The target is splayed to the root, then its subtrees are merged
    /// by splaying the right subtree's minimum and hanging the left
    /// subtree beneath it.
    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        self.splay_with(|probe| key.cmp(&probe.key()));
        let root = self.root.take()?;
        if root.item.key().cmp(key) != Ordering::Equal {
            self.root = Some(root);
            return None;
        }
        let Node { item, left, right } = *root;
        self.root = match right {
            None => left,
            Some(right) => {
                let mut min = splay(right, &mut |_| Ordering::Less);
                min.left = left;
                Some(min)
            }
        };
        self.len -= 1;
        Some(item)
    }

    /// Lazy ascending in-order traversal. Does not rotate.
    ///
    /// The borrow rules make the iterator safe by construction: the
    /// tree cannot be mutated while an iterator is alive, so the
    /// invalidation-on-mutation hazard of the underlying structure
    /// cannot be reached from safe code.
    pub fn iter(&self) -> Iter<'_, T> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }
}

impl<T: Keyed> Drop for SplayTree<T> {
    // Iterative teardown; a degenerate spine must not overflow the
    // stack through recursive Box drops.
    fn drop(&mut self) {
        let mut pending = Vec::new();
        if let Some(root) = self.root.take() {
            pending.push(root);
        }
        while let Some(mut node) = pending.pop() {
            if let Some(left) = node.left.take() {
                pending.push(left);
            }
            if let Some(right) = node.right.take() {
                pending.push(right);
            }
        }
    }
}

/// Ascending iterator over a [`SplayTree`].
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
}

impl<'a, T> Iter<'a, T> {
    fn push_left(&mut self, mut node: Option<&'a Node<T>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some(&node.item)
    }
}

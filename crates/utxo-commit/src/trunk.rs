//! One of the 16 top-level subtrees of the commitment.
//!
//! A trunk owns every node below it in three append-only arenas (nodes,
//! branch slots, leaf accumulators) behind a single mutex, so the tree as a
//! whole needs no per-node locking and up to 16 threads can update disjoint
//! trunks in parallel. Arena indices stay stable because splits only append
//! and collapses leave their orphans in place.

use crate::accumulator::MultisetAccumulator;
use crate::dataset::DataSet;
use crate::hasher::CommitmentHasher;
use crate::prefix::{nibble_at, prefix_matches, set_nibble};
use crate::{BRANCH_BITS, BRANCH_COUNT, Error, MAX_LEAF_SIZE, MIN_ELEMENT_SIZE, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A node queued for normalization: enough of the routed element's prefix
/// to re-query the node's range later.
struct NormalizeItem {
    node_index: u32,
    bits: u32,
    prefix: Vec<u8>,
}

impl NormalizeItem {
    fn new(node_index: u32, depth: usize, element: &[u8]) -> Self {
        Self {
            node_index,
            bits: (depth * BRANCH_BITS) as u32,
            prefix: element[..depth.div_ceil(2)].to_vec(),
        }
    }
}

/// Where a node's payload lives: the trunk's leaf pool or branch pool.
#[derive(Debug, Clone, Copy)]
enum NodePayload {
    Leaf(u32),
    Branch(u32),
}

/// One tree node. The count is signed: elements may be removed before they
/// are added, and the digest still cancels out once the add arrives.
struct Node {
    count: i64,
    payload: NodePayload,
}

impl Node {
    fn leaf(slot: u32) -> Self {
        Self {
            count: 0,
            payload: NodePayload::Leaf(slot),
        }
    }
}

/// Pool sizes of one trunk, for observability.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TrunkStats {
    pub nodes: usize,
    pub branches: usize,
    pub multisets: usize,
    pub pending: usize,
}

/// A trunk: its arenas and normalization queue behind one lock.
pub(crate) struct Trunk<M> {
    inner: Mutex<TrunkInner<M>>,
}

impl<M: MultisetAccumulator> Trunk<M> {
    /// A trunk containing nothing: a single empty leaf.
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(TrunkInner::new()),
        }
    }

    /// Adds or removes an element routed to this trunk.
    pub(crate) fn update(&self, element: &[u8], remove: bool) {
        self.inner.lock().update(element, remove);
    }

    /// Splits over-full leaves and collapses under-full branches until the
    /// queue is drained.
    pub(crate) fn normalize<D: DataSet + ?Sized>(&self, set: &D) -> Result<()> {
        self.inner.lock().normalize(set)
    }

    /// Feeds this trunk's root digest into `writer`.
    pub(crate) fn hash_into(&self, writer: &mut CommitmentHasher) {
        self.inner.lock().hash_node(writer, 0);
    }

    /// Pre-splits an empty trunk for an estimated element count, so bulk
    /// loading does not repeatedly split and re-query.
    pub(crate) fn set_capacity(&self, est_count: u64) {
        self.inner.lock().set_capacity(est_count, 0);
    }

    pub(crate) fn stats(&self) -> TrunkStats {
        let inner = self.inner.lock();
        TrunkStats {
            nodes: inner.nodes.len(),
            branches: inner.branches.len(),
            multisets: inner.multisets.len(),
            pending: inner.pending.len(),
        }
    }

    /// Position-by-position combination of two trunks with identical shape.
    /// `trunk_nibble` is this trunk's index, used to rebuild queue prefixes
    /// for any combined leaf that ends up over-full.
    pub(crate) fn combine(a: &Self, b: &Self, trunk_nibble: u8) -> Result<Self> {
        let a = a.inner.lock();
        let b = b.inner.lock();
        let mut out = TrunkInner::empty();
        let root_prefix = vec![trunk_nibble << 4];
        TrunkInner::combine_node(&a, &b, 0, 0, 1, root_prefix, &mut out)?;
        Ok(Self {
            inner: Mutex::new(out),
        })
    }
}

struct TrunkInner<M> {
    /// Node arena; index 0 is the trunk root.
    nodes: Vec<Node>,
    /// Child-slot arrays for branch nodes.
    branches: Vec<[u32; BRANCH_COUNT]>,
    /// Leaf accumulators.
    multisets: Vec<M>,
    /// Nodes whose size crossed the leaf threshold since the last drain.
    pending: VecDeque<NormalizeItem>,
}

impl<M: MultisetAccumulator> TrunkInner<M> {
    fn new() -> Self {
        let mut inner = Self::empty();
        inner.nodes.push(Node::leaf(0));
        inner.multisets.push(M::default());
        inner
    }

    fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            branches: Vec::new(),
            multisets: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Walks from the root to the element's leaf, adjusting counts on the
    /// way and queueing any node whose count crossed the leaf threshold.
    ///
    /// The trunk-selection nibble (depth 0) has already been consumed by
    /// the dispatch in [`CommitTree`](crate::CommitTree), so the walk
    /// starts at depth 1.
    fn update(&mut self, element: &[u8], remove: bool) {
        assert!(element.len() >= MIN_ELEMENT_SIZE);

        let delta: i64 = if remove { -1 } else { 1 };
        let mut node_index = 0u32;
        let mut depth = 1usize;

        loop {
            let node = &mut self.nodes[node_index as usize];
            node.count += delta;
            let count = node.count;

            match node.payload {
                NodePayload::Leaf(slot) => {
                    if count > MAX_LEAF_SIZE {
                        self.pending
                            .push_back(NormalizeItem::new(node_index, depth, element));
                    }
                    let multiset = &mut self.multisets[slot as usize];
                    if remove {
                        multiset.remove(element);
                    } else {
                        multiset.insert(element);
                    }
                    return;
                }
                NodePayload::Branch(slot) => {
                    // Any branch below the trunk root must stay above the
                    // leaf threshold; shrinking to it means collapse.
                    if count <= MAX_LEAF_SIZE {
                        self.pending
                            .push_back(NormalizeItem::new(node_index, depth, element));
                    }
                    node_index = self.branches[slot as usize][nibble_at(depth, element)];
                    depth += 1;
                }
            }
        }
    }

    /// Drains the queue. Items whose node no longer matches the queued
    /// condition (the size moved back across the threshold, or the node
    /// already changed kind) are dropped.
    fn normalize<D: DataSet + ?Sized>(&mut self, set: &D) -> Result<()> {
        while let Some(item) = self.pending.pop_front() {
            let count = self.nodes[item.node_index as usize].count;
            match self.nodes[item.node_index as usize].payload {
                NodePayload::Branch(_) if count <= MAX_LEAF_SIZE => {
                    self.collapse(item.node_index);
                }
                NodePayload::Leaf(slot) if count > MAX_LEAF_SIZE => {
                    self.split(&item, slot, set)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Shrinks a branch back to a single leaf carrying the combination of
    /// every descendant accumulator.
    fn collapse(&mut self, node_index: u32) {
        let mut combined = M::default();
        self.sum_leaves(node_index, &mut combined);

        let slot = self.multisets.len() as u32;
        self.multisets.push(combined);
        let node = &mut self.nodes[node_index as usize];
        node.payload = NodePayload::Leaf(slot);
        tracing::trace!(node_index, count = node.count, "collapsed branch");

        // The orphaned descendants stay in the arenas; a branch only exists
        // once >MAX_LEAF_SIZE elements routed there, so collapse is rare.
    }

    fn sum_leaves(&self, node_index: u32, acc: &mut M) {
        match self.nodes[node_index as usize].payload {
            NodePayload::Branch(slot) => {
                for child in self.branches[slot as usize] {
                    self.sum_leaves(child, acc);
                }
            }
            NodePayload::Leaf(slot) => acc.combine(&self.multisets[slot as usize]),
        }
    }

    /// Expands an over-full leaf into a branch of 16 fresh leaves and
    /// redistributes its elements from a range query against the backing
    /// set. The dataset must agree exactly with the tree about this range;
    /// any discrepancy is fatal.
    fn split<D: DataSet + ?Sized>(
        &mut self,
        item: &NormalizeItem,
        leaf_slot: u32,
        set: &D,
    ) -> Result<()> {
        let expected = self.nodes[item.node_index as usize].count;
        let depth = item.bits as usize / BRANCH_BITS;

        // The old accumulator slot is reset and taken over by child 0.
        self.multisets[leaf_slot as usize] = M::default();
        let children = self.split_node(item.node_index, leaf_slot);

        let mut cursor = set.get_range(&item.prefix, item.bits)?;
        let mut added: i64 = 0;
        while let Some(element) = cursor.next()? {
            if !prefix_matches(&element, &item.prefix, item.bits) {
                return Err(Error::ForeignElement {
                    prefix: hex::encode(&item.prefix),
                    bits: item.bits,
                });
            }

            let child = children[nibble_at(depth, &element)] as usize;
            self.nodes[child].count += 1;
            if let NodePayload::Leaf(slot) = self.nodes[child].payload {
                self.multisets[slot as usize].insert(&element);
            }
            added += 1;
        }

        if added != expected {
            return Err(Error::CountMismatch {
                prefix: hex::encode(&item.prefix),
                bits: item.bits,
                expected,
                actual: added,
            });
        }
        tracing::trace!(
            node_index = item.node_index,
            count = expected,
            "split leaf"
        );

        // The children may themselves be over- or under-full; queue them
        // all with their extended prefixes and let the drain loop decide.
        for (nibble, &child) in children.iter().enumerate() {
            let mut prefix = item.prefix.clone();
            set_nibble(&mut prefix, depth, nibble as u8);
            self.pending.push_back(NormalizeItem {
                node_index: child,
                bits: item.bits + BRANCH_BITS as u32,
                prefix,
            });
        }

        Ok(())
    }

    /// Turns a leaf into a branch of 16 empty leaves; child 0 takes over
    /// the node's accumulator slot. Returns the child node indices.
    fn split_node(&mut self, node_index: u32, leaf_slot: u32) -> [u32; BRANCH_COUNT] {
        let first_child = self.nodes.len() as u32;

        self.nodes.push(Node::leaf(leaf_slot));
        for _ in 1..BRANCH_COUNT {
            let slot = self.multisets.len() as u32;
            self.multisets.push(M::default());
            self.nodes.push(Node::leaf(slot));
        }

        let mut children = [0u32; BRANCH_COUNT];
        for (nibble, child) in children.iter_mut().enumerate() {
            *child = first_child + nibble as u32;
        }

        let branch_slot = self.branches.len() as u32;
        self.branches.push(children);
        self.nodes[node_index as usize].payload = NodePayload::Branch(branch_slot);

        children
    }

    /// Recursively pre-splits empty leaves that an estimated `est_count`
    /// elements would overflow anyway. The 1.5x margin errs toward not
    /// splitting, as collapsing is cheaper than splitting.
    fn set_capacity(&mut self, est_count: u64, node_index: u32) {
        let NodePayload::Leaf(slot) = self.nodes[node_index as usize].payload else {
            return;
        };
        debug_assert_eq!(self.nodes[node_index as usize].count, 0);

        if est_count + est_count / 2 < MAX_LEAF_SIZE as u64 {
            return;
        }

        let children = self.split_node(node_index, slot);
        for child in children {
            self.set_capacity(est_count / BRANCH_COUNT as u64, child);
        }
    }

    /// Computes the digest of a node: a leaf contributes its accumulator
    /// digest, a branch the digest of its 16 children's digests in slot
    /// order.
    fn hash_node(&self, writer: &mut CommitmentHasher, node_index: u32) {
        match self.nodes[node_index as usize].payload {
            NodePayload::Branch(slot) => {
                let mut branch_writer = CommitmentHasher::new();
                for child in self.branches[slot as usize] {
                    self.hash_node(&mut branch_writer, child);
                }
                writer.write(&branch_writer.finalize());
            }
            NodePayload::Leaf(slot) => {
                writer.write(&self.multisets[slot as usize].finalize());
            }
        }
    }

    /// Builds the position-wise combination of two equal-shaped subtrees
    /// into `out`, returning the new node's index. A combined leaf that
    /// exceeds the leaf threshold is queued so a later `normalize` against
    /// the union dataset can split it.
    fn combine_node(
        a: &Self,
        b: &Self,
        a_index: u32,
        b_index: u32,
        depth: usize,
        prefix: Vec<u8>,
        out: &mut Self,
    ) -> Result<u32> {
        let a_node = &a.nodes[a_index as usize];
        let b_node = &b.nodes[b_index as usize];
        let count = a_node.count + b_node.count;

        match (a_node.payload, b_node.payload) {
            (NodePayload::Leaf(a_slot), NodePayload::Leaf(b_slot)) => {
                let mut multiset = a.multisets[a_slot as usize].clone();
                multiset.combine(&b.multisets[b_slot as usize]);

                let slot = out.multisets.len() as u32;
                out.multisets.push(multiset);
                let node_index = out.nodes.len() as u32;
                out.nodes.push(Node {
                    count,
                    payload: NodePayload::Leaf(slot),
                });
                if count > MAX_LEAF_SIZE {
                    out.pending.push_back(NormalizeItem {
                        node_index,
                        bits: (depth * BRANCH_BITS) as u32,
                        prefix,
                    });
                }
                Ok(node_index)
            }
            (NodePayload::Branch(a_slot), NodePayload::Branch(b_slot)) => {
                let node_index = out.nodes.len() as u32;
                out.nodes.push(Node {
                    count,
                    payload: NodePayload::Branch(0),
                });

                let mut children = [0u32; BRANCH_COUNT];
                for nibble in 0..BRANCH_COUNT {
                    let mut child_prefix = prefix.clone();
                    set_nibble(&mut child_prefix, depth, nibble as u8);
                    children[nibble] = Self::combine_node(
                        a,
                        b,
                        a.branches[a_slot as usize][nibble],
                        b.branches[b_slot as usize][nibble],
                        depth + 1,
                        child_prefix,
                        out,
                    )?;
                }

                let branch_slot = out.branches.len() as u32;
                out.branches.push(children);
                out.nodes[node_index as usize].payload = NodePayload::Branch(branch_slot);
                Ok(node_index)
            }
            _ => Err(Error::ShapeMismatch),
        }
    }
}

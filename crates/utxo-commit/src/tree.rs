//! The 16-trunk commitment tree.

use crate::accumulator::MultisetAccumulator;
use crate::coin::{Coin, serialize_element};
use crate::dataset::DataSet;
use crate::hasher::CommitmentHasher;
use crate::trunk::Trunk;
use crate::{BRANCH_BITS, BRANCH_COUNT, MIN_ELEMENT_SIZE, Result};
use bitcoin::OutPoint;
use utxo_commit_crypto::MuHash3072;

/// The commitment tree with the default MuHash accumulator.
pub type UtxoCommitment = CommitTree<MuHash3072>;

/// Aggregated arena sizes across all trunks, for observability.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeStats {
    /// Total tree nodes, including orphans left behind by collapses.
    pub nodes: usize,
    /// Allocated branch child-slot arrays.
    pub branches: usize,
    /// Allocated leaf accumulators.
    pub multisets: usize,
    /// Queued normalization items not yet drained.
    pub pending: usize,
}

/// An incrementally maintainable, order-independent commitment over a set
/// of byte-string elements.
///
/// Elements are dispatched to one of 16 independently locked trunks by the
/// high nibble of their first byte; see the crate docs for the overall
/// shape. The digest depends only on the current multiset and the
/// normalized tree shape, not on the order operations arrived in.
pub struct CommitTree<M: MultisetAccumulator = MuHash3072> {
    trunks: [Trunk<M>; BRANCH_COUNT],
}

impl<M: MultisetAccumulator> Default for CommitTree<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MultisetAccumulator> CommitTree<M> {
    /// An empty tree: 16 trunks, each a single identity leaf.
    pub fn new() -> Self {
        Self {
            trunks: std::array::from_fn(|_| Trunk::new()),
        }
    }

    /// Adds (`remove = false`) or removes (`remove = true`) an element.
    ///
    /// Thread-safe; updates to distinct trunks proceed in parallel.
    ///
    /// # Panics
    ///
    /// If `element` is shorter than [`MIN_ELEMENT_SIZE`] bytes.
    pub fn update(&self, element: &[u8], remove: bool) {
        assert!(
            element.len() >= MIN_ELEMENT_SIZE,
            "element must be at least {MIN_ELEMENT_SIZE} bytes"
        );
        self.trunks[(element[0] >> 4) as usize].update(element, remove);
    }

    /// Adds a UTXO, serialized canonically.
    pub fn add(&self, outpoint: &OutPoint, coin: &Coin) {
        self.update(&serialize_element(outpoint, coin), false);
    }

    /// Removes a UTXO, serialized canonically.
    pub fn remove(&self, outpoint: &OutPoint, coin: &Coin) {
        self.update(&serialize_element(outpoint, coin), true);
    }

    /// Restores the leaf-size invariants across all trunks, splitting
    /// over-full leaves with range queries against `set` and collapsing
    /// under-full branches.
    ///
    /// `set` must reflect the exact element set currently committed to;
    /// any disagreement discovered during a split is fatal.
    pub fn normalize<D: DataSet + ?Sized>(&self, set: &D) -> Result<()> {
        for trunk in &self.trunks {
            trunk.normalize(set)?;
        }
        Ok(())
    }

    /// Builds the tree from scratch out of `set`, one loader thread per
    /// trunk. The exclusive borrow keeps concurrent updates out; a tree
    /// abandoned mid-load (e.g. on error) has a meaningless digest until
    /// reloaded.
    pub fn initial_load<D: DataSet + Sync + ?Sized>(&mut self, set: &D) -> Result<()> {
        let total = set.size();
        tracing::info!("Initial load of {total} elements");

        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .trunks
                .iter()
                .enumerate()
                .map(|(nibble, trunk)| scope.spawn(move || Self::load_trunk(trunk, nibble, set)))
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().expect("trunk loader panicked"))
                .collect::<Result<()>>()
        })?;

        let stats = self.stats();
        tracing::info!(
            nodes = stats.nodes,
            branches = stats.branches,
            multisets = stats.multisets,
            "Initial load done"
        );
        Ok(())
    }

    fn load_trunk<D: DataSet + ?Sized>(trunk: &Trunk<M>, nibble: usize, set: &D) -> Result<()> {
        trunk.set_capacity(set.size() / BRANCH_COUNT as u64);

        let prefix = [(nibble as u8) << 4];
        let mut cursor = set.get_range(&prefix, BRANCH_BITS as u32)?;
        let mut count = 0u64;
        while let Some(element) = cursor.next()? {
            trunk.update(&element, false);
            count += 1;
        }

        trunk.normalize(set)?;
        tracing::debug!("Trunk {nibble:x} loaded {count} elements");
        Ok(())
    }

    /// The 32-byte commitment: each trunk's root digest, trunk 0 through
    /// trunk 15, folded through one streaming hash.
    ///
    /// Trunk locks are taken one at a time, so the result is only a
    /// meaningful snapshot when no updates are in flight.
    pub fn hash(&self) -> [u8; 32] {
        let mut writer = CommitmentHasher::new();
        for trunk in &self.trunks {
            trunk.hash_into(&mut writer);
        }
        writer.finalize()
    }

    /// Builds the tree committing to the union of two trees' multisets by
    /// combining accumulators position by position.
    ///
    /// Both trees must be fully normalized, structurally identical
    /// ([`Error::ShapeMismatch`](crate::Error::ShapeMismatch) otherwise)
    /// and distinct objects, since each pair of trunk locks is held while
    /// its subtrees are walked. Combined leaves may exceed the leaf
    /// threshold; they are queued, and a `normalize` against the union
    /// dataset restores the invariants.
    pub fn combine(a: &Self, b: &Self) -> Result<Self> {
        let mut trunks = Vec::with_capacity(BRANCH_COUNT);
        for nibble in 0..BRANCH_COUNT {
            trunks.push(Trunk::combine(
                &a.trunks[nibble],
                &b.trunks[nibble],
                nibble as u8,
            )?);
        }
        Ok(Self {
            trunks: trunks
                .try_into()
                .unwrap_or_else(|_| unreachable!("exactly BRANCH_COUNT trunks were built")),
        })
    }

    /// Aggregated arena sizes, mostly interesting after an initial load.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        for trunk in &self.trunks {
            let t = trunk.stats();
            stats.nodes += t.nodes;
            stats.branches += t.branches;
            stats.multisets += t.multisets;
            stats.pending += t.pending;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "at least")]
    fn test_short_element_panics() {
        let tree = UtxoCommitment::new();
        tree.update(&[0x01, 0x02, 0x03], false);
    }

    #[test]
    fn test_dispatch_by_leading_nibble() {
        let tree = UtxoCommitment::new();
        tree.update(&[0x50, 0x00, 0x00, 0x01], false);
        tree.update(&[0x5f, 0x00, 0x00, 0x02], false);
        tree.update(&[0xa0, 0x00, 0x00, 0x03], false);

        // No trunk overflowed, so every trunk is still its single leaf;
        // only counts moved.
        let stats = tree.stats();
        assert_eq!(stats.nodes, BRANCH_COUNT);
        assert_eq!(stats.multisets, BRANCH_COUNT);
    }
}

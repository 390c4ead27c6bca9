//! The multiset accumulator seam.

use utxo_commit_crypto::MuHash3072;

/// Capability the tree requires of its per-leaf accumulators.
///
/// `insert` and `remove` must commute in every combination and be exact
/// inverses of each other, so that the digest depends only on the net
/// multiset. `Default` must produce the identity (empty multiset)
/// accumulator, and `finalize` must be deterministic.
pub trait MultisetAccumulator: Clone + Default + Send {
    /// Absorbs one element; absorbing the same bytes twice keeps two copies.
    fn insert(&mut self, element: &[u8]);

    /// Withdraws one element. Withdrawing before the matching insert is
    /// legal and cancels out once the insert arrives.
    fn remove(&mut self, element: &[u8]);

    /// Merges `other` into `self`, yielding the multiset union.
    fn combine(&mut self, other: &Self);

    /// The 32-byte digest of the current multiset.
    fn finalize(&self) -> [u8; 32];
}

impl MultisetAccumulator for MuHash3072 {
    fn insert(&mut self, element: &[u8]) {
        MuHash3072::insert(self, element)
    }

    fn remove(&mut self, element: &[u8]) {
        MuHash3072::remove(self, element)
    }

    fn combine(&mut self, other: &Self) {
        MuHash3072::combine(self, other)
    }

    fn finalize(&self) -> [u8; 32] {
        self.digest()
    }
}

//! Streaming hash used to aggregate node digests.

use sha2::{Digest, Sha256};

/// Accumulates 32-byte node digests into a single 32-byte output.
///
/// Branches feed their children into a fresh writer and forward its
/// finalized output, so the overall digest commits to the tree shape as
/// well as to the leaf multisets.
pub(crate) struct CommitmentHasher(Sha256);

impl CommitmentHasher {
    pub(crate) fn new() -> Self {
        Self(Sha256::new())
    }

    pub(crate) fn write(&mut self, digest: &[u8; 32]) {
        self.0.update(digest);
    }

    pub(crate) fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

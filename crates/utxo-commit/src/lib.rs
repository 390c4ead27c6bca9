//! In-memory UTXO set commitment engine.
//!
//! Maintains a cryptographic commitment over a set of unspent transaction
//! outputs that can be updated incrementally as outputs are created and
//! spent. The digest is invariant under operation order: adding then
//! removing an element returns the commitment to its prior state, and any
//! permutation of the same update multiset yields the same hash.
//!
//! ## Architecture
//!
//! - **16 trunks**: the element space is partitioned by the leading nibble
//!   into 16 independently locked subtrees, so up to 16 threads can update
//!   the commitment in parallel without per-node locking.
//! - **Radix-16 tree per trunk**: leaves carry a [`MuHash3072`] multiset
//!   accumulator; branches fan out on one nibble of the element prefix.
//! - **Deferred normalization**: `update` is O(depth) and only queues nodes
//!   whose size crossed the leaf threshold. [`CommitTree::normalize`] drains
//!   the queue, splitting over-full leaves (re-reading their range from a
//!   backing [`DataSet`]) and collapsing under-full branches.
//!
//! The tree itself is not persisted; it is rebuilt from the backing set via
//! [`CommitTree::initial_load`], and only the 32-byte digest is stable
//! across runs.

mod accumulator;
mod coin;
mod dataset;
mod error;
mod hasher;
mod prefix;
mod trunk;
mod tree;

pub use accumulator::MultisetAccumulator;
pub use coin::{Coin, serialize_element};
pub use dataset::{DataSet, DataSetCursor, MemoryUtxoSet};
pub use error::Error;
pub use tree::{CommitTree, TreeStats, UtxoCommitment};

// Re-export the default accumulator so consumers need not depend on the
// crypto crate directly.
pub use utxo_commit_crypto::MuHash3072;

/// Result type for commitment operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fanout of every branch node; one hex nibble.
pub const BRANCH_COUNT: usize = 16;

/// Number of element bits consumed per tree level.
pub const BRANCH_BITS: usize = 4;

/// Maximum number of elements a leaf may hold after normalization. A leaf
/// that grows past this is split; a branch that shrinks to it is collapsed.
pub const MAX_LEAF_SIZE: i64 = 2000;

/// Minimum accepted element length in bytes.
pub const MIN_ELEMENT_SIZE: usize = 4;

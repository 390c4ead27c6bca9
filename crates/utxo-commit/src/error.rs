//! Error types for the commitment engine.

/// Errors surfaced by normalization and bulk loading.
///
/// All of these are fatal: they mean the backing dataset disagrees with the
/// tree (or failed outright), so the commitment can no longer be trusted and
/// must be rebuilt with a fresh [`initial_load`](crate::CommitTree::initial_load).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A range query yielded a different number of elements than the tree
    /// routed to that subtree.
    #[error(
        "dataset yielded {actual} elements for prefix {prefix}/{bits}, tree expected {expected}"
    )]
    CountMismatch {
        prefix: String,
        bits: u32,
        expected: i64,
        actual: i64,
    },

    /// A range query yielded an element that does not fall under the
    /// queried prefix.
    #[error("dataset yielded an element outside prefix {prefix}/{bits}")]
    ForeignElement { prefix: String, bits: u32 },

    /// Two trees with different shapes were passed to
    /// [`combine`](crate::CommitTree::combine).
    #[error("cannot combine structurally different commitment trees")]
    ShapeMismatch,

    /// IO error from the dataset cursor.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

/// Errors raised while wrapping a structure in a collection.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The top level of the wrapped structure must be a sequence or a
    /// mapping, never a bare handle.
    #[error("Invalid structure, the top level must be a sequence or a mapping of targets")]
    InvalidStructure,

    #[error("Structure nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// Sibling collections accept filesystem-backed targets and other
    /// sibling collections, nothing else.
    #[error("Sibling collections only hold file targets and sibling collections, got {0}")]
    ForeignHandle(String),

    #[error("Sibling collections cannot be empty, the shared directory comes from the first target")]
    EmptySibling,
}

/// Errors raised on direct slot access.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Slot index {index} out of range, the collection holds {len} slots")]
    OutOfRange { index: usize, len: usize },

    #[error("No slot named '{0}'")]
    MissingKey(String),

    #[error("Sequence-backed collections are indexed by position, not by name '{0}'")]
    KeyOnSequence(String),

    #[error("Mapping-backed collections are indexed by name, not by position {0}")]
    IndexOnMapping(usize),
}

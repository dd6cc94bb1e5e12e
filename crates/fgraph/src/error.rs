use thiserror::Error;

use crate::graph::{GraphItem, NodeId, ValueId, ValueType};

pub type GraphResult<T> = Result<T, GraphError>;

/// Errors surfaced by graph edits, observers and transactions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// A functionally equivalent feature is already attached.
    #[error("{0}")]
    AlreadyPresent(String),
    /// A consistency check failed.
    #[error("inconsistent graph: {0}")]
    Inconsistency(String),
    #[error("replacement did not remove {remaining:?} (reason: {reason})")]
    ReplacementDidNotRemove {
        reason: String,
        remaining: Vec<GraphItem>,
    },
    #[error(
        "the type of the replacement must be the same as the type of the original value: \
         expected {expected}, found {found}"
    )]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },
    #[error("value {0} does not belong to this graph")]
    ForeignValue(ValueId),
    #[error("node {0} does not belong to this graph")]
    ForeignNode(NodeId),
    #[error("maximum import depth of {limit} exceeded while importing {value}")]
    DepthExhausted { limit: usize, value: ValueId },
    #[error("value {0} is used but is neither a graph input nor a constant")]
    MissingInput(ValueId),
    #[error("no entry point named `{0}` is installed on this graph")]
    MissingEntryPoint(&'static str),
    #[error("feature `{0}` already serves another graph")]
    FeatureBusy(&'static str),
    #[error("feature `{0}` is not attached to this graph")]
    NotAttached(&'static str),
    #[error("operation `{0}` is unhashable and cannot be queried")]
    Unhashable(String),
    #[error("dependency cycle through node {0}")]
    Cycle(NodeId),
    /// Failure raised by an observer callback.
    #[error("{0}")]
    Observer(String),
}

/// Structural classification of an edit failure inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected rejection of a candidate rewrite; revert and re-raise.
    Recoverable,
    /// Reverting would fail the same way; propagate untouched.
    Fatal,
    /// Likely a bug in the graph or an observer; log, revert and re-raise.
    Unexpected,
}

impl GraphError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GraphError::TypeMismatch { .. }
            | GraphError::ForeignValue(_)
            | GraphError::ForeignNode(_)
            | GraphError::Cycle(_) => ErrorClass::Recoverable,
            GraphError::DepthExhausted { .. } => ErrorClass::Fatal,
            _ => ErrorClass::Unexpected,
        }
    }

    pub fn is_already_present(&self) -> bool {
        matches!(self, GraphError::AlreadyPresent(_))
    }
}

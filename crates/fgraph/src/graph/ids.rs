use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifier of a value (an edge endpoint) in a graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Identifier of an applied operation in a graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Process-unique identity of a [`FunctionGraph`](super::FunctionGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub u64);

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(0);

impl GraphId {
    pub(crate) fn fresh() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whoever reads a value at a given input position.
///
/// `Output` stands for the graph's output list: position `i` of the `Output`
/// consumer is `graph.outputs()[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Consumer {
    Node(NodeId),
    Output,
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consumer::Node(node) => write!(f, "{node}"),
            Consumer::Output => f.write_str("output"),
        }
    }
}

/// A single use of a value: `(consumer, position)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Client {
    pub consumer: Consumer,
    pub position: usize,
}

/// Something a transaction can declare it intends to eliminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum GraphItem {
    Node(NodeId),
    Value(ValueId),
}

impl From<NodeId> for GraphItem {
    fn from(node: NodeId) -> Self {
        GraphItem::Node(node)
    }
}

impl From<ValueId> for GraphItem {
    fn from(value: ValueId) -> Self {
        GraphItem::Value(value)
    }
}

impl fmt::Display for GraphItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphItem::Node(node) => write!(f, "{node}"),
            GraphItem::Value(value) => write!(f, "{value}"),
        }
    }
}

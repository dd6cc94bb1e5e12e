//! Capability-registration table.
//!
//! Features publish callable entry points onto the graph they serve by name.
//! Rewrite rules look capabilities up by name without knowing which feature
//! provides them; the graph's convenience methods (`checkpoint`, `validate`,
//! `replace_all`, ...) are thin lookups into this table.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::graph::{FunctionGraph, GraphItem, NodeId, Op, ValueId};

pub const CHECKPOINT: &str = "checkpoint";
pub const REVERT: &str = "revert";
pub const VALIDATE: &str = "validate";
pub const CONSISTENT: &str = "consistent";
pub const REPLACE: &str = "replace";
pub const REPLACE_ALL: &str = "replace_all";
pub const REPLACE_ALL_REMOVE: &str = "replace_all_remove";
pub const GET_NODES: &str = "get_nodes";

/// Opaque handle to a position in a graph's edit history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Checkpoint(pub u64);

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "checkpoint#{}", self.0)
    }
}

/// Undo support published under `checkpoint` / `revert`.
pub trait History {
    fn checkpoint(&self, graph: &mut FunctionGraph) -> Checkpoint;

    /// Undoes every edge rewrite since `checkpoint`.
    ///
    /// # Panics
    /// When `checkpoint` is not the most recently issued handle.
    fn revert(&self, graph: &mut FunctionGraph, checkpoint: Checkpoint) -> GraphResult<()>;
}

/// Consistency checking published under `validate` / `consistent`.
pub trait Validation {
    /// Runs every consistency check contributed by the graph's features.
    /// `report` enables a diagnostic describing the failure.
    fn validate(&self, graph: &mut FunctionGraph, report: bool) -> GraphResult<()>;

    fn consistent(&self, graph: &mut FunctionGraph) -> bool {
        self.validate(graph, false).is_ok()
    }
}

/// Atomic multi-edit transactions published under `replace*`.
pub trait Transactions {
    fn replace_all(
        &self,
        graph: &mut FunctionGraph,
        pairs: &[(ValueId, ValueId)],
        reason: &str,
        verbose: Option<bool>,
    ) -> GraphResult<Checkpoint>;

    fn replace_all_remove(
        &self,
        graph: &mut FunctionGraph,
        pairs: &[(ValueId, ValueId)],
        remove: &[GraphItem],
        reason: &str,
        warn: bool,
    ) -> GraphResult<Checkpoint>;
}

/// Reverse lookup from an operation to the nodes applying it.
pub trait NodeQuery {
    fn query(&self, graph: &FunctionGraph, op: &Op) -> GraphResult<Vec<NodeId>>;
}

/// A registered entry point.
#[derive(Clone)]
pub enum Capability {
    History(Rc<dyn History>),
    Validation(Rc<dyn Validation>),
    Transactions(Rc<dyn Transactions>),
    NodeQuery(Rc<dyn NodeQuery>),
}

impl Capability {
    fn kind(&self) -> &'static str {
        match self {
            Capability::History(_) => "history",
            Capability::Validation(_) => "validation",
            Capability::Transactions(_) => "transactions",
            Capability::NodeQuery(_) => "node-query",
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability::{}", self.kind())
    }
}

/// Name-keyed entry-point table owned by a graph.
#[derive(Debug, Default, Clone)]
pub struct EntryPoints {
    table: BTreeMap<&'static str, Capability>,
}

impl EntryPoints {
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Returns the first of `names` already taken, if any.
    pub fn first_conflict(&self, names: &[&'static str]) -> Option<&'static str> {
        names.iter().copied().find(|name| self.contains(name))
    }

    pub fn install(&mut self, name: &'static str, capability: Capability) -> GraphResult<()> {
        if self.contains(name) {
            return Err(GraphError::AlreadyPresent(format!(
                "entry point `{name}` is already installed"
            )));
        }
        self.table.insert(name, capability);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Capability> {
        self.table.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.table.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

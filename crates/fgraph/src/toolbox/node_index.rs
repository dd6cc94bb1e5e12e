use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{GraphError, GraphResult};
use crate::graph::entry::{self, Capability, NodeQuery};
use crate::graph::{FunctionGraph, GraphId, NodeId, Op, OpKey};

use super::{bookkeeper, Feature};

struct NodeIndexCore {
    graph: Cell<Option<GraphId>>,
    table: RefCell<HashMap<OpKey, Vec<NodeId>>>,
}

impl NodeQuery for NodeIndexCore {
    fn query(&self, _graph: &FunctionGraph, op: &Op) -> GraphResult<Vec<NodeId>> {
        let key = op.key().ok_or_else(|| GraphError::Unhashable(op.to_string()))?;
        Ok(self.table.borrow().get(&key).cloned().unwrap_or_default())
    }
}

/// Reverse index from operation to the nodes applying it, published as
/// `get_nodes`.
///
/// Nodes whose op is unhashable are not indexed. One index serves one graph,
/// and a graph accepts one index.
pub struct NodeIndex {
    core: Rc<NodeIndexCore>,
}

impl NodeIndex {
    const NAME: &'static str = "NodeIndex";

    pub fn new() -> Self {
        Self {
            core: Rc::new(NodeIndexCore {
                graph: Cell::new(None),
                table: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Number of distinct operations currently indexed.
    pub fn indexed_ops(&self) -> usize {
        self.core.table.borrow().len()
    }

    fn op_key(graph: &FunctionGraph, node: NodeId) -> Option<OpKey> {
        graph.node(node).and_then(|apply| apply.op.key())
    }
}

impl Default for NodeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Feature for NodeIndex {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn on_attach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        if self.core.graph.get().is_some() {
            return Err(GraphError::FeatureBusy(Self::NAME));
        }
        if graph.has_entry(entry::GET_NODES) {
            return Err(GraphError::AlreadyPresent(
                "NodeIndex is already present or in conflict with another feature".to_string(),
            ));
        }
        self.core.graph.set(Some(graph.id()));
        graph.install_entry(entry::GET_NODES, Capability::NodeQuery(self.core.clone()))?;
        if let Err(err) = bookkeeper::import_all(self, graph) {
            graph.remove_entry(entry::GET_NODES);
            self.core.table.borrow_mut().clear();
            self.core.graph.set(None);
            return Err(err);
        }
        Ok(())
    }

    fn on_detach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        if self.core.graph.get() != Some(graph.id()) {
            return Err(GraphError::NotAttached(Self::NAME));
        }
        self.core.graph.set(None);
        graph.remove_entry(entry::GET_NODES);
        bookkeeper::prune_all(self, graph)?;
        self.core.table.borrow_mut().clear();
        Ok(())
    }

    fn on_import(&self, graph: &mut FunctionGraph, node: NodeId, _reason: &str) -> GraphResult<()> {
        let Some(key) = Self::op_key(graph, node) else {
            return Ok(());
        };
        self.core.table.borrow_mut().entry(key).or_default().push(node);
        Ok(())
    }

    fn on_prune(&self, graph: &mut FunctionGraph, node: NodeId, _reason: &str) -> GraphResult<()> {
        let Some(key) = Self::op_key(graph, node) else {
            return Ok(());
        };
        let mut table = self.core.table.borrow_mut();
        if let Some(nodes) = table.get_mut(&key) {
            nodes.retain(|n| *n != node);
            if nodes.is_empty() {
                table.remove(&key);
            }
        }
        Ok(())
    }

    fn restore(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        graph.remove_entry(entry::GET_NODES);
        graph.install_entry(entry::GET_NODES, Capability::NodeQuery(self.core.clone()))
    }
}

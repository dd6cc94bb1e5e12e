use serde::{Deserialize, Serialize};

use crate::error::GraphResult;
use crate::graph::{Consumer, FunctionGraph, NodeId, ValueId};

use super::Feature;

/// Logs every graph event while `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintListener {
    pub active: bool,
}

impl PrintListener {
    pub fn new(active: bool) -> Self {
        Self { active }
    }

    fn describe(graph: &FunctionGraph, node: NodeId) -> String {
        match graph.node(node) {
            Some(apply) => format!("{node} = {}({:?})", apply.op, apply.inputs),
            None => node.to_string(),
        }
    }
}

impl Default for PrintListener {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Feature for PrintListener {
    fn name(&self) -> &'static str {
        "PrintListener"
    }

    fn on_attach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        if self.active {
            tracing::info!(graph = graph.id().0, "-- attaching");
        }
        Ok(())
    }

    fn on_detach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        if self.active {
            tracing::info!(graph = graph.id().0, "-- detaching");
        }
        Ok(())
    }

    fn on_import(&self, graph: &mut FunctionGraph, node: NodeId, reason: &str) -> GraphResult<()> {
        if self.active {
            tracing::info!(reason, "-- importing: {}", Self::describe(graph, node));
        }
        Ok(())
    }

    fn on_prune(&self, graph: &mut FunctionGraph, node: NodeId, reason: &str) -> GraphResult<()> {
        if self.active {
            tracing::info!(reason, "-- pruning: {}", Self::describe(graph, node));
        }
        Ok(())
    }

    fn on_change_input(
        &self,
        _graph: &mut FunctionGraph,
        consumer: Consumer,
        position: usize,
        old: ValueId,
        new: ValueId,
        reason: &str,
    ) -> GraphResult<()> {
        if self.active {
            tracing::info!(reason, "-- changing ({consumer}.inputs[{position}]) from {old} to {new}");
        }
        Ok(())
    }
}

/// Carries the `name` and `nan_guard` tags over to replacement values.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreserveVariableAttributes;

impl Feature for PreserveVariableAttributes {
    fn name(&self) -> &'static str {
        "PreserveVariableAttributes"
    }

    fn on_change_input(
        &self,
        graph: &mut FunctionGraph,
        _consumer: Consumer,
        _position: usize,
        old: ValueId,
        new: ValueId,
        _reason: &str,
    ) -> GraphResult<()> {
        let Some(source) = graph.value(old).map(|var| (var.name.clone(), var.nan_guard)) else {
            return Ok(());
        };
        if let Some(target) = graph.value_mut(new) {
            if target.name.is_none() {
                target.name = source.0;
            }
            if source.1 && !target.nan_guard {
                target.nan_guard = true;
            }
        }
        Ok(())
    }
}

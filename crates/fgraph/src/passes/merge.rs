use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{GraphError, GraphResult};
use crate::graph::{entry, Apply, FunctionGraph, NodeId, ValueId};
use crate::pipeline::{GraphPass, OptimizeContext, PassResult};
use crate::toolbox::NodeIndex;

use super::eliminate_node;

/// Merges nodes applying the same op to the same inputs.
///
/// Candidates come from the `get_nodes` index; ops that overwrite an input
/// and unhashable ops are left alone. The later node in topological order is
/// replaced by the earlier one.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergePass;

impl MergePass {
    const NAME: &'static str = "merge";

    fn same_computation(graph: &FunctionGraph, a: &Apply, b: &Apply) -> bool {
        a.op == b.op
            && a.inputs == b.inputs
            && a.outputs.len() == b.outputs.len()
            && a.outputs.iter().zip(&b.outputs).all(|(x, y)| {
                graph.value(*x).map(|v| &v.ty) == graph.value(*y).map(|v| &v.ty)
            })
    }
}

impl GraphPass for MergePass {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn add_requirements(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        if graph.has_entry(entry::GET_NODES) {
            return Ok(());
        }
        match graph.attach_feature(Rc::new(NodeIndex::new())) {
            Err(err) if !err.is_already_present() => Err(err),
            _ => Ok(()),
        }
    }

    fn run(&self, graph: &mut FunctionGraph, cx: &mut OptimizeContext) -> GraphResult<PassResult> {
        let mut stats = PassResult::default();
        let order = graph.io_toposort()?;
        let rank: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, node)| (*node, i)).collect();

        for node in order {
            if !graph.contains_node(node) || cx.is_rejected(Self::NAME, node) {
                continue;
            }
            stats.iterations = stats.iterations.saturating_add(1);

            let Some(apply) = graph.node(node).cloned() else {
                continue;
            };
            if !apply.op.destroy_map.is_empty() {
                continue;
            }
            let candidates = match graph.get_nodes(&apply.op) {
                Ok(nodes) => nodes,
                Err(GraphError::Unhashable(_)) => continue,
                Err(err) => return Err(err),
            };

            let own_rank = rank.get(&node).copied().unwrap_or(usize::MAX);
            let view: &FunctionGraph = graph;
            let target = candidates.into_iter().find(|other| {
                *other != node
                    && view.contains_node(*other)
                    && rank.get(other).copied().unwrap_or(usize::MAX) < own_rank
                    && view
                        .node(*other)
                        .is_some_and(|b| Self::same_computation(view, &apply, b))
            });
            let Some(target) = target.and_then(|t| view.node(t)) else {
                continue;
            };

            let pairs: Vec<(ValueId, ValueId)> = apply
                .outputs
                .iter()
                .copied()
                .zip(target.outputs.iter().copied())
                .collect();
            eliminate_node(graph, cx, Self::NAME, node, &pairs, &mut stats)?;
        }

        Ok(stats)
    }
}

use crate::error::GraphResult;
use crate::graph::FunctionGraph;
use crate::pipeline::{GraphPass, OptimizeContext, PassResult};

use super::eliminate_node;

/// Forwards the input of every `identity` node to its clients and drops the
/// node.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityEliminationPass;

impl IdentityEliminationPass {
    const NAME: &'static str = "identity_elimination";
    pub const OP_NAME: &'static str = "identity";
}

impl GraphPass for IdentityEliminationPass {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, graph: &mut FunctionGraph, cx: &mut OptimizeContext) -> GraphResult<PassResult> {
        let mut stats = PassResult::default();

        for node in graph.io_toposort()? {
            if !graph.contains_node(node) || cx.is_rejected(Self::NAME, node) {
                continue;
            }
            stats.iterations = stats.iterations.saturating_add(1);

            let Some(apply) = graph.node(node) else {
                continue;
            };
            if apply.op.name != Self::OP_NAME || apply.inputs.len() != 1 || apply.outputs.len() != 1 {
                continue;
            }
            let pair = (apply.outputs[0], apply.inputs[0]);
            eliminate_node(graph, cx, Self::NAME, node, &[pair], &mut stats)?;
        }

        Ok(stats)
    }
}

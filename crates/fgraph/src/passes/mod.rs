//! Rewrite passes built on the transactional entry points.

mod identity;
mod merge;

pub use identity::IdentityEliminationPass;
pub use merge::MergePass;

use crate::error::{ErrorClass, GraphResult};
use crate::graph::{FunctionGraph, GraphItem, NodeId, ValueId};
use crate::pipeline::{OptimizeContext, PassResult};

/// Replaces the outputs of `node` and requires `node` to disappear.
///
/// A rejected transaction is recorded in `cx` so fixed-point iterations do not
/// retry it; only fatal errors abort the pass.
fn eliminate_node(
    graph: &mut FunctionGraph,
    cx: &mut OptimizeContext,
    pass: &'static str,
    node: NodeId,
    pairs: &[(ValueId, ValueId)],
    stats: &mut PassResult,
) -> GraphResult<()> {
    match graph.replace_all_remove(pairs, &[GraphItem::Node(node)], pass, true) {
        Ok(_) => {
            stats.changed = true;
            stats.rewrites_applied += 1;
            Ok(())
        }
        Err(err) if err.class() == ErrorClass::Fatal => Err(err),
        Err(err) => {
            tracing::debug!(pass, node = %node, error = %err, "rewrite rejected");
            cx.record_rejected(pass, node);
            stats.rejected += 1;
            Ok(())
        }
    }
}

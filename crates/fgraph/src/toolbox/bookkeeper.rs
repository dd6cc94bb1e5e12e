//! Replays graph contents into a feature's import/prune callbacks, so a
//! feature sees every node through `on_import` whether it predates the attach
//! or not.

use crate::error::GraphResult;
use crate::graph::FunctionGraph;

use super::Feature;

pub const ATTACH_REASON: &str = "on_attach";
pub const DETACH_REASON: &str = "Bookkeeper.detach";

/// Calls `on_import` for every node in data-dependency order.
pub fn import_all<F: Feature + ?Sized>(feature: &F, graph: &mut FunctionGraph) -> GraphResult<()> {
    for node in graph.io_toposort()? {
        feature.on_import(graph, node, ATTACH_REASON)?;
    }
    Ok(())
}

/// Calls `on_prune` for every node in data-dependency order.
pub fn prune_all<F: Feature + ?Sized>(feature: &F, graph: &mut FunctionGraph) -> GraphResult<()> {
    for node in graph.io_toposort()? {
        feature.on_prune(graph, node, DETACH_REASON)?;
    }
    Ok(())
}

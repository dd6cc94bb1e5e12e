//! Features: observers that react to graph edits.
//!
//! Every callback defaults to a no-op. A feature is notified for each edit
//! in the order features were attached.

pub mod bookkeeper;
mod diagnostics;
mod history;
mod inplace;
mod node_index;
mod replace;
mod validator;

use std::collections::BTreeMap;

use crate::error::GraphResult;
use crate::graph::{Consumer, FunctionGraph, NodeId, ValueId};

pub use diagnostics::{PreserveVariableAttributes, PrintListener};
pub use history::{ChangeLog, UndoRecord};
pub use inplace::NoOutputFromInplace;
pub use node_index::NodeIndex;
pub use replace::{ReplaceValidate, ReplaceValidateState};
pub use validator::Validator;

/// Observer protocol implemented by graph features.
pub trait Feature {
    fn name(&self) -> &'static str;

    /// Called by `attach_feature` once the graph is populated.
    ///
    /// Returning `AlreadyPresent` cancels the attach; the feature must not
    /// leave anything installed on the graph in that case.
    fn on_attach(&self, _graph: &mut FunctionGraph) -> GraphResult<()> {
        Ok(())
    }

    /// Called by `remove_feature`. Must remove every entry point the
    /// feature installed.
    fn on_detach(&self, _graph: &mut FunctionGraph) -> GraphResult<()> {
        Ok(())
    }

    /// Called just before `node` is connected into the graph.
    fn on_import(&self, _graph: &mut FunctionGraph, _node: NodeId, _reason: &str) -> GraphResult<()> {
        Ok(())
    }

    /// Called after `node` has been disconnected from the graph.
    fn on_prune(&self, _graph: &mut FunctionGraph, _node: NodeId, _reason: &str) -> GraphResult<()> {
        Ok(())
    }

    /// Called after input `position` of `consumer` changed from `old` to `new`.
    ///
    /// The edit has already happened. An error here leaves the graph mutated;
    /// only transactions revert it.
    fn on_change_input(
        &self,
        _graph: &mut FunctionGraph,
        _consumer: Consumer,
        _position: usize,
        _old: ValueId,
        _new: ValueId,
        _reason: &str,
    ) -> GraphResult<()> {
        Ok(())
    }

    /// Extra scheduling constraints: `node -> nodes that must run before it`.
    fn orderings(&self, _graph: &FunctionGraph) -> BTreeMap<NodeId, Vec<NodeId>> {
        BTreeMap::new()
    }

    /// This feature's contribution to `validate()`.
    fn validate(&self, _graph: &FunctionGraph) -> GraphResult<()> {
        Ok(())
    }

    /// Re-installs entry points after the graph's table was lost.
    fn restore(&self, _graph: &mut FunctionGraph) -> GraphResult<()> {
        Ok(())
    }
}

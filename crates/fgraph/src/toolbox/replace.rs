//! All-or-nothing edge rewrites.
//!
//! [`ReplaceValidate`] composes a [`ChangeLog`] and a [`Validator`]: every
//! transaction takes a checkpoint, applies its rewrites, validates, and
//! reverts to the checkpoint when anything along the way fails.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorClass, GraphError, GraphResult};
use crate::graph::entry::{self, Capability, Checkpoint, History, Transactions, Validation};
use crate::graph::{Consumer, FunctionGraph, GraphItem, NodeId, ValueId};

use super::history::{uninstall, HistoryLog, HISTORY_ENTRIES};
use super::validator::{ValidatorCore, VALIDATOR_ENTRIES};
use super::{ChangeLog, Feature, Validator};

const TRANSACTION_ENTRIES: [&str; 3] = [entry::REPLACE, entry::REPLACE_ALL, entry::REPLACE_ALL_REMOVE];

/// Serializable part of a [`ReplaceValidate`]. The undo log and the entry
/// points are not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceValidateState {
    pub nodes_removed: BTreeSet<GraphItem>,
    pub fail_validate: bool,
}

/// Transaction engine published under the `replace*` entry points.
pub(crate) struct Transactor {
    history: Rc<HistoryLog>,
    validator: Rc<ValidatorCore>,
    nodes_removed: RefCell<BTreeSet<GraphItem>>,
    fail_validate: Cell<bool>,
}

impl Transactor {
    fn revert_after_failure(&self, graph: &mut FunctionGraph, checkpoint: Checkpoint, reason: &str) {
        if let Err(err) = self.history.revert(graph, checkpoint) {
            tracing::error!(error = %err, reason, "failed to revert a rejected transaction");
        }
    }

    fn is_removed(&self, graph: &FunctionGraph, node: NodeId) -> bool {
        let removed = self.nodes_removed.borrow();
        if removed.contains(&GraphItem::Node(node)) {
            return true;
        }
        graph.node(node).is_some_and(|apply| {
            apply
                .outputs
                .iter()
                .any(|value| removed.contains(&GraphItem::Value(*value)))
        })
    }
}

impl Transactions for Transactor {
    fn replace_all(
        &self,
        graph: &mut FunctionGraph,
        pairs: &[(ValueId, ValueId)],
        reason: &str,
        verbose: Option<bool>,
    ) -> GraphResult<Checkpoint> {
        let verbose = verbose.unwrap_or(graph.config().optimizer_verbose);
        if let Some(&(old, _)) = pairs.iter().find(|(old, _)| !graph.contains_value(*old)) {
            return Err(GraphError::ForeignValue(old));
        }
        let checkpoint = self.history.checkpoint(graph);

        for &(old, new) in pairs {
            if !graph.contains_value(old) {
                // Pruned by an earlier pair of this transaction.
                continue;
            }
            let Err(err) = graph.replace_all_uses(old, new, reason) else {
                continue;
            };
            match err.class() {
                ErrorClass::Fatal => {
                    // Reverting would hit the same limit and hide this error.
                    tracing::error!(
                        error = %err,
                        reason,
                        "edit exhausted the import depth; raise FGRAPH_MAX_IMPORT_DEPTH to work around it"
                    );
                    return Err(err);
                }
                ErrorClass::Unexpected => {
                    tracing::error!(
                        error = %err,
                        reason,
                        old = %old,
                        new = %new,
                        "unexpected failure in replace-or-observer"
                    );
                }
                ErrorClass::Recoverable => {}
            }
            self.revert_after_failure(graph, checkpoint, reason);
            return Err(err);
        }

        if let Err(err) = self.validator.validate(graph, false) {
            self.revert_after_failure(graph, checkpoint, reason);
            if verbose {
                let value = pairs.last().map(|(old, _)| old.to_string()).unwrap_or_default();
                tracing::info!(value = %value, reason, error = %err, "validate failed on replacement");
            }
            return Err(err);
        }

        if verbose {
            tracing::info!(reason, ?pairs, "replacement applied");
        }
        Ok(checkpoint)
    }

    fn replace_all_remove(
        &self,
        graph: &mut FunctionGraph,
        pairs: &[(ValueId, ValueId)],
        remove: &[GraphItem],
        reason: &str,
        warn: bool,
    ) -> GraphResult<Checkpoint> {
        let checkpoint = self.replace_all(graph, pairs, reason, None)?;

        let remaining: Vec<GraphItem> = remove
            .iter()
            .copied()
            .filter(|item| graph.contains_item(*item))
            .collect();
        if !remaining.is_empty() {
            self.revert_after_failure(graph, checkpoint, reason);
            if warn {
                tracing::warn!(
                    reason,
                    ?pairs,
                    ?remaining,
                    "a rewrite wanted to remove values from the graph, but its replacement \
                     did not remove them; the rewrite was disabled"
                );
            }
            return Err(GraphError::ReplacementDidNotRemove {
                reason: reason.to_string(),
                remaining,
            });
        }

        self.nodes_removed.borrow_mut().extend(remove.iter().copied());
        Ok(checkpoint)
    }
}

/// Transactional rewrites: publishes `checkpoint`, `revert`, `validate`,
/// `consistent`, `replace`, `replace_all` and `replace_all_remove`.
///
/// Also guards against a rewrite putting back a node that an earlier
/// transaction removed: importing such a node makes the next `validate()`
/// fail once.
pub struct ReplaceValidate {
    change_log: ChangeLog,
    validator: Validator,
    tx: Rc<Transactor>,
}

impl ReplaceValidate {
    const NAME: &'static str = "ReplaceValidate";

    pub fn new() -> Self {
        Self::from_snapshot(ReplaceValidateState::default())
    }

    /// Rebuilds the feature from persisted state. Attach it (or call
    /// `FunctionGraph::restore_features`) to publish the entry points again.
    pub fn from_snapshot(state: ReplaceValidateState) -> Self {
        let change_log = ChangeLog::new();
        let validator = Validator::new();
        let tx = Rc::new(Transactor {
            history: change_log.log().clone(),
            validator: validator.core().clone(),
            nodes_removed: RefCell::new(state.nodes_removed),
            fail_validate: Cell::new(state.fail_validate),
        });
        Self {
            change_log,
            validator,
            tx,
        }
    }

    pub fn snapshot(&self) -> ReplaceValidateState {
        ReplaceValidateState {
            nodes_removed: self.tx.nodes_removed.borrow().clone(),
            fail_validate: self.tx.fail_validate.get(),
        }
    }

    pub fn nodes_removed(&self) -> Vec<GraphItem> {
        self.tx.nodes_removed.borrow().iter().copied().collect()
    }

    fn all_entries() -> impl Iterator<Item = &'static str> {
        HISTORY_ENTRIES
            .into_iter()
            .chain(VALIDATOR_ENTRIES)
            .chain(TRANSACTION_ENTRIES)
    }

    fn install_transactions(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        for name in TRANSACTION_ENTRIES {
            graph.install_entry(name, Capability::Transactions(self.tx.clone()))?;
        }
        Ok(())
    }
}

impl Default for ReplaceValidate {
    fn default() -> Self {
        Self::new()
    }
}

impl Feature for ReplaceValidate {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn on_attach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        if let Some(name) = Self::all_entries().find(|name| graph.has_entry(name)) {
            return Err(GraphError::AlreadyPresent(format!(
                "ReplaceValidate feature is already present or in conflict with another feature (`{name}`)"
            )));
        }
        self.change_log.on_attach(graph)?;
        if let Err(err) = self.validator.on_attach(graph) {
            self.change_log.on_detach(graph)?;
            return Err(err);
        }
        self.install_transactions(graph)
    }

    fn on_detach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        self.change_log.on_detach(graph)?;
        self.validator.on_detach(graph)?;
        uninstall(graph, &TRANSACTION_ENTRIES);
        self.tx.nodes_removed.borrow_mut().clear();
        self.tx.fail_validate.set(false);
        Ok(())
    }

    fn on_import(&self, graph: &mut FunctionGraph, node: NodeId, _reason: &str) -> GraphResult<()> {
        if self.tx.is_removed(graph, node) {
            self.tx.fail_validate.set(true);
        }
        Ok(())
    }

    fn on_change_input(
        &self,
        graph: &mut FunctionGraph,
        consumer: Consumer,
        position: usize,
        old: ValueId,
        new: ValueId,
        reason: &str,
    ) -> GraphResult<()> {
        self.change_log
            .on_change_input(graph, consumer, position, old, new, reason)
    }

    fn validate(&self, _graph: &FunctionGraph) -> GraphResult<()> {
        if self.tx.fail_validate.replace(false) {
            return Err(GraphError::Inconsistency(
                "Trying to reintroduce a removed node".to_string(),
            ));
        }
        Ok(())
    }

    fn restore(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        self.change_log.restore(graph)?;
        self.validator.restore(graph)?;
        uninstall(graph, &TRANSACTION_ENTRIES);
        self.install_transactions(graph)
    }
}

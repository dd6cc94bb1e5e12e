use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::{GraphError, GraphResult};
use crate::graph::entry::{self, Capability, Checkpoint, History};
use crate::graph::{Consumer, FunctionGraph, GraphId, ValueId};

use super::Feature;

pub(crate) const HISTORY_ENTRIES: [&str; 2] = [entry::CHECKPOINT, entry::REVERT];

/// One reversible edge rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    pub consumer: Consumer,
    pub position: usize,
    pub old: ValueId,
    pub new: ValueId,
    pub reason: String,
}

impl UndoRecord {
    /// Points the edge back at its previous value.
    pub fn apply(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        let reason = format!("Revert:{}", self.reason);
        graph.change_input(self.consumer, self.position, self.old, &reason)
    }
}

/// Undo log shared between a [`ChangeLog`] and the entry points it publishes.
///
/// Only the latest checkpoint can be reverted to: taking a checkpoint
/// discards the log.
pub(crate) struct HistoryLog {
    graph: Cell<Option<GraphId>>,
    /// `None` while a revert replays the log.
    log: RefCell<Option<Vec<UndoRecord>>>,
    issued: Cell<u64>,
}

impl HistoryLog {
    pub(crate) fn new() -> Self {
        Self {
            graph: Cell::new(None),
            log: RefCell::new(None),
            issued: Cell::new(0),
        }
    }

    pub(crate) fn bind(&self, graph: &FunctionGraph, feature: &'static str) -> GraphResult<()> {
        if self.graph.get().is_some() {
            return Err(GraphError::FeatureBusy(feature));
        }
        self.graph.set(Some(graph.id()));
        *self.log.borrow_mut() = Some(Vec::new());
        Ok(())
    }

    pub(crate) fn unbind(&self) {
        self.graph.set(None);
        *self.log.borrow_mut() = None;
    }

    pub(crate) fn serves(&self, graph: &FunctionGraph) -> bool {
        self.graph.get() == Some(graph.id())
    }

    pub(crate) fn record(&self, record: UndoRecord) {
        if let Some(log) = self.log.borrow_mut().as_mut() {
            log.push(record);
        }
    }

    pub(crate) fn records(&self) -> Vec<UndoRecord> {
        self.log.borrow().clone().unwrap_or_default()
    }

    pub(crate) fn last_issued(&self) -> Checkpoint {
        Checkpoint(self.issued.get())
    }
}

impl History for HistoryLog {
    fn checkpoint(&self, _graph: &mut FunctionGraph) -> Checkpoint {
        *self.log.borrow_mut() = Some(Vec::new());
        let next = self.issued.get() + 1;
        self.issued.set(next);
        Checkpoint(next)
    }

    fn revert(&self, graph: &mut FunctionGraph, checkpoint: Checkpoint) -> GraphResult<()> {
        assert_eq!(
            checkpoint,
            self.last_issued(),
            "only the most recent checkpoint can be reverted to"
        );
        let records = self.log.replace(None).unwrap_or_default();
        let mut result = Ok(());
        for record in records.iter().rev() {
            if let Err(err) = record.apply(graph) {
                result = Err(err);
                break;
            }
        }
        *self.log.borrow_mut() = Some(Vec::new());
        result
    }
}

pub(crate) fn install_history(graph: &mut FunctionGraph, log: &Rc<HistoryLog>) -> GraphResult<()> {
    for name in HISTORY_ENTRIES {
        graph.install_entry(name, Capability::History(log.clone()))?;
    }
    Ok(())
}

pub(crate) fn uninstall(graph: &mut FunctionGraph, names: &[&str]) {
    for name in names {
        graph.remove_entry(name);
    }
}

/// Records every edge rewrite so the graph can be reverted to the last
/// checkpoint. Publishes `checkpoint` and `revert`.
pub struct ChangeLog {
    log: Rc<HistoryLog>,
}

impl ChangeLog {
    const NAME: &'static str = "ChangeLog";

    pub fn new() -> Self {
        Self {
            log: Rc::new(HistoryLog::new()),
        }
    }

    /// Undo records logged since the last checkpoint, oldest first.
    pub fn records(&self) -> Vec<UndoRecord> {
        self.log.records()
    }

    pub(crate) fn log(&self) -> &Rc<HistoryLog> {
        &self.log
    }
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Feature for ChangeLog {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn on_attach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        if let Some(name) = graph.entries().first_conflict(&HISTORY_ENTRIES) {
            return Err(GraphError::AlreadyPresent(format!(
                "ChangeLog feature is already present or in conflict with another feature (`{name}`)"
            )));
        }
        self.log.bind(graph, Self::NAME)?;
        install_history(graph, &self.log)
    }

    fn on_detach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        if !self.log.serves(graph) {
            return Err(GraphError::NotAttached(Self::NAME));
        }
        uninstall(graph, &HISTORY_ENTRIES);
        self.log.unbind();
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
        self.log.record(UndoRecord {
            consumer,
            position,
            old,
            new,
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn restore(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        uninstall(graph, &HISTORY_ENTRIES);
        install_history(graph, &self.log)
    }
}

use std::rc::Rc;
use std::time::Instant;

use crate::error::{GraphError, GraphResult};
use crate::graph::entry::{self, Capability, Validation};
use crate::graph::FunctionGraph;

use super::history::uninstall;
use super::Feature;

pub(crate) const VALIDATOR_ENTRIES: [&str; 2] = [entry::VALIDATE, entry::CONSISTENT];

/// Runs the union of all features' consistency checks and times it.
pub(crate) struct ValidatorCore;

impl Validation for ValidatorCore {
    fn validate(&self, graph: &mut FunctionGraph, report: bool) -> GraphResult<()> {
        let start = Instant::now();
        if let Err(err) = graph.run_validators() {
            if report {
                tracing::warn!(graph = graph.id().0, error = %err, "validate failed");
            }
            return Err(err);
        }
        if let Some(profile) = graph.profile_mut() {
            profile.add_validate_time(start.elapsed());
        }
        Ok(())
    }
}

pub(crate) fn install_validator(graph: &mut FunctionGraph, core: &Rc<ValidatorCore>) -> GraphResult<()> {
    for name in VALIDATOR_ENTRIES {
        graph.install_entry(name, Capability::Validation(core.clone()))?;
    }
    Ok(())
}

/// Publishes `validate` and `consistent`.
pub struct Validator {
    core: Rc<ValidatorCore>,
}

impl Validator {
    const NAME: &'static str = "Validator";

    pub fn new() -> Self {
        Self {
            core: Rc::new(ValidatorCore),
        }
    }

    pub(crate) fn core(&self) -> &Rc<ValidatorCore> {
        &self.core
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Feature for Validator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn on_attach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        if let Some(name) = graph.entries().first_conflict(&VALIDATOR_ENTRIES) {
            return Err(GraphError::AlreadyPresent(format!(
                "Validator feature is already present or in conflict with another feature (`{name}`)"
            )));
        }
        install_validator(graph, &self.core)
    }

    fn on_detach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        uninstall(graph, &VALIDATOR_ENTRIES);
        Ok(())
    }

    fn restore(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        uninstall(graph, &VALIDATOR_ENTRIES);
        install_validator(graph, &self.core)
    }
}

//! Pass pipeline driving rewrites through the transactional entry points.

use std::collections::HashSet;
use std::rc::Rc;

use crate::error::{GraphError, GraphResult};
use crate::graph::{entry, FunctionGraph, NodeId};
use crate::passes::{IdentityEliminationPass, MergePass};
use crate::toolbox::ReplaceValidate;

#[derive(Debug, Clone)]
pub struct OptimizeConfig {
    pub max_iters: usize,
    pub log_stats: bool,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            max_iters: 4,
            log_stats: crate::env::optimizer_verbose(),
        }
    }
}

/// State shared by every pass during one `optimize` call.
#[derive(Debug, Default)]
pub struct OptimizeContext {
    cfg: OptimizeConfig,
    rejected: HashSet<(&'static str, NodeId)>,
}

impl OptimizeContext {
    pub fn new(cfg: OptimizeConfig) -> Self {
        Self {
            cfg,
            rejected: HashSet::new(),
        }
    }

    pub fn config(&self) -> &OptimizeConfig {
        &self.cfg
    }

    /// Whether `pass` already had a rewrite rooted at `node` rejected.
    pub fn is_rejected(&self, pass: &'static str, node: NodeId) -> bool {
        self.rejected.contains(&(pass, node))
    }

    pub fn record_rejected(&mut self, pass: &'static str, node: NodeId) {
        self.rejected.insert((pass, node));
    }
}

/// Result returned by a [`GraphPass`] after it runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassResult {
    /// Whether the pass changed the graph.
    pub changed: bool,
    /// Number of nodes visited.
    pub iterations: usize,
    /// Transactions committed.
    pub rewrites_applied: usize,
    /// Transactions that were rolled back.
    pub rejected: usize,
}

impl PassResult {
    /// Merges two run results, accumulating statistics.
    pub fn merge(self, other: PassResult) -> PassResult {
        PassResult {
            changed: self.changed || other.changed,
            iterations: self.iterations + other.iterations,
            rewrites_applied: self.rewrites_applied + other.rewrites_applied,
            rejected: self.rejected + other.rejected,
        }
    }
}

/// A rewrite rule applied to a whole graph.
pub trait GraphPass {
    fn name(&self) -> &'static str;

    /// Attaches the features the pass relies on.
    fn add_requirements(&self, _graph: &mut FunctionGraph) -> GraphResult<()> {
        Ok(())
    }

    fn run(&self, graph: &mut FunctionGraph, cx: &mut OptimizeContext) -> GraphResult<PassResult>;
}

pub enum Step {
    Pass(Rc<dyn GraphPass>),
    FixedPoint { max_iters: usize, steps: Vec<Step> },
}

#[derive(Default)]
pub struct PipelineBuilder {
    steps: Vec<Step>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn pass(&mut self, pass: Rc<dyn GraphPass>) {
        self.steps.push(Step::Pass(pass));
    }

    pub fn fixed_point<F>(&mut self, max_iters: usize, build: F)
    where
        F: FnOnce(&mut PipelineBuilder),
    {
        let mut inner = PipelineBuilder::new();
        build(&mut inner);
        self.steps.push(Step::FixedPoint {
            max_iters: max_iters.max(1),
            steps: inner.steps,
        });
    }

    pub fn finish(self) -> Vec<Step> {
        self.steps
    }
}

pub struct PipelineOptimizer {
    steps: Vec<Step>,
}

impl PipelineOptimizer {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Identity elimination and merging, repeated until nothing changes.
    pub fn default_pipeline(cfg: &OptimizeConfig) -> Self {
        let mut builder = PipelineBuilder::new();
        builder.fixed_point(cfg.max_iters, |p| {
            p.pass(Rc::new(IdentityEliminationPass));
            p.pass(Rc::new(MergePass));
        });
        Self::new(builder.finish())
    }

    pub fn optimize(&self, graph: &mut FunctionGraph, cx: &mut OptimizeContext) -> GraphResult<PassResult> {
        if !graph.has_entry(entry::REPLACE_ALL_REMOVE) {
            match graph.attach_feature(Rc::new(ReplaceValidate::new())) {
                Ok(()) => {}
                Err(err) if err.is_already_present() => {}
                Err(err) => return Err(err),
            }
            if !graph.has_entry(entry::REPLACE_ALL_REMOVE) {
                return Err(GraphError::MissingEntryPoint(entry::REPLACE_ALL_REMOVE));
            }
        }
        add_requirements(&self.steps, graph)?;

        let mut result = PassResult::default();
        run_steps(&self.steps, graph, cx, &mut result)?;
        Ok(result)
    }
}

fn add_requirements(steps: &[Step], graph: &mut FunctionGraph) -> GraphResult<()> {
    for step in steps {
        match step {
            Step::Pass(pass) => pass.add_requirements(graph)?,
            Step::FixedPoint { steps, .. } => add_requirements(steps, graph)?,
        }
    }
    Ok(())
}

fn run_steps(
    steps: &[Step],
    graph: &mut FunctionGraph,
    cx: &mut OptimizeContext,
    totals: &mut PassResult,
) -> GraphResult<bool> {
    let mut changed_any = false;
    for step in steps {
        match step {
            Step::Pass(pass) => {
                let stats = pass.run(graph, cx)?;
                changed_any |= stats.changed;
                *totals = totals.merge(stats);
                if cx.config().log_stats {
                    tracing::info!(
                        pass = pass.name(),
                        changed = stats.changed,
                        iterations = stats.iterations,
                        rewrites_applied = stats.rewrites_applied,
                        rejected = stats.rejected,
                        "optimizer pass stats"
                    );
                }
            }
            Step::FixedPoint { max_iters, steps } => {
                let mut iter = 0usize;
                loop {
                    if iter >= *max_iters {
                        break;
                    }
                    iter += 1;
                    let mut local = PassResult::default();
                    let changed = run_steps(steps, graph, cx, &mut local)?;
                    *totals = totals.merge(local);
                    changed_any |= changed;
                    if !changed {
                        break;
                    }
                }
            }
        }
    }
    Ok(changed_any)
}

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use fgraph::graph::entry;
use fgraph::toolbox::bookkeeper;
use fgraph::toolbox::ReplaceValidateState;
use fgraph::{
    ChangeLog, Feature, FunctionGraph, GraphBuilder, GraphConfig, GraphError, GraphItem,
    GraphResult, NoOutputFromInplace, NodeId, Op, PreserveVariableAttributes, PrintListener,
    ReplaceValidate, ValueId, ValueType, Validator,
};

#[test]
fn duplicate_replace_validate_leaves_graph_untouched() {
    let (mut graph, _, _) = chain(config());
    graph
        .attach_feature(Rc::new(ReplaceValidate::new()))
        .expect("attach first");
    let names: Vec<&str> = graph.entries().names().collect();

    let err = graph
        .attach_feature(Rc::new(ReplaceValidate::new()))
        .expect_err("second copy");
    assert!(err.is_already_present());
    assert_eq!(graph.entries().names().collect::<Vec<_>>(), names);
    assert_eq!(graph.features().len(), 1);
}

#[test]
fn conflicting_history_blocks_replace_validate_without_partial_install() {
    let (mut graph, _, _) = chain(config());
    graph
        .attach_feature(Rc::new(ChangeLog::new()))
        .expect("attach ChangeLog");

    let err = graph
        .attach_feature(Rc::new(ReplaceValidate::new()))
        .expect_err("checkpoint is taken");
    assert!(err.is_already_present());
    assert!(!graph.has_entry(entry::VALIDATE));
    assert!(!graph.has_entry(entry::REPLACE_ALL));
    assert!(graph.has_entry(entry::CHECKPOINT));
}

#[test]
fn duplicate_validator_is_rejected() {
    let (mut graph, _, _) = chain(config());
    graph
        .attach_feature(Rc::new(Validator::new()))
        .expect("attach Validator");
    let err = graph
        .attach_feature(Rc::new(Validator::new()))
        .expect_err("second Validator");
    assert!(err.is_already_present());
}

#[test]
fn attaching_the_same_instance_twice_is_a_no_op() {
    let (mut graph, _, _) = chain(config());
    let rv: Rc<dyn Feature> = Rc::new(ReplaceValidate::new());
    graph.attach_feature(rv.clone()).expect("attach");
    graph.attach_feature(rv).expect("re-attach");
    assert_eq!(graph.features().len(), 1);
}

#[test]
fn restore_reinstalls_entry_points_after_loss() {
    let (mut graph, x, out) = chain(config());
    graph
        .attach_feature(Rc::new(ReplaceValidate::new()))
        .expect("attach");
    graph
        .attach_feature(Rc::new(fgraph::NodeIndex::new()))
        .expect("attach index");

    graph.clear_entry_points();
    assert_eq!(
        graph.checkpoint(),
        Err(GraphError::MissingEntryPoint(entry::CHECKPOINT))
    );

    graph.restore_features().expect("restore");
    let b = graph.make_value(Op::new("abs"), vec![x], ty());
    graph.replace(out, b, "after restore").expect("replace works again");
    assert_eq!(graph.get_nodes(&Op::new("abs")).expect("query").len(), 1);
}

#[test]
fn replace_validate_state_round_trips_through_json() {
    let (mut graph, x, out) = chain(config());
    let rv = Rc::new(ReplaceValidate::new());
    graph.attach_feature(rv.clone()).expect("attach");
    let exp = graph.value(out).and_then(|v| v.owner).expect("owner").0;
    let b = graph.make_value(Op::new("abs"), vec![x], ty());
    graph
        .replace_all_remove(&[(out, b)], &[GraphItem::Node(exp)], "fold", false)
        .expect("fold");

    let state = rv.snapshot();
    let json = serde_json::to_string(&state).expect("serialize");
    let decoded: ReplaceValidateState = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, state);

    let restored = ReplaceValidate::from_snapshot(decoded);
    assert_eq!(restored.nodes_removed(), vec![GraphItem::Node(exp)]);
}

#[test]
fn diagnostic_observers_serialize() {
    let listener = PrintListener::new(false);
    let json = serde_json::to_string(&listener).expect("serialize listener");
    assert_eq!(serde_json::from_str::<PrintListener>(&json).expect("decode"), listener);

    let guard = NoOutputFromInplace::new(1, Some(3));
    let json = serde_json::to_string(&guard).expect("serialize guard");
    assert_eq!(serde_json::from_str::<NoOutputFromInplace>(&json).expect("decode"), guard);
}

#[test]
fn preserve_attributes_copies_name_and_nan_guard() {
    let mut b = GraphBuilder::new();
    let x = b.input(ty());
    let a = b.apply1(Op::new("neg"), vec![x], ty());
    b.name(a, "a");
    let out = b.apply1(Op::new("exp"), vec![a], ty());
    let mut graph = b.finish(vec![x], vec![out], config()).expect("build graph");
    graph.value_mut(a).expect("a").nan_guard = true;
    graph
        .attach_feature(Rc::new(PreserveVariableAttributes))
        .expect("attach");

    let replacement = graph.make_value(Op::new("abs"), vec![x], ty());
    graph.replace_all_uses(a, replacement, "rename").expect("replace");

    let var = graph.value(replacement).expect("replacement");
    assert_eq!(var.name.as_deref(), Some("a"));
    assert!(var.nan_guard);
}

#[test]
fn preserve_attributes_keeps_existing_name() {
    let (mut graph, x, out) = chain(config());
    graph
        .attach_feature(Rc::new(PreserveVariableAttributes))
        .expect("attach");
    let replacement = graph.make_value(Op::new("abs"), vec![x], ty());
    graph.value_mut(replacement).expect("value").name = Some("mine".to_string());
    graph.value_mut(out).expect("value").name = Some("theirs".to_string());

    graph.replace_all_uses(out, replacement, "keep").expect("replace");
    assert_eq!(
        graph.value(replacement).and_then(|v| v.name.as_deref()),
        Some("mine")
    );
}

#[test]
fn print_listener_observes_without_interfering() {
    let (mut graph, x, out) = chain(config());
    graph
        .attach_feature(Rc::new(PrintListener::default()))
        .expect("attach");
    let b = graph.make_value(Op::new("abs"), vec![x], ty());
    graph.replace_all_uses(out, b, "log me").expect("replace");
    graph.check_integrity().expect("integrity");
}

#[test]
fn bookkeeping_replays_nodes_in_dependency_order() {
    let (mut graph, _, out) = chain(config());
    let recorder = Rc::new(Recorder::default());
    graph.attach_feature(recorder.clone()).expect("attach");

    let exp = graph.value(out).and_then(|v| v.owner).expect("owner").0;
    let neg = graph.node(exp).and_then(|n| graph.value(n.inputs[0])).and_then(|v| v.owner).expect("owner").0;
    assert_eq!(
        *recorder.events.borrow(),
        vec![
            format!("import {neg} on_attach"),
            format!("import {exp} on_attach")
        ]
    );

    let feature: Rc<dyn Feature> = recorder.clone();
    graph.remove_feature(&feature).expect("detach");
    let events = recorder.events.borrow();
    assert_eq!(events[2], format!("prune {neg} Bookkeeper.detach"));
    assert_eq!(events[3], format!("prune {exp} Bookkeeper.detach"));
}

#[test]
fn edits_notify_import_before_prune_with_reason() {
    let (mut graph, x, out) = chain(config());
    let recorder = Rc::new(Recorder::default());
    graph.attach_feature(recorder.clone()).expect("attach");
    recorder.events.borrow_mut().clear();

    let b = graph.make_value(Op::new("abs"), vec![x], ty());
    let abs = graph.value(b).and_then(|v| v.owner).expect("owner").0;
    let exp = graph.value(out).and_then(|v| v.owner).expect("owner").0;
    graph.replace_all_uses(out, b, "swap").expect("replace");

    let events = recorder.events.borrow();
    assert_eq!(events[0], format!("import {abs} swap"));
    assert_eq!(events[1], format!("prune {exp} swap"));
    assert_eq!(events.last().map(String::as_str), Some("change output[0] swap"));
}

#[test]
fn toposort_honours_feature_orderings() {
    let mut b = GraphBuilder::new();
    let x = b.input(ty());
    let p = b.apply1(Op::new("neg"), vec![x], ty());
    let q = b.apply1(Op::new("abs"), vec![x], ty());
    let mut graph = b.finish(vec![x], vec![p, q], config()).expect("build graph");
    let pn = graph.value(p).and_then(|v| v.owner).expect("owner").0;
    let qn = graph.value(q).and_then(|v| v.owner).expect("owner").0;

    assert_eq!(graph.toposort().expect("toposort"), vec![pn, qn]);

    graph
        .attach_feature(Rc::new(Before(vec![(pn, qn)])))
        .expect("attach ordering");
    assert_eq!(graph.toposort().expect("toposort"), vec![qn, pn]);
    assert_eq!(graph.io_toposort().expect("io order"), vec![pn, qn]);

    graph
        .attach_feature(Rc::new(Before(vec![(qn, pn)])))
        .expect("attach conflicting ordering");
    assert!(matches!(graph.toposort(), Err(GraphError::Cycle(_))));
}

#[test]
fn validator_reports_inplace_outputs_and_profiles() {
    let mut cfg = config();
    cfg.profile = true;
    let mut b = GraphBuilder::new();
    let x = b.input(ty());
    let y = b.apply1(Op::new("neg_inplace").destroys(0, vec![0]), vec![x], ty());
    let out = b.apply1(Op::new("exp"), vec![y], ty());
    let mut graph = b.finish(vec![x], vec![out, y], cfg).expect("build graph");
    graph
        .attach_feature(Rc::new(Validator::new()))
        .expect("attach Validator");

    graph.validate().expect("no guard yet");
    assert_eq!(graph.profile().map(|p| p.validate_calls), Some(1));

    graph
        .attach_feature(Rc::new(NoOutputFromInplace::new(1, None)))
        .expect("attach guard");
    assert!(!graph.consistent().expect("consistent"));
    assert!(matches!(graph.validate(), Err(GraphError::Inconsistency(_))));
    assert_eq!(graph.profile().map(|p| p.validate_calls), Some(1));
}

#[test]
fn inplace_guard_respects_output_range() {
    let mut b = GraphBuilder::new();
    let x = b.input(ty());
    let y = b.apply1(Op::new("neg_inplace").destroys(0, vec![0]), vec![x], ty());
    let z = b.apply1(Op::new("exp"), vec![x], ty());
    let mut graph = b.finish(vec![x], vec![y, z], config()).expect("build graph");
    graph
        .attach_feature(Rc::new(Validator::new()))
        .expect("attach Validator");
    graph
        .attach_feature(Rc::new(NoOutputFromInplace::new(1, Some(2))))
        .expect("attach guard");
    graph.validate().expect("output 0 is outside the checked range");
}

#[test]
fn host_edit_errors_happen_before_mutation() {
    let mut b = GraphBuilder::new();
    let x = b.input(ty());
    let stray = b.input(ty());
    let a = b.apply1(Op::new("neg"), vec![x], ty());
    let mut graph = b.finish(vec![x], vec![a], config()).expect("build graph");
    let before = graph.snapshot();

    let orphan = graph.make_value(Op::new("abs"), vec![stray], ty());
    assert_eq!(
        graph.replace_all_uses(a, orphan, "orphan"),
        Err(GraphError::MissingInput(stray))
    );
    assert_eq!(graph.snapshot(), before);

    let detached = graph.make_value(Op::new("abs"), vec![x], ty());
    assert_eq!(
        graph.replace_all_uses(detached, a, "foreign"),
        Err(GraphError::ForeignValue(detached))
    );
    graph.check_integrity().expect("integrity");
}

#[test]
fn constants_join_and_leave_with_their_clients() {
    let mut b = GraphBuilder::new();
    let x = b.input(ty());
    let out = b.apply1(Op::new("neg"), vec![x], ty());
    let mut graph = b.finish(vec![x], vec![out], config()).expect("build graph");

    let c = graph.make_constant(ty());
    let sum = graph.make_value(Op::new("add"), vec![x, c], ty());
    graph.replace_all_uses(out, sum, "add const").expect("replace");
    assert!(graph.contains_value(c));

    let plain = graph.make_value(Op::new("abs"), vec![x], ty());
    graph.replace_all_uses(sum, plain, "drop const").expect("replace");
    assert!(!graph.contains_value(c));
    graph.check_integrity().expect("integrity");
}

/// Forces `after` to be scheduled after `before` for each pair.
struct Before(Vec<(NodeId, NodeId)>);

impl Feature for Before {
    fn name(&self) -> &'static str {
        "Before"
    }

    fn orderings(&self, _graph: &FunctionGraph) -> BTreeMap<NodeId, Vec<NodeId>> {
        let mut map: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (after, before) in &self.0 {
            map.entry(*after).or_default().push(*before);
        }
        map
    }
}

#[derive(Default)]
struct Recorder {
    events: RefCell<Vec<String>>,
}

impl Feature for Recorder {
    fn name(&self) -> &'static str {
        "Recorder"
    }

    fn on_attach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        bookkeeper::import_all(self, graph)
    }

    fn on_detach(&self, graph: &mut FunctionGraph) -> GraphResult<()> {
        bookkeeper::prune_all(self, graph)
    }

    fn on_import(&self, _graph: &mut FunctionGraph, node: NodeId, reason: &str) -> GraphResult<()> {
        self.events.borrow_mut().push(format!("import {node} {reason}"));
        Ok(())
    }

    fn on_prune(&self, _graph: &mut FunctionGraph, node: NodeId, reason: &str) -> GraphResult<()> {
        self.events.borrow_mut().push(format!("prune {node} {reason}"));
        Ok(())
    }

    fn on_change_input(
        &self,
        _graph: &mut FunctionGraph,
        consumer: fgraph::Consumer,
        position: usize,
        _old: ValueId,
        _new: ValueId,
        reason: &str,
    ) -> GraphResult<()> {
        self.events
            .borrow_mut()
            .push(format!("change {consumer}[{position}] {reason}"));
        Ok(())
    }
}

/// `exp(neg(x))`
fn chain(cfg: GraphConfig) -> (FunctionGraph, ValueId, ValueId) {
    let mut b = GraphBuilder::new();
    let x = b.input(ty());
    let a = b.apply1(Op::new("neg"), vec![x], ty());
    let out = b.apply1(Op::new("exp"), vec![a], ty());
    let graph = b.finish(vec![x], vec![out], cfg).expect("build graph");
    (graph, x, out)
}

fn ty() -> ValueType {
    ValueType::new("f32", 1)
}

fn config() -> GraphConfig {
    GraphConfig {
        optimizer_verbose: false,
        max_import_depth: 64,
        profile: false,
    }
}

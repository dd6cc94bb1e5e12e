//! Property tests for the history and transaction guarantees.

use std::rc::Rc;

use fgraph::{
    ChangeLog, FunctionGraph, GraphBuilder, GraphConfig, GraphError, NoOutputFromInplace, Op,
    ReplaceValidate, ValueId, ValueType,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

/// `(target index, replacement depth)` pairs.
fn arb_edits() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0usize..16, 1usize..4), 0..8)
}

/// A chain `neg^len(x)` whose last value is the only output.
fn chain(len: usize) -> (FunctionGraph, ValueId, Vec<ValueId>) {
    let mut b = GraphBuilder::new();
    let x = b.input(ty());
    let mut values = Vec::with_capacity(len);
    let mut prev = x;
    for _ in 0..len {
        prev = b.apply1(Op::new("neg"), vec![prev], ty());
        values.push(prev);
    }
    let graph = b
        .finish(vec![x], vec![prev], config())
        .expect("build graph");
    (graph, x, values)
}

/// Builds a detached `abs^depth(x)`.
fn fresh(graph: &mut FunctionGraph, x: ValueId, depth: usize) -> ValueId {
    let mut value = x;
    for _ in 0..depth {
        value = graph.make_value(Op::new("abs"), vec![value], ty());
    }
    value
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

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn revert_undoes_any_edit_sequence(len in 1usize..8, edits in arb_edits()) {
        let (mut graph, x, values) = chain(len);
        graph.attach_feature(Rc::new(ChangeLog::new())).expect("attach ChangeLog");
        let before = graph.snapshot();

        let checkpoint = graph.checkpoint().expect("checkpoint");
        for (target, depth) in edits {
            let old = values[target % values.len()];
            if !graph.contains_value(old) {
                continue;
            }
            let new = fresh(&mut graph, x, depth);
            graph.replace_all_uses(old, new, "edit").expect("edit");
        }
        graph.revert(checkpoint).expect("revert");

        prop_assert_eq!(graph.snapshot(), before);
        prop_assert!(graph.check_integrity().is_ok());
    }

    #[test]
    fn committed_transaction_can_be_undone(len in 1usize..8, edits in arb_edits()) {
        let (mut graph, x, values) = chain(len);
        graph.attach_feature(Rc::new(ReplaceValidate::new())).expect("attach ReplaceValidate");
        let before = graph.snapshot();

        let pairs: Vec<(ValueId, ValueId)> = edits
            .into_iter()
            .map(|(target, depth)| (values[target % values.len()], fresh(&mut graph, x, depth)))
            .collect();
        let checkpoint = graph.replace_all(&pairs, "batch", None).expect("replace_all");
        prop_assert!(graph.check_integrity().is_ok());

        graph.revert(checkpoint).expect("revert");
        prop_assert_eq!(graph.snapshot(), before);
    }

    #[test]
    fn failed_transaction_leaves_no_trace(len in 2usize..8, edits in arb_edits()) {
        let (mut graph, x, values) = chain(len);
        graph.attach_feature(Rc::new(ReplaceValidate::new())).expect("attach ReplaceValidate");
        graph
            .attach_feature(Rc::new(NoOutputFromInplace::new(0, Some(1))))
            .expect("attach guard");
        let before = graph.snapshot();

        let interior = &values[..values.len() - 1];
        let mut pairs: Vec<(ValueId, ValueId)> = edits
            .into_iter()
            .map(|(target, depth)| (interior[target % interior.len()], fresh(&mut graph, x, depth)))
            .collect();
        let output = graph.outputs()[0];
        let inplace = graph.make_value(Op::new("neg_inplace").destroys(0, vec![0]), vec![x], ty());
        pairs.push((output, inplace));

        let result = graph.replace_all(&pairs, "doomed", None);
        prop_assert!(matches!(result, Err(GraphError::Inconsistency(_))));
        prop_assert_eq!(graph.snapshot(), before);
        prop_assert!(graph.check_integrity().is_ok());
    }
}

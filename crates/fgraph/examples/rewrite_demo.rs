//! Builds a small graph, watches it with a `PrintListener`, and runs the
//! default optimization pipeline.
//!
//! `RUST_LOG=debug cargo run -p fgraph --example rewrite_demo`

use std::rc::Rc;

use anyhow::Context;
use fgraph::{
    GraphBuilder, GraphConfig, GraphItem, NoOutputFromInplace, Op, OptimizeConfig,
    OptimizeContext, PipelineOptimizer, PrintListener, ReplaceValidate, ValueType,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let ty = ValueType::new("f32", 2);
    let mut b = GraphBuilder::new();
    let x = b.named_input("x", ty.clone());
    let id = b.apply1(Op::new("identity"), vec![x], ty.clone());
    let a1 = b.apply1(Op::new("tanh"), vec![id], ty.clone());
    let a2 = b.apply1(Op::new("tanh"), vec![x], ty.clone());
    let sum = b.apply1(Op::new("add"), vec![a1, a2], ty.clone());
    b.name(sum, "sum");
    let mut graph = b
        .finish(vec![x], vec![sum], GraphConfig::default())
        .context("failed to build the demo graph")?;

    graph.attach_feature(Rc::new(ReplaceValidate::new()))?;
    graph.attach_feature(Rc::new(NoOutputFromInplace::new(0, None)))?;
    graph.attach_feature(Rc::new(PrintListener::default()))?;

    // A rewrite that would make the output in-place is rolled back.
    let inplace = graph.make_value(
        Op::new("add_inplace").destroys(0, vec![0]),
        vec![a1, a2],
        ty.clone(),
    );
    let sum_node = graph
        .value(sum)
        .and_then(|var| var.owner)
        .map(|(node, _)| node)
        .context("sum has no producer")?;
    match graph.replace_all_remove(&[(sum, inplace)], &[GraphItem::Node(sum_node)], "inplace_add", true) {
        Ok(_) => tracing::warn!("in-place rewrite was unexpectedly accepted"),
        Err(err) => tracing::info!(error = %err, "in-place rewrite rejected"),
    }

    let cfg = OptimizeConfig {
        max_iters: 4,
        log_stats: true,
    };
    let optimizer = PipelineOptimizer::default_pipeline(&cfg);
    let mut cx = OptimizeContext::new(cfg);
    let stats = optimizer.optimize(&mut graph, &mut cx)?;
    tracing::info!(
        rewrites = stats.rewrites_applied,
        rejected = stats.rejected,
        nodes = graph.apply_nodes().count(),
        "optimization finished"
    );

    graph.check_integrity()?;
    for node in graph.toposort()? {
        if let Some(apply) = graph.node(node) {
            println!("{node}: {} {:?} -> {:?}", apply.op, apply.inputs, apply.outputs);
        }
    }
    Ok(())
}

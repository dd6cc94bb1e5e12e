//! Transactional rewriting of dataflow graphs.
//!
//! A [`FunctionGraph`] notifies attached [`Feature`]s of every structural
//! edit. Features published by the [`toolbox`] add undo history, validation,
//! all-or-nothing replacement transactions and an op-to-node index, and the
//! [`pipeline`] runs [`passes`] on top of them.

mod env;
pub mod error;
pub mod graph;
pub mod passes;
pub mod pipeline;
pub mod toolbox;

pub use error::{ErrorClass, GraphError, GraphResult};
pub use graph::{
    Checkpoint, Consumer, FunctionGraph, GraphBuilder, GraphConfig, GraphItem, NodeId, Op, OpAttr,
    ValueId, ValueType,
};
pub use pipeline::{
    GraphPass, OptimizeConfig, OptimizeContext, PassResult, PipelineBuilder, PipelineOptimizer,
};
pub use toolbox::{
    ChangeLog, Feature, NoOutputFromInplace, NodeIndex, PreserveVariableAttributes, PrintListener,
    ReplaceValidate, Validator,
};

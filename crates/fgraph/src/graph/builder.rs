use crate::error::GraphResult;
use crate::graph::{FunctionGraph, GraphConfig, NodeId, Op, ValueId, ValueType};

/// A value in the arena. Whether it is part of a graph is decided by the
/// graph's membership sets, not by the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub id: ValueId,
    pub ty: ValueType,
    /// Producing node and output index; `None` for inputs and constants.
    pub owner: Option<(NodeId, usize)>,
    pub name: Option<String>,
    /// Marks values checked for NaNs by guarded execution modes.
    pub nan_guard: bool,
    pub constant: bool,
}

/// An operation applied to input values, producing output values.
#[derive(Debug, Clone, PartialEq)]
pub struct Apply {
    pub id: NodeId,
    pub op: Op,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
}

/// Append-only storage for every value and node ever built.
///
/// Nodes pruned from a graph stay here so a revert can reconnect them.
#[derive(Debug, Default, Clone)]
pub struct Arena {
    values: Vec<Variable>,
    nodes: Vec<Apply>,
}

impl Arena {
    pub fn value(&self, id: ValueId) -> Option<&Variable> {
        self.values.get(id.0 as usize)
    }

    pub fn value_mut(&mut self, id: ValueId) -> Option<&mut Variable> {
        self.values.get_mut(id.0 as usize)
    }

    pub fn node(&self, id: NodeId) -> Option<&Apply> {
        self.nodes.get(id.0 as usize)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Apply> {
        self.nodes.get_mut(id.0 as usize)
    }

    fn push_value(&mut self, ty: ValueType, owner: Option<(NodeId, usize)>, constant: bool) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Variable {
            id,
            ty,
            owner,
            name: None,
            nan_guard: false,
            constant,
        });
        id
    }

    pub fn input(&mut self, ty: ValueType) -> ValueId {
        self.push_value(ty, None, false)
    }

    pub fn constant(&mut self, ty: ValueType) -> ValueId {
        self.push_value(ty, None, true)
    }

    /// Creates a detached node applying `op` to `inputs`.
    pub fn apply(&mut self, op: Op, inputs: Vec<ValueId>, output_types: Vec<ValueType>) -> NodeId {
        let node = NodeId(self.nodes.len() as u32);
        let outputs = output_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.push_value(ty, Some((node, index)), false))
            .collect();
        self.nodes.push(Apply {
            id: node,
            op,
            inputs,
            outputs,
        });
        node
    }

    /// Creates a detached single-output node and returns its output.
    pub fn apply1(&mut self, op: Op, inputs: Vec<ValueId>, output: ValueType) -> ValueId {
        let node = NodeId(self.nodes.len() as u32);
        let value = self.push_value(output, Some((node, 0)), false);
        self.nodes.push(Apply {
            id: node,
            op,
            inputs,
            outputs: vec![value],
        });
        value
    }
}

/// Builds the initial contents of a [`FunctionGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    arena: Arena,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&mut self, ty: ValueType) -> ValueId {
        self.arena.input(ty)
    }

    pub fn named_input(&mut self, name: &str, ty: ValueType) -> ValueId {
        let value = self.arena.input(ty);
        self.name(value, name);
        value
    }

    pub fn constant(&mut self, ty: ValueType) -> ValueId {
        self.arena.constant(ty)
    }

    pub fn apply(&mut self, op: Op, inputs: Vec<ValueId>, output_types: Vec<ValueType>) -> NodeId {
        self.arena.apply(op, inputs, output_types)
    }

    /// Applies a single-output op and returns its output value.
    pub fn apply1(&mut self, op: Op, inputs: Vec<ValueId>, output: ValueType) -> ValueId {
        self.arena.apply1(op, inputs, output)
    }

    pub fn name(&mut self, value: ValueId, name: &str) {
        if let Some(var) = self.arena.value_mut(value) {
            var.name = Some(name.to_string());
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn finish(
        self,
        inputs: Vec<ValueId>,
        outputs: Vec<ValueId>,
        config: GraphConfig,
    ) -> GraphResult<FunctionGraph> {
        FunctionGraph::new(self.arena, inputs, outputs, config)
    }
}

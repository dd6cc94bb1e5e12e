//! Mutable dataflow graph with observer notification.
//!
//! A [`FunctionGraph`] owns an [`Arena`] holding every node and value ever
//! built, plus membership sets describing which of them currently form the
//! graph. All structural edits go through three primitives:
//!
//! * import: a node becomes reachable and is connected (`on_import`),
//! * prune: a node lost its last client and is disconnected (`on_prune`),
//! * change input: one edge is repointed (`on_change_input`).
//!
//! Features are notified in registration order. Entry points published by
//! features live in the graph's [`EntryPoints`] table.

mod builder;
pub mod entry;
mod ids;
mod op;
mod profile;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::{GraphError, GraphResult};
use crate::toolbox::Feature;

pub use builder::{Apply, Arena, GraphBuilder, Variable};
pub use entry::{Capability, Checkpoint, EntryPoints};
pub use ids::{Client, Consumer, GraphId, GraphItem, NodeId, ValueId};
pub use op::{AttrKey, Op, OpAttr, OpKey, ValueType};
pub use profile::GraphProfile;

/// Graph-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Default verbosity of transactions and direct `validate()` calls.
    pub optimizer_verbose: bool,
    /// Longest producer chain a single import may pull in.
    pub max_import_depth: usize,
    /// Starts the graph with a [`GraphProfile`] sink.
    pub profile: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            optimizer_verbose: crate::env::optimizer_verbose(),
            max_import_depth: crate::env::max_import_depth(),
            profile: crate::env::profile_enabled(),
        }
    }
}

/// Edge topology of the nodes currently in a graph, for comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSnapshot {
    pub node_inputs: BTreeMap<NodeId, Vec<ValueId>>,
    pub outputs: Vec<ValueId>,
}

type ClientList = SmallVec<[Client; 4]>;

pub struct FunctionGraph {
    id: GraphId,
    config: GraphConfig,
    arena: Arena,
    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
    apply_nodes: BTreeSet<NodeId>,
    variables: BTreeSet<ValueId>,
    clients: HashMap<ValueId, ClientList>,
    features: Vec<Rc<dyn Feature>>,
    entries: EntryPoints,
    profile: Option<GraphProfile>,
}

impl FunctionGraph {
    /// Creates a graph over `arena` and imports everything the outputs reach.
    pub fn new(
        arena: Arena,
        inputs: Vec<ValueId>,
        outputs: Vec<ValueId>,
        config: GraphConfig,
    ) -> GraphResult<Self> {
        let profile = config.profile.then(GraphProfile::default);
        let mut graph = FunctionGraph {
            id: GraphId::fresh(),
            config,
            arena,
            inputs: Vec::with_capacity(inputs.len()),
            outputs: Vec::with_capacity(outputs.len()),
            apply_nodes: BTreeSet::new(),
            variables: BTreeSet::new(),
            clients: HashMap::new(),
            features: Vec::new(),
            entries: EntryPoints::default(),
            profile,
        };

        for input in inputs {
            let var = graph
                .arena
                .value(input)
                .ok_or(GraphError::ForeignValue(input))?;
            if var.owner.is_some() {
                return Err(GraphError::Inconsistency(format!(
                    "graph input {input} is produced by a node"
                )));
            }
            graph.inputs.push(input);
            graph.variables.insert(input);
        }

        for (position, output) in outputs.into_iter().enumerate() {
            let order = graph.plan_import(output)?;
            graph.commit_import(output, &order, "init")?;
            graph.outputs.push(output);
            graph.add_client(
                output,
                Client {
                    consumer: Consumer::Output,
                    position,
                },
            );
        }

        Ok(graph)
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut GraphConfig {
        &mut self.config
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    pub fn apply_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.apply_nodes.iter().copied()
    }

    pub fn variables(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.variables.iter().copied()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.apply_nodes.contains(&node)
    }

    pub fn contains_value(&self, value: ValueId) -> bool {
        self.variables.contains(&value)
    }

    pub fn contains_item(&self, item: GraphItem) -> bool {
        match item {
            GraphItem::Node(node) => self.contains_node(node),
            GraphItem::Value(value) => self.contains_value(value),
        }
    }

    /// Returns the arena node, whether or not it is currently in the graph.
    pub fn node(&self, node: NodeId) -> Option<&Apply> {
        self.arena.node(node)
    }

    /// Returns the arena value, whether or not it is currently in the graph.
    pub fn value(&self, value: ValueId) -> Option<&Variable> {
        self.arena.value(value)
    }

    pub fn value_mut(&mut self, value: ValueId) -> Option<&mut Variable> {
        self.arena.value_mut(value)
    }

    pub fn clients(&self, value: ValueId) -> &[Client] {
        self.clients
            .get(&value)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// Builds a detached node. It joins the graph once an edit makes it reachable.
    pub fn make_node(&mut self, op: Op, inputs: Vec<ValueId>, output_types: Vec<ValueType>) -> NodeId {
        self.arena.apply(op, inputs, output_types)
    }

    /// Builds a detached single-output node and returns its output.
    pub fn make_value(&mut self, op: Op, inputs: Vec<ValueId>, output: ValueType) -> ValueId {
        self.arena.apply1(op, inputs, output)
    }

    pub fn make_constant(&mut self, ty: ValueType) -> ValueId {
        self.arena.constant(ty)
    }

    pub fn snapshot(&self) -> EdgeSnapshot {
        let node_inputs = self
            .apply_nodes
            .iter()
            .filter_map(|node| self.arena.node(*node).map(|apply| (*node, apply.inputs.clone())))
            .collect();
        EdgeSnapshot {
            node_inputs,
            outputs: self.outputs.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // Profiling
    // ---------------------------------------------------------------------

    pub fn profile(&self) -> Option<&GraphProfile> {
        self.profile.as_ref()
    }

    pub fn profile_mut(&mut self) -> Option<&mut GraphProfile> {
        self.profile.as_mut()
    }

    pub fn enable_profile(&mut self) {
        self.profile.get_or_insert_with(GraphProfile::default);
    }

    // ---------------------------------------------------------------------
    // Features
    // ---------------------------------------------------------------------

    pub fn features(&self) -> &[Rc<dyn Feature>] {
        &self.features
    }

    pub fn has_feature(&self, feature: &Rc<dyn Feature>) -> bool {
        self.features.iter().any(|f| same_feature(f, feature))
    }

    /// Attaches `feature`. Re-attaching the same instance is a no-op.
    ///
    /// `AlreadyPresent` from the feature's `on_attach` is propagated and the
    /// feature is not registered; callers usually treat it as benign.
    pub fn attach_feature(&mut self, feature: Rc<dyn Feature>) -> GraphResult<()> {
        if self.has_feature(&feature) {
            return Ok(());
        }
        feature.on_attach(self)?;
        tracing::debug!(graph = self.id.0, feature = feature.name(), "attached feature");
        self.features.push(feature);
        Ok(())
    }

    /// Detaches `feature`, returning whether it was attached.
    pub fn remove_feature(&mut self, feature: &Rc<dyn Feature>) -> GraphResult<bool> {
        let Some(pos) = self.features.iter().position(|f| same_feature(f, feature)) else {
            return Ok(false);
        };
        let feature = self.features.remove(pos);
        feature.on_detach(self)?;
        tracing::debug!(graph = self.id.0, feature = feature.name(), "detached feature");
        Ok(true)
    }

    /// Re-installs entry points after the graph lost them (deserialization).
    pub fn restore_features(&mut self) -> GraphResult<()> {
        for feature in self.features.clone() {
            feature.restore(self)?;
        }
        Ok(())
    }

    /// Runs every consistency check contributed by the attached features.
    pub fn run_validators(&self) -> GraphResult<()> {
        for feature in &self.features {
            feature.validate(self)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Entry points
    // ---------------------------------------------------------------------

    pub fn entries(&self) -> &EntryPoints {
        &self.entries
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    pub fn install_entry(&mut self, name: &'static str, capability: Capability) -> GraphResult<()> {
        self.entries.install(name, capability)
    }

    pub fn remove_entry(&mut self, name: &str) -> Option<Capability> {
        self.entries.remove(name)
    }

    /// Drops every entry point, as happens when a graph is deserialized.
    pub fn clear_entry_points(&mut self) {
        self.entries.clear();
    }

    fn capability(&self, name: &'static str) -> GraphResult<Capability> {
        self.entries
            .get(name)
            .cloned()
            .ok_or(GraphError::MissingEntryPoint(name))
    }

    pub fn checkpoint(&mut self) -> GraphResult<Checkpoint> {
        match self.capability(entry::CHECKPOINT)? {
            Capability::History(history) => Ok(history.checkpoint(self)),
            _ => Err(GraphError::MissingEntryPoint(entry::CHECKPOINT)),
        }
    }

    pub fn revert(&mut self, checkpoint: Checkpoint) -> GraphResult<()> {
        match self.capability(entry::REVERT)? {
            Capability::History(history) => history.revert(self, checkpoint),
            _ => Err(GraphError::MissingEntryPoint(entry::REVERT)),
        }
    }

    /// Validates the graph; reports failures when `optimizer_verbose` is set.
    pub fn validate(&mut self) -> GraphResult<()> {
        let report = self.config.optimizer_verbose;
        match self.capability(entry::VALIDATE)? {
            Capability::Validation(validation) => validation.validate(self, report),
            _ => Err(GraphError::MissingEntryPoint(entry::VALIDATE)),
        }
    }

    pub fn consistent(&mut self) -> GraphResult<bool> {
        match self.capability(entry::CONSISTENT)? {
            Capability::Validation(validation) => Ok(validation.consistent(self)),
            _ => Err(GraphError::MissingEntryPoint(entry::CONSISTENT)),
        }
    }

    pub fn replace(&mut self, old: ValueId, new: ValueId, reason: &str) -> GraphResult<Checkpoint> {
        match self.capability(entry::REPLACE)? {
            Capability::Transactions(tx) => tx.replace_all(self, &[(old, new)], reason, None),
            _ => Err(GraphError::MissingEntryPoint(entry::REPLACE)),
        }
    }

    pub fn replace_all(
        &mut self,
        pairs: &[(ValueId, ValueId)],
        reason: &str,
        verbose: Option<bool>,
    ) -> GraphResult<Checkpoint> {
        match self.capability(entry::REPLACE_ALL)? {
            Capability::Transactions(tx) => tx.replace_all(self, pairs, reason, verbose),
            _ => Err(GraphError::MissingEntryPoint(entry::REPLACE_ALL)),
        }
    }

    pub fn replace_all_remove(
        &mut self,
        pairs: &[(ValueId, ValueId)],
        remove: &[GraphItem],
        reason: &str,
        warn: bool,
    ) -> GraphResult<Checkpoint> {
        match self.capability(entry::REPLACE_ALL_REMOVE)? {
            Capability::Transactions(tx) => tx.replace_all_remove(self, pairs, remove, reason, warn),
            _ => Err(GraphError::MissingEntryPoint(entry::REPLACE_ALL_REMOVE)),
        }
    }

    pub fn get_nodes(&self, op: &Op) -> GraphResult<Vec<NodeId>> {
        match self.capability(entry::GET_NODES)? {
            Capability::NodeQuery(index) => index.query(self, op),
            _ => Err(GraphError::MissingEntryPoint(entry::GET_NODES)),
        }
    }

    // ---------------------------------------------------------------------
    // Edit primitives
    // ---------------------------------------------------------------------

    /// Repoints input `position` of `consumer` to `new`.
    ///
    /// Validation errors are raised before anything changes, including `Cycle`
    /// when `new` depends on `consumer`. Once the edge is rewritten, observer
    /// failures propagate with the graph already mutated.
    pub fn change_input(
        &mut self,
        consumer: Consumer,
        position: usize,
        new: ValueId,
        reason: &str,
    ) -> GraphResult<()> {
        let old = self.input_at(consumer, position)?;
        self.check_same_type(old, new)?;
        if old == new {
            return Ok(());
        }

        let order = self.plan_import(new)?;
        if let Consumer::Node(node) = consumer {
            self.check_acyclic(node, new)?;
        }
        self.commit_import(new, &order, reason)?;

        match consumer {
            Consumer::Output => self.outputs[position] = new,
            Consumer::Node(node) => {
                let apply = self
                    .arena
                    .node_mut(node)
                    .ok_or(GraphError::ForeignNode(node))?;
                apply.inputs[position] = new;
            }
        }
        let client = Client { consumer, position };
        self.add_client(new, client);
        self.remove_client(old, client, reason)?;

        for feature in self.features.clone() {
            feature.on_change_input(self, consumer, position, old, new, reason)?;
        }
        Ok(())
    }

    /// Repoints every client of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId, reason: &str) -> GraphResult<()> {
        if !self.variables.contains(&old) {
            return Err(GraphError::ForeignValue(old));
        }
        self.check_same_type(old, new)?;
        let clients: Vec<Client> = self.clients(old).to_vec();
        for client in clients {
            self.change_input(client.consumer, client.position, new, reason)?;
        }
        Ok(())
    }

    fn input_at(&self, consumer: Consumer, position: usize) -> GraphResult<ValueId> {
        let value = match consumer {
            Consumer::Output => self.outputs.get(position).copied(),
            Consumer::Node(node) => {
                if !self.apply_nodes.contains(&node) {
                    return Err(GraphError::ForeignNode(node));
                }
                self.arena
                    .node(node)
                    .and_then(|apply| apply.inputs.get(position).copied())
            }
        };
        value.ok_or_else(|| {
            GraphError::Inconsistency(format!("{consumer} has no input at position {position}"))
        })
    }

    fn check_same_type(&self, old: ValueId, new: ValueId) -> GraphResult<()> {
        let old_var = self.arena.value(old).ok_or(GraphError::ForeignValue(old))?;
        let new_var = self.arena.value(new).ok_or(GraphError::ForeignValue(new))?;
        if old_var.ty != new_var.ty {
            return Err(GraphError::TypeMismatch {
                expected: old_var.ty.clone(),
                found: new_var.ty.clone(),
            });
        }
        Ok(())
    }

    fn add_client(&mut self, value: ValueId, client: Client) {
        self.clients.entry(value).or_default().push(client);
    }

    /// Fails with `Cycle` when `node` produces something `value` depends on.
    ///
    /// Walks arena inputs, which is what an import of `value` would connect.
    fn check_acyclic(&self, node: NodeId, value: ValueId) -> GraphResult<()> {
        let mut seen = HashSet::new();
        let mut work = vec![value];
        while let Some(value) = work.pop() {
            let Some((producer, _)) = self.arena.value(value).and_then(|var| var.owner) else {
                continue;
            };
            if producer == node {
                return Err(GraphError::Cycle(node));
            }
            if !seen.insert(producer) {
                continue;
            }
            if let Some(apply) = self.arena.node(producer) {
                work.extend(apply.inputs.iter().copied());
            }
        }
        Ok(())
    }

    /// Returns the producer of `value` that still has to be imported, if any.
    fn pending_producer(&self, value: ValueId, seen: &HashSet<NodeId>) -> GraphResult<Option<NodeId>> {
        if self.variables.contains(&value) {
            return Ok(None);
        }
        let var = self.arena.value(value).ok_or(GraphError::ForeignValue(value))?;
        match var.owner {
            None if var.constant => Ok(None),
            None => Err(GraphError::MissingInput(value)),
            Some((node, _)) if self.apply_nodes.contains(&node) || seen.contains(&node) => Ok(None),
            Some((node, _)) => Ok(Some(node)),
        }
    }

    /// Lists the nodes `value` needs imported, producers first, without
    /// touching the graph.
    fn plan_import(&self, value: ValueId) -> GraphResult<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let Some(root) = self.pending_producer(value, &seen)? else {
            return Ok(order);
        };
        let limit = self.config.max_import_depth;
        if limit == 0 {
            return Err(GraphError::DepthExhausted { limit, value });
        }
        seen.insert(root);
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            let apply = self.arena.node(node).ok_or(GraphError::ForeignNode(node))?;
            if next < apply.inputs.len() {
                top.1 += 1;
                let input = apply.inputs[next];
                if let Some(producer) = self.pending_producer(input, &seen)? {
                    if stack.len() >= limit {
                        return Err(GraphError::DepthExhausted { limit, value: input });
                    }
                    seen.insert(producer);
                    stack.push((producer, 0));
                }
            } else {
                order.push(node);
                stack.pop();
            }
        }
        Ok(order)
    }

    fn commit_import(&mut self, value: ValueId, order: &[NodeId], reason: &str) -> GraphResult<()> {
        for &node in order {
            for feature in self.features.clone() {
                feature.on_import(self, node, reason)?;
            }
            let apply = self
                .arena
                .node(node)
                .cloned()
                .ok_or(GraphError::ForeignNode(node))?;
            self.apply_nodes.insert(node);
            for output in &apply.outputs {
                self.variables.insert(*output);
            }
            for (position, input) in apply.inputs.iter().enumerate() {
                self.variables.insert(*input);
                self.add_client(
                    *input,
                    Client {
                        consumer: Consumer::Node(node),
                        position,
                    },
                );
            }
        }
        self.variables.insert(value);
        Ok(())
    }

    /// Drops `client` from `value` and prunes producers left without clients.
    fn remove_client(&mut self, value: ValueId, client: Client, reason: &str) -> GraphResult<()> {
        let mut work = vec![(value, client)];
        while let Some((value, client)) = work.pop() {
            if let Some(list) = self.clients.get_mut(&value) {
                if let Some(pos) = list.iter().position(|c| *c == client) {
                    list.remove(pos);
                }
                if list.is_empty() {
                    self.clients.remove(&value);
                }
            }
            if !self.clients(value).is_empty() {
                continue;
            }

            let Some(var) = self.arena.value(value) else {
                continue;
            };
            let Some((node, _)) = var.owner else {
                if var.constant {
                    self.variables.remove(&value);
                }
                continue;
            };
            if !self.apply_nodes.contains(&node) {
                continue;
            }
            let apply = self
                .arena
                .node(node)
                .cloned()
                .ok_or(GraphError::ForeignNode(node))?;
            if apply.outputs.iter().any(|out| !self.clients(*out).is_empty()) {
                continue;
            }

            self.apply_nodes.remove(&node);
            for output in &apply.outputs {
                self.variables.remove(output);
            }
            for feature in self.features.clone() {
                feature.on_prune(self, node, reason)?;
            }
            for (position, input) in apply.inputs.iter().enumerate() {
                work.push((
                    *input,
                    Client {
                        consumer: Consumer::Node(node),
                        position,
                    },
                ));
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Ordering and integrity
    // ---------------------------------------------------------------------

    /// Data-dependency order of the nodes in the graph, inputs first.
    pub fn io_toposort(&self) -> GraphResult<Vec<NodeId>> {
        self.sort_nodes(&BTreeMap::new())
    }

    /// Like [`io_toposort`](Self::io_toposort) but also honours every
    /// feature's `orderings`.
    pub fn toposort(&self) -> GraphResult<Vec<NodeId>> {
        let mut extra: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for feature in &self.features {
            for (node, before) in feature.orderings(self) {
                extra.entry(node).or_default().extend(before);
            }
        }
        self.sort_nodes(&extra)
    }

    fn sort_nodes(&self, extra: &BTreeMap<NodeId, BTreeSet<NodeId>>) -> GraphResult<Vec<NodeId>> {
        let mut preds: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut succs: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for &node in &self.apply_nodes {
            let entry = preds.entry(node).or_default();
            if let Some(apply) = self.arena.node(node) {
                for input in &apply.inputs {
                    if let Some((producer, _)) = self.arena.value(*input).and_then(|v| v.owner) {
                        if self.apply_nodes.contains(&producer) {
                            entry.insert(producer);
                        }
                    }
                }
            }
            if let Some(before) = extra.get(&node) {
                entry.extend(before.iter().filter(|n| self.apply_nodes.contains(*n)));
            }
        }
        for (node, before) in &preds {
            for pred in before {
                succs.entry(*pred).or_default().push(*node);
            }
        }

        let mut pending: BTreeMap<NodeId, usize> =
            preds.iter().map(|(node, before)| (*node, before.len())).collect();
        let mut ready: BTreeSet<NodeId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut order = Vec::with_capacity(pending.len());

        while let Some(node) = ready.pop_first() {
            order.push(node);
            pending.remove(&node);
            for succ in succs.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(count) = pending.get_mut(succ) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*succ);
                    }
                }
            }
        }

        match pending.keys().next() {
            Some(node) => Err(GraphError::Cycle(*node)),
            None => Ok(order),
        }
    }

    /// Checks that membership, owners and client lists agree with each other.
    pub fn check_integrity(&self) -> GraphResult<()> {
        let fail = |msg: String| Err(GraphError::Inconsistency(msg));

        for &node in &self.apply_nodes {
            let Some(apply) = self.arena.node(node) else {
                return fail(format!("node {node} is missing from the arena"));
            };
            for (index, output) in apply.outputs.iter().enumerate() {
                if !self.variables.contains(output) {
                    return fail(format!("output {output} of {node} is not in the graph"));
                }
                if self.arena.value(*output).and_then(|v| v.owner) != Some((node, index)) {
                    return fail(format!("output {output} of {node} has the wrong owner"));
                }
            }
            for (position, input) in apply.inputs.iter().enumerate() {
                if !self.variables.contains(input) {
                    return fail(format!("input {input} of {node} is not in the graph"));
                }
                let expected = Client {
                    consumer: Consumer::Node(node),
                    position,
                };
                if !self.clients(*input).contains(&expected) {
                    return fail(format!("{input} does not list {node}[{position}] as a client"));
                }
            }
        }

        for &value in &self.variables {
            let Some(var) = self.arena.value(value) else {
                return fail(format!("value {value} is missing from the arena"));
            };
            match var.owner {
                Some((node, _)) if !self.apply_nodes.contains(&node) => {
                    return fail(format!("{value} is produced by {node}, which is not in the graph"));
                }
                None if !var.constant && !self.inputs.contains(&value) => {
                    return fail(format!("{value} has no producer and is not an input"));
                }
                _ => {}
            }
            for client in self.clients(value) {
                let actual = match client.consumer {
                    Consumer::Output => self.outputs.get(client.position).copied(),
                    Consumer::Node(node) if self.apply_nodes.contains(&node) => self
                        .arena
                        .node(node)
                        .and_then(|apply| apply.inputs.get(client.position).copied()),
                    Consumer::Node(_) => None,
                };
                if actual != Some(value) {
                    return fail(format!(
                        "{value} lists {}[{}] as a client, which reads something else",
                        client.consumer, client.position
                    ));
                }
            }
        }

        for (position, output) in self.outputs.iter().enumerate() {
            let expected = Client {
                consumer: Consumer::Output,
                position,
            };
            if !self.clients(*output).contains(&expected) {
                return fail(format!("graph output {position} ({output}) is not connected"));
            }
        }
        Ok(())
    }
}

fn same_feature(a: &Rc<dyn Feature>, b: &Rc<dyn Feature>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

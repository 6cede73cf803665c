//! Strategy automata for GR(1) games.
//!
//! An [`Automaton`] is a labelled directed graph: every node carries a
//! valuation of the game variables together with the goal mode and reach
//! annotations produced by the synthesis engine, and edges are the moves
//! the strategy allows. Nodes live in an arena addressed by stable
//! [`NodeId`]s, so removing a node never renumbers the others.

mod json;
mod text;
mod xml;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::io;

use fixedbitset::FixedBitSet;
use indexmap::IndexSet;
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::RngCore;

pub use xml::XmlVersion;

/// A state given by variable names, as handed in and out of the public API.
///
/// Booleans are represented by `0` and `1`. A map that names only some of
/// the variables is a partial state, or fragment.
pub type State = BTreeMap<String, i64>;

/// Errors raised while building or reading an automaton.
#[derive(Debug, thiserror::Error)]
pub enum AutomatonError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed JSON strategy: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("{0}")]
    Format(String),
    #[error("node {0} does not exist")]
    MissingNode(NodeId),
    #[error("edge from node {from} to missing node {to}")]
    DanglingEdge { from: NodeId, to: NodeId },
    #[error("node {node} has no value for variable '{variable}'")]
    MissingVariable { node: NodeId, variable: String },
}

/// Stable identifier of a node within one automaton.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for NodeId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

/// Interned variable of a [`Schema`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered set of variable names shared by all valuations of an automaton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    names: IndexSet<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of the given variable, adding it if it is not yet known.
    pub fn intern(&mut self, name: &str) -> VarId {
        match self.names.get_index_of(name) {
            Some(index) => VarId(index),
            None => VarId(self.names.insert_full(name.to_string()).0),
        }
    }

    pub fn get(&self, name: &str) -> Option<VarId> {
        self.names.get_index_of(name).map(VarId)
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.names[var.0]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (VarId(i), name.as_str()))
    }
}

/// Positional valuation over the variables of a [`Schema`].
///
/// Unset entries are `None`; trailing unset entries are insignificant, so a
/// valuation built before the schema grew compares equal to the same
/// valuation built afterwards.
#[derive(Debug, Clone, Default)]
pub struct Valuation {
    values: Vec<Option<i64>>,
}

impl Valuation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: VarId) -> Option<i64> {
        self.values.get(var.0).copied().flatten()
    }

    pub fn set(&mut self, var: VarId, value: i64) {
        if var.0 >= self.values.len() {
            self.values.resize(var.0 + 1, None);
        }
        self.values[var.0] = Some(value);
    }

    pub fn unset(&mut self, var: VarId) {
        if let Some(entry) = self.values.get_mut(var.0) {
            *entry = None;
        }
    }

    /// Iterates over the set entries in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, i64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (VarId(i), v)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Test if every entry set in `fragment` has the same value here.
    pub fn agrees_with(&self, fragment: &Valuation) -> bool {
        fragment.iter().all(|(var, value)| self.get(var) == Some(value))
    }
}

impl PartialEq for Valuation {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}
impl Eq for Valuation {}

/// A node of the strategy automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    state: Valuation,
    successors: BTreeSet<NodeId>,
    mode: i32,
    rgrad: i32,
    initial: bool,
}

impl Node {
    fn new(state: Valuation, successors: BTreeSet<NodeId>) -> Self {
        Self {
            state,
            successors,
            mode: -1,
            rgrad: -1,
            initial: false,
        }
    }

    pub fn valuation(&self) -> &Valuation {
        &self.state
    }

    pub fn successors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.successors.iter().copied()
    }

    pub fn num_successors(&self) -> usize {
        self.successors.len()
    }

    /// The index of the system goal this node works towards, or -1 if unset.
    pub fn mode(&self) -> i32 {
        self.mode
    }

    /// The reach gradient (rank) of this node, or -1 if unset.
    pub fn rgrad(&self) -> i32 {
        self.rgrad
    }

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    pub fn set_mode(&mut self, mode: i32) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn set_rgrad(&mut self, rgrad: i32) -> &mut Self {
        self.rgrad = rgrad;
        self
    }

    pub fn set_initial(&mut self, initial: bool) -> &mut Self {
        self.initial = initial;
        self
    }
}

/// Labelled digraph representing a strategy.
#[derive(Debug, Clone, Default)]
pub struct Automaton {
    schema: Schema,
    nodes: Vec<Option<Node>>,
    predecessors: Vec<BTreeSet<NodeId>>,
    len: usize,
}

impl Automaton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Iterates over the ids of all nodes in increasing order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i), n)))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Mutable access to the annotations of a node.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Encode a named state over the schema of this automaton, interning
    /// unknown variables.
    pub fn intern_state(&mut self, state: &State) -> Valuation {
        let mut valuation = Valuation::new();
        for (name, &value) in state {
            valuation.set(self.schema.intern(name), value);
        }
        valuation
    }

    /// Encode a named state without growing the schema.
    ///
    /// Returns `None` if the state mentions a variable that no node uses,
    /// in which case no node can match it.
    pub fn encode_state(&self, state: &State) -> Option<Valuation> {
        let mut valuation = Valuation::new();
        for (name, &value) in state {
            valuation.set(self.schema.get(name)?, value);
        }
        Some(valuation)
    }

    /// Decode a valuation back into a named state.
    pub fn decode(&self, valuation: &Valuation) -> State {
        valuation
            .iter()
            .map(|(var, value)| (self.schema.name(var).to_string(), value))
            .collect()
    }

    /// The named state of the given node.
    pub fn state(&self, id: NodeId) -> Option<State> {
        self.node(id).map(|node| self.decode(&node.state))
    }

    /// Insert a node with the given state and outgoing transitions.
    ///
    /// If a node with this id exists, its state, annotations and transitions
    /// are replaced. Transitions may point to nodes that are added later;
    /// use [`Automaton::validate`] once construction is complete.
    pub fn add_node<I>(&mut self, id: NodeId, state: &State, transitions: I) -> &mut Node
    where
        I: IntoIterator<Item = NodeId>,
    {
        let valuation = self.intern_state(state);
        self.insert(id, valuation, transitions.into_iter().collect())
    }

    pub(crate) fn insert(
        &mut self,
        id: NodeId,
        state: Valuation,
        successors: BTreeSet<NodeId>,
    ) -> &mut Node {
        self.ensure_slot(id);
        if let Some(old) = self.nodes[id.0].take() {
            self.len -= 1;
            for succ in &old.successors {
                self.predecessors[succ.0].remove(&id);
            }
        }
        for &succ in &successors {
            self.ensure_slot(succ);
            self.predecessors[succ.0].insert(id);
        }
        self.len += 1;
        self.nodes[id.0].insert(Node::new(state, successors))
    }

    fn ensure_slot(&mut self, id: NodeId) {
        if id.0 >= self.nodes.len() {
            self.nodes.resize_with(id.0 + 1, || None);
            self.predecessors.resize_with(id.0 + 1, BTreeSet::new);
        }
    }

    /// Set the state of a node, creating the node without transitions if it
    /// does not exist.
    pub fn set_state(&mut self, id: NodeId, state: &State) {
        let valuation = self.intern_state(state);
        match self.node_mut(id) {
            Some(node) => node.state = valuation,
            None => {
                self.insert(id, valuation, BTreeSet::new());
            }
        }
    }

    /// Replace the outgoing transitions of a node, creating the node with an
    /// empty state if it does not exist.
    pub fn set_transitions<I>(&mut self, id: NodeId, transitions: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        let (state, mode, rgrad, initial) = match self.node(id) {
            Some(node) => (node.state.clone(), node.mode, node.rgrad, node.initial),
            None => (Valuation::new(), -1, -1, false),
        };
        self.insert(id, state, transitions.into_iter().collect())
            .set_mode(mode)
            .set_rgrad(rgrad)
            .set_initial(initial);
    }

    /// Add a single edge between two existing nodes.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), AutomatonError> {
        if !self.contains(to) {
            return Err(AutomatonError::MissingNode(to));
        }
        let node = self
            .nodes
            .get_mut(from.0)
            .and_then(Option::as_mut)
            .ok_or(AutomatonError::MissingNode(from))?;
        node.successors.insert(to);
        self.predecessors[to.0].insert(from);
        Ok(())
    }

    /// Remove a node together with all edges into and out of it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get_mut(id.0)?.take()?;
        self.len -= 1;
        for succ in &node.successors {
            self.predecessors[succ.0].remove(&id);
        }
        let preds = std::mem::take(&mut self.predecessors[id.0]);
        for pred in preds {
            if pred == id {
                continue;
            }
            if let Some(p) = self.nodes[pred.0].as_mut() {
                p.successors.remove(&id);
            }
        }
        Some(node)
    }

    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id).into_iter().flat_map(Node::successors)
    }

    /// Nodes with an edge into the given node.
    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let preds = if self.contains(id) {
            self.predecessors.get(id.0)
        } else {
            None
        };
        preds.into_iter().flatten().copied()
    }

    /// Check that every edge ends in an existing node.
    pub fn validate(&self) -> Result<(), AutomatonError> {
        for (id, node) in self.nodes() {
            if let Some(to) = node.successors().find(|&s| !self.contains(s)) {
                return Err(AutomatonError::DanglingEdge { from: id, to });
            }
        }
        Ok(())
    }

    /// Returns the first node, in id order, whose state equals the given one.
    pub fn find_state(&self, state: &State) -> Option<NodeId> {
        let valuation = self.encode_state(state)?;
        self.nodes()
            .find(|(_, node)| node.state == valuation)
            .map(|(id, _)| id)
    }

    /// Returns all nodes whose state equals the given one.
    pub fn find_all_states(&self, state: &State) -> Vec<NodeId> {
        match self.encode_state(state) {
            Some(valuation) => self
                .nodes()
                .filter(|(_, node)| node.state == valuation)
                .map(|(id, _)| id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns all nodes consistent with the given fragment.
    ///
    /// The empty fragment matches every node.
    pub fn find_all_partial(&self, fragment: &State) -> Vec<NodeId> {
        match self.encode_state(fragment) {
            Some(valuation) => self
                .nodes()
                .filter(|(_, node)| node.state.agrees_with(&valuation))
                .map(|(id, _)| id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Nodes without incoming edges. Recomputed on every call.
    pub fn initial_nodes(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|&id| self.predecessors(id).next().is_none())
            .collect()
    }

    /// Repeatedly delete nodes without outgoing transitions until every
    /// remaining node has a successor.
    pub fn trim_dead_states(&mut self) {
        let mut queue: VecDeque<NodeId> = self
            .nodes()
            .filter(|(_, node)| node.successors.is_empty())
            .map(|(id, _)| id)
            .collect();
        let mut removed = 0;
        while let Some(id) = queue.pop_front() {
            let preds: Vec<NodeId> = self.predecessors(id).collect();
            if self.remove_node(id).is_none() {
                continue;
            }
            removed += 1;
            for pred in preds {
                if self
                    .node(pred)
                    .map_or(false, |node| node.successors.is_empty())
                {
                    queue.push_back(pred);
                }
            }
        }
        debug!("Trimmed {} dead nodes, {} remaining", removed, self.len);
    }

    /// Delete every node outside the weakly connected component of `root`.
    pub fn trim_unconnected_states(&mut self, root: NodeId) -> Result<(), AutomatonError> {
        if !self.contains(root) {
            return Err(AutomatonError::MissingNode(root));
        }
        let mut component = FixedBitSet::with_capacity(self.nodes.len());
        let mut queue = VecDeque::new();
        component.insert(root.0);
        queue.push_back(root);
        while let Some(id) = queue.pop_front() {
            for next in self.successors(id).chain(self.predecessors(id)) {
                if !component.put(next.0) {
                    queue.push_back(next);
                }
            }
        }
        let unconnected: Vec<NodeId> = self.ids().filter(|id| !component[id.0]).collect();
        debug!(
            "Trimming {} nodes unconnected to node {}",
            unconnected.len(),
            root
        );
        for id in unconnected {
            self.remove_node(id);
        }
        Ok(())
    }

    /// Step the strategy for the given environment move.
    ///
    /// Candidates are the successors of `current`, or all nodes if `current`
    /// is `None` or not in this automaton. Among those agreeing with `env`,
    /// the first in id order is returned, or a uniformly chosen one if a
    /// random number generator is supplied.
    pub fn find_next_state(
        &self,
        current: Option<NodeId>,
        env: &State,
        rng: Option<&mut dyn RngCore>,
    ) -> Option<NodeId> {
        let env = self.encode_state(env)?;
        let candidates: Vec<NodeId> = match current.and_then(|id| self.node(id)) {
            Some(node) => node.successors().collect(),
            None => self.ids().collect(),
        };
        let matching: Vec<NodeId> = candidates
            .into_iter()
            .filter(|&id| {
                self.node(id)
                    .map_or(false, |node| node.state.agrees_with(&env))
            })
            .collect();
        match rng {
            Some(rng) => matching.choose(rng).copied(),
            None => matching.first().copied(),
        }
    }

    /// Replace each variable name by the part after its last `.`.
    pub fn strip_names(&mut self) {
        let old = std::mem::take(&mut self.schema);
        let mut renamed = Vec::with_capacity(old.len());
        for (_, name) in old.iter() {
            let stripped = name.rsplit('.').next().unwrap_or(name);
            renamed.push(self.schema.intern(stripped));
        }
        for node in self.nodes.iter_mut().flatten() {
            let mut state = Valuation::new();
            for (var, value) in node.state.iter() {
                state.set(renamed[var.0], value);
            }
            node.state = state;
        }
    }

    /// Give every node a value for `name`, keeping existing values.
    pub fn extend_states(&mut self, name: &str, value: i64) {
        let var = self.schema.intern(name);
        for node in self.nodes.iter_mut().flatten() {
            if node.state.get(var).is_none() {
                node.state.set(var, value);
            }
        }
    }

    /// Remove a variable from the state of every node.
    pub fn remove_variable(&mut self, name: &str) {
        if let Some(var) = self.schema.get(name) {
            for node in self.nodes.iter_mut().flatten() {
                node.state.unset(var);
            }
        }
    }

    /// Positional vector of a node's state in the given variable order.
    pub(crate) fn vector(&self, id: NodeId, order: &[String]) -> Result<Vec<i64>, AutomatonError> {
        let node = self.node(id).ok_or(AutomatonError::MissingNode(id))?;
        order
            .iter()
            .map(|name| {
                self.schema
                    .get(name)
                    .and_then(|var| node.state.get(var))
                    .ok_or_else(|| AutomatonError::MissingVariable {
                        node: id,
                        variable: name.clone(),
                    })
            })
            .collect()
    }

    fn same_state(&self, a: &Node, other: &Automaton, b: &Node) -> bool {
        if self.schema == other.schema {
            return a.state == b.state;
        }
        a.state.len() == b.state.len()
            && a.state.iter().all(|(var, value)| {
                other
                    .schema
                    .get(self.schema.name(var))
                    .and_then(|v| b.state.get(v))
                    == Some(value)
            })
    }
}

impl PartialEq for Automaton {
    /// Automata are equal if they have the same node ids and nodes of equal
    /// id agree on their state and their set of successors.
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        self.nodes().all(|(id, node)| match other.node(id) {
            Some(other_node) => {
                node.successors == other_node.successors && self.same_state(node, other, other_node)
            }
            None => false,
        })
    }
}
impl Eq for Automaton {}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// Warn about variables that are not part of the expected list.
fn check_variables(state: &State, varnames: &[&str]) {
    if varnames.is_empty() {
        return;
    }
    for name in state.keys() {
        if !varnames.contains(&name.as_str()) {
            warn!("Unknown variable {}", name);
        }
    }
}

//! The internal constraint graph used to schedule subpasses into stages.
//!
//! Every subpass is a node, and every edge `a -> b` means `a` must run in an earlier stage than `b`.
//! A subpass is placed in the first stage after all of its predecessors, so stages are the topological
//! generations of the graph.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use anyhow::Result;
use petgraph::{Graph, Incoming, Outgoing};
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;

use crate::Error;
use crate::graph::pass::SubpassId;
use crate::graph::resource::AttachmentId;

/// Reason two subpasses are ordered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Constraint {
    /// Declared by the user
    Explicit,
    /// Both subpasses access this attachment and at least one writes to it.
    Hazard(AttachmentId),
}

/// Ordering constraints between subpasses.
#[derive(Debug, Default, Clone)]
pub(crate) struct TaskGraph {
    graph: Graph<SubpassId, Constraint>,
}

impl TaskGraph {
    /// Create a graph with one node for each of `count` subpasses. Node indices equal subpass indices.
    pub fn new(count: usize) -> Self {
        let mut graph = Graph::with_capacity(count, count);
        for index in 0..count {
            graph.add_node(SubpassId(index as u32));
        }
        Self {
            graph,
        }
    }

    /// Require `before` to run in an earlier stage than `after`. Only the first constraint between two subpasses is kept.
    pub fn add_constraint(&mut self, before: SubpassId, after: SubpassId, constraint: Constraint) {
        let before = NodeIndex::new(before.idx());
        let after = NodeIndex::new(after.idx());
        if self.graph.find_edge(before, after).is_none() {
            self.graph.add_edge(before, after, constraint);
        }
    }

    /// Assign a stage to every subpass. Subpasses without predecessors go in stage zero, every other subpass goes
    /// directly after its latest predecessor.
    /// # Errors
    /// * Fails if the constraints contain a cycle.
    pub fn levels(&self) -> Result<Vec<u32>> {
        let order = toposort(&self.graph, None).map_err(|_| Error::GraphHasCycle)?;
        let mut levels = vec![0; self.graph.node_count()];
        for node in order {
            let level = self
                .graph
                .neighbors_directed(node, Incoming)
                .map(|parent| levels[parent.index()] + 1)
                .max()
                .unwrap_or(0);
            levels[node.index()] = level;
        }
        Ok(levels)
    }

    /// Position of every subpass in a topological order of the graph. Whenever several subpasses are free to go next,
    /// the one declared first is taken.
    /// # Errors
    /// * Fails if the constraints contain a cycle.
    pub fn ranks(&self) -> Result<Vec<u32>> {
        let mut in_degree = self
            .graph
            .node_indices()
            .map(|node| self.graph.neighbors_directed(node, Incoming).count())
            .collect::<Vec<_>>();
        let mut ready = self
            .graph
            .node_indices()
            .filter(|node| in_degree[node.index()] == 0)
            .map(Reverse)
            .collect::<BinaryHeap<_>>();
        let mut ranks = vec![0; self.graph.node_count()];
        let mut rank = 0;
        while let Some(Reverse(node)) = ready.pop() {
            ranks[node.index()] = rank;
            rank += 1;
            for child in self.graph.neighbors_directed(node, Outgoing) {
                in_degree[child.index()] -= 1;
                if in_degree[child.index()] == 0 {
                    ready.push(Reverse(child));
                }
            }
        }
        if rank as usize != self.graph.node_count() {
            return Err(Error::GraphHasCycle.into());
        }
        Ok(ranks)
    }

    /// Every constraint in the graph, as `(before, after, constraint)`.
    pub fn constraints(&self) -> impl Iterator<Item = (SubpassId, SubpassId, Constraint)> + '_ {
        self.graph.edge_indices().filter_map(|edge| {
            let (before, after) = self.graph.edge_endpoints(edge)?;
            let constraint = *self.graph.edge_weight(edge)?;
            Some((self.graph[before], self.graph[after], constraint))
        })
    }
}

/// Group subpasses by stage. Subpasses inside a stage are sorted by index.
pub(crate) fn group_stages(levels: &[u32]) -> Vec<Vec<SubpassId>> {
    let count = levels.iter().max().map_or(0, |max| *max as usize + 1);
    let mut stages = vec![Vec::new(); count];
    for (index, level) in levels.iter().enumerate() {
        stages[*level as usize].push(SubpassId(index as u32));
    }
    stages
}

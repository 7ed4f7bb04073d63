//! Property-based generators for entity graphs.

use crate::fixtures::TestEntity;
use proptest::prelude::*;

/// Raw edges of a graph with `nodes` nodes.
#[derive(Debug, Clone)]
pub struct GraphShape {
    /// Number of nodes.
    pub nodes: usize,
    /// `(dependent, slave)` pairs.
    pub edges: Vec<(usize, usize)>,
}

impl GraphShape {
    /// Builds entities named `Node-<index>` wired along the edges.
    pub fn build(&self) -> Vec<TestEntity> {
        let entities: Vec<TestEntity> = (0..self.nodes)
            .map(|i| TestEntity::new("Node", format!("Node-{i}")))
            .collect();
        for &(dependent, slave) in &self.edges {
            entities[dependent].add_slave(&entities[slave]);
        }
        entities
    }
}

/// Strategy for arbitrary graphs, cycles and self-loops included.
pub fn graph_shape_strategy(max_nodes: usize) -> impl Strategy<Value = GraphShape> {
    (1..=max_nodes.max(1)).prop_flat_map(|nodes| {
        prop::collection::vec((0..nodes, 0..nodes), 0..=nodes * 2)
            .prop_map(move |edges| GraphShape { nodes, edges })
    })
}

/// Strategy for acyclic graphs: a node only depends on lower-indexed nodes.
pub fn dag_shape_strategy(max_nodes: usize) -> impl Strategy<Value = GraphShape> {
    graph_shape_strategy(max_nodes).prop_map(|shape| GraphShape {
        nodes: shape.nodes,
        edges: shape
            .edges
            .into_iter()
            .filter(|(dependent, slave)| dependent > slave)
            .collect(),
    })
}

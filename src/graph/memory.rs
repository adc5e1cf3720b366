//! In-process graph store backed by a `petgraph` digraph.
//!
//! Nodes carry the same shape the Neo4j adapter reads: an optional `name`,
//! an optional `title`, and a list of labels. Only `name` is matchable.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::LookupError;

use super::{Edge, GraphStore, UNKNOWN_TYPE};

/// A node in the in-memory graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryNode {
    pub name: Option<String>,
    pub title: Option<String>,
    pub labels: Vec<String>,
}

impl MemoryNode {
    /// Display name with the same fallback order as the Cypher projection.
    fn display(&self) -> &str {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(UNKNOWN_TYPE)
    }
}

/// In-memory graph store.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    graph: DiGraph<MemoryNode, String>,
    by_name: HashMap<String, NodeIndex>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node identified by `name`. Re-adding a name returns the existing node.
    pub fn add_named(&mut self, label: &str, name: &str) -> NodeIndex {
        if let Some(&idx) = self.by_name.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(MemoryNode {
            name: Some(name.to_string()),
            title: None,
            labels: vec![label.to_string()],
        });
        self.by_name.insert(name.to_string(), idx);
        idx
    }

    /// Add a node that only has a `title` (not matchable by lookup).
    pub fn add_titled(&mut self, label: &str, title: &str) -> NodeIndex {
        self.graph.add_node(MemoryNode {
            name: None,
            title: Some(title.to_string()),
            labels: vec![label.to_string()],
        })
    }

    /// Add an arbitrary node.
    pub fn add_node(&mut self, node: MemoryNode) -> NodeIndex {
        let name = node.name.clone();
        let idx = self.graph.add_node(node);
        if let Some(name) = name {
            self.by_name.entry(name).or_insert(idx);
        }
        idx
    }

    /// Add a directed relationship.
    pub fn relate(&mut self, from: NodeIndex, relation: &str, to: NodeIndex) {
        self.graph.add_edge(from, to, relation.to_string());
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// A small slice of the Neo4j movie dataset.
    pub fn movie_sample() -> Self {
        let mut g = Self::new();

        let hanks = g.add_named("Person", "Tom Hanks");
        let reeves = g.add_named("Person", "Keanu Reeves");
        let meg = g.add_named("Person", "Meg Ryan");
        let wachowski = g.add_named("Person", "Lana Wachowski");

        let big = g.add_titled("Movie", "Big");
        let cast_away = g.add_titled("Movie", "Cast Away");
        let mail = g.add_titled("Movie", "You've Got Mail");
        let thing = g.add_titled("Movie", "That Thing You Do");
        let matrix = g.add_titled("Movie", "The Matrix");
        let sgg = g.add_titled("Movie", "Something's Gotta Give");

        g.relate(hanks, "ACTED_IN", big);
        g.relate(hanks, "ACTED_IN", cast_away);
        g.relate(hanks, "ACTED_IN", mail);
        g.relate(hanks, "ACTED_IN", thing);
        g.relate(hanks, "DIRECTED", thing);
        g.relate(reeves, "ACTED_IN", matrix);
        g.relate(reeves, "ACTED_IN", sgg);
        g.relate(meg, "ACTED_IN", mail);
        g.relate(wachowski, "DIRECTED", matrix);

        g
    }
}

impl GraphStore for MemoryGraph {
    fn try_lookup(&self, entity_name: &str) -> Result<Vec<Edge>, LookupError> {
        let idx = self
            .by_name
            .get(entity_name)
            .copied()
            .ok_or_else(|| LookupError::NotFound {
                entity: entity_name.to_string(),
            })?;

        // petgraph walks adjacency lists newest-first.
        let mut edges: Vec<Edge> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| {
                let target = &self.graph[e.target()];
                Edge {
                    relation: e.weight().clone(),
                    neighbor: target.display().to_string(),
                    neighbor_type: target
                        .labels
                        .first()
                        .cloned()
                        .unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
                }
            })
            .collect();
        edges.reverse();
        Ok(edges)
    }

    fn describe(&self) -> String {
        format!(
            "memory graph ({} nodes, {} edges)",
            self.node_count(),
            self.edge_count()
        )
    }
}

//! Graph lookup: one-hop outgoing-edge queries against a knowledge graph.
//!
//! Stores implement [`GraphStore`], which reports typed failures. The agent
//! loop talks to a store through [`GraphLookup`], which keeps the contract of
//! "an empty edge list when nothing useful came back" while logging why.
//!
//! - **Neo4j** ([`neo4j::Neo4jStore`]): Bolt connection pool, read-only query
//! - **In-memory** ([`memory::MemoryGraph`]): `petgraph` digraph for tests and demos

pub mod memory;
#[cfg(feature = "neo4j")]
pub mod neo4j;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// Type label reported when a neighbor carries no labels.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// One outgoing relationship of a looked-up entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Relationship type, e.g. `ACTED_IN`.
    pub relation: String,
    /// Display name of the neighbor (its `name`, else its `title`).
    pub neighbor: String,
    /// First label of the neighbor, or [`UNKNOWN_TYPE`].
    pub neighbor_type: String,
}

impl Edge {
    pub fn new(
        relation: impl Into<String>,
        neighbor: impl Into<String>,
        neighbor_type: impl Into<String>,
    ) -> Self {
        Self {
            relation: relation.into(),
            neighbor: neighbor.into(),
            neighbor_type: neighbor_type.into(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.relation, self.neighbor, self.neighbor_type
        )
    }
}

/// A read-only store that answers one-hop lookups.
pub trait GraphStore: Send + Sync {
    /// Outgoing edges of the node whose name equals `entity_name` exactly.
    ///
    /// Returns `Ok(vec![])` when the node exists without outgoing edges and
    /// [`LookupError::NotFound`] when no node has that name.
    fn try_lookup(&self, entity_name: &str) -> Result<Vec<Edge>, LookupError>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Lookup front-end that never fails.
#[derive(Clone)]
pub struct GraphLookup {
    store: Arc<dyn GraphStore>,
}

impl GraphLookup {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// One-hop lookup, empty on not-found, no edges, or any store error.
    pub fn lookup(&self, entity_name: &str) -> Vec<Edge> {
        match self.store.try_lookup(entity_name) {
            Ok(edges) => edges,
            Err(LookupError::NotFound { .. }) => {
                tracing::debug!(entity = entity_name, "lookup: no such entity");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(entity = entity_name, error = %e, "lookup failed");
                Vec::new()
            }
        }
    }

    /// One-hop lookup with the failure kind preserved.
    pub fn try_lookup(&self, entity_name: &str) -> Result<Vec<Edge>, LookupError> {
        self.store.try_lookup(entity_name)
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }
}

impl fmt::Debug for GraphLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphLookup")
            .field("store", &self.store.describe())
            .finish()
    }
}

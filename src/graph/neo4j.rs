//! Neo4j store: read-only one-hop lookup over Bolt.
//!
//! The driver is async; the store owns a single-threaded tokio runtime and
//! blocks on each lookup so the agent loop stays synchronous. The connection
//! pool is created on first use and confirmed with a trivial query. Every
//! lookup runs under the configured timeout.

use std::time::Duration;

use neo4rs::{ConfigBuilder, Graph, query};
use tokio::sync::OnceCell;

use crate::config::{GraphConfig, GraphCredentials};
use crate::error::{DuoError, LookupError};

use super::{Edge, GraphStore, UNKNOWN_TYPE};

/// Neo4j-backed graph store.
pub struct Neo4jStore {
    creds: GraphCredentials,
    database: Option<String>,
    entity_label: Option<String>,
    max_connections: usize,
    timeout: Duration,
    runtime: tokio::runtime::Runtime,
    graph: OnceCell<Graph>,
}

impl Neo4jStore {
    /// Build a store from validated configuration. Does not connect yet.
    pub fn new(config: &GraphConfig) -> Result<Self, DuoError> {
        let creds = config.credentials()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LookupError::Connection {
                uri: creds.uri.clone(),
                message: format!("failed to start runtime: {e}"),
            })?;

        Ok(Self {
            creds,
            database: config.database.clone(),
            entity_label: config.entity_label.clone(),
            max_connections: config.max_connections.max(1),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            runtime,
            graph: OnceCell::new(),
        })
    }

    /// Connect (if needed) and verify the server answers.
    pub fn verify_connectivity(&self) -> Result<(), LookupError> {
        self.block_on_timeout(async { self.pool().await.map(|_| ()) })
    }

    fn cypher(&self) -> String {
        one_hop_cypher(self.entity_label.as_deref())
    }

    fn block_on_timeout<T, F>(&self, fut: F) -> Result<T, LookupError>
    where
        F: std::future::Future<Output = Result<T, LookupError>>,
    {
        let timeout = self.timeout;
        self.runtime.block_on(async move {
            tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| LookupError::Timeout {
                    timeout_secs: timeout.as_secs(),
                })?
        })
    }

    async fn pool(&self) -> Result<&Graph, LookupError> {
        self.graph.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<Graph, LookupError> {
        let mut builder = ConfigBuilder::default()
            .uri(self.creds.uri.as_str())
            .user(self.creds.user.as_str())
            .password(self.creds.password.as_str())
            .max_connections(self.max_connections);
        if let Some(db) = &self.database {
            builder = builder.db(db.as_str());
        }
        let config = builder.build().map_err(|e| self.classify(e))?;
        let graph = Graph::connect(config)
            .await
            .map_err(|e| self.classify(e))?;

        let mut check = graph
            .execute(query("RETURN 1 AS ok"))
            .await
            .map_err(|e| self.classify(e))?;
        while check.next().await.map_err(|e| self.classify(e))?.is_some() {}

        tracing::info!(uri = %self.creds.uri, "neo4j: connected");
        Ok(graph)
    }

    async fn lookup(&self, entity_name: &str) -> Result<Vec<Edge>, LookupError> {
        let graph = self.pool().await?;
        let q = query(&self.cypher()).param("entityName", entity_name);
        let mut stream = graph.execute(q).await.map_err(|e| self.classify(e))?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| self.classify(e))? {
            let relation: Option<String> =
                row.get("relation").map_err(|e| LookupError::Query {
                    message: format!("bad relation column: {e}"),
                })?;
            let neighbor: Option<String> = row.get("neighbor").unwrap_or(None);
            let labels: Vec<String> = row.get("neighbor_labels").unwrap_or_default();
            rows.push(RawRow {
                relation,
                neighbor,
                labels,
            });
        }
        edges_from_rows(entity_name, rows)
    }

    fn classify(&self, err: neo4rs::Error) -> LookupError {
        classify_error(err, &self.creds.uri, &self.creds.user)
    }
}

/// Columns of one result row, before defaults are applied.
#[derive(Debug, Clone, Default)]
struct RawRow {
    relation: Option<String>,
    neighbor: Option<String>,
    labels: Vec<String>,
}

/// Map result rows to edges.
///
/// No rows means the start node does not exist. `OPTIONAL MATCH` yields a
/// single null-relation row for a node without outgoing edges.
fn edges_from_rows(
    entity_name: &str,
    rows: impl IntoIterator<Item = RawRow>,
) -> Result<Vec<Edge>, LookupError> {
    let mut matched = false;
    let mut edges = Vec::new();
    for row in rows {
        matched = true;
        let Some(relation) = row.relation else {
            continue;
        };
        edges.push(Edge {
            relation,
            neighbor: row.neighbor.unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
            neighbor_type: row
                .labels
                .into_iter()
                .next()
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
        });
    }

    if !matched {
        return Err(LookupError::NotFound {
            entity: entity_name.to_string(),
        });
    }
    Ok(edges)
}

fn classify_error(err: neo4rs::Error, uri: &str, user: &str) -> LookupError {
    match err {
        neo4rs::Error::AuthenticationError(_) => LookupError::Auth {
            user: user.to_string(),
        },
        neo4rs::Error::ConnectionError | neo4rs::Error::IOError { .. } => {
            LookupError::Connection {
                uri: uri.to_string(),
                message: err.to_string(),
            }
        }
        other => LookupError::Query {
            message: other.to_string(),
        },
    }
}

impl GraphStore for Neo4jStore {
    fn try_lookup(&self, entity_name: &str) -> Result<Vec<Edge>, LookupError> {
        let edges = self.block_on_timeout(self.lookup(entity_name))?;
        tracing::debug!(entity = entity_name, edges = edges.len(), "neo4j: lookup");
        Ok(edges)
    }

    fn describe(&self) -> String {
        format!("neo4j at {}", self.creds.uri)
    }
}

impl std::fmt::Debug for Neo4jStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jStore")
            .field("creds", &self.creds)
            .field("database", &self.database)
            .field("entity_label", &self.entity_label)
            .field("timeout", &self.timeout)
            .field("connected", &self.graph.initialized())
            .finish()
    }
}

/// The read-only one-hop query. `label` must already be a validated identifier.
pub fn one_hop_cypher(label: Option<&str>) -> String {
    let start = match label {
        Some(l) => format!("(s:`{l}`)"),
        None => "(s)".to_string(),
    };
    format!(
        "MATCH {start} WHERE s.name = $entityName \
         OPTIONAL MATCH (s)-[r]->(t) \
         RETURN type(r) AS relation, \
                coalesce(t.name, t.title) AS neighbor, \
                labels(t) AS neighbor_labels"
    )
}

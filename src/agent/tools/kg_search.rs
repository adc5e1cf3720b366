//! KG search tool: one-hop outgoing connections of an entity.

use crate::agent::error::{AgentError, AgentResult};
use crate::agent::tool::{Tool, ToolInput, ToolOutput, ToolParam, ToolSignature};
use crate::error::LookupError;
use crate::graph::{Edge, GraphLookup};

pub const TOOL_NAME: &str = "knowledge_graph_search";
pub const PARAM_ENTITY: &str = "entity_name";

/// Searches the knowledge graph for all one-hop connections of an entity.
pub struct KgSearchTool {
    lookup: GraphLookup,
}

impl KgSearchTool {
    pub fn new(lookup: GraphLookup) -> Self {
        Self { lookup }
    }
}

impl Tool for KgSearchTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: TOOL_NAME.into(),
            description: "Searches the knowledge graph for all one-hop connections \
                          (relations and neighboring entities) from the given entity name."
                .into(),
            parameters: vec![ToolParam {
                name: PARAM_ENTITY.into(),
                description: "Exact name of the entity to start from.".into(),
                required: true,
            }],
        }
    }

    fn execute(&self, input: ToolInput) -> AgentResult<ToolOutput> {
        let entity = input.require(PARAM_ENTITY, TOOL_NAME)?.trim();

        match self.lookup.try_lookup(entity) {
            Ok(edges) => Ok(ToolOutput::ok(format_edges(entity, &edges))),
            Err(LookupError::NotFound { .. }) => Ok(ToolOutput::ok(format_edges(entity, &[]))),
            Err(e) => Err(AgentError::Lookup(e)),
        }
    }
}

/// One `- REL -> neighbor (Type)` line per edge, or a no-connections notice.
pub fn format_edges(entity: &str, edges: &[Edge]) -> String {
    if edges.is_empty() {
        return format!("No direct outgoing connections found for: {entity}.");
    }
    edges
        .iter()
        .map(|e| format!("- {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

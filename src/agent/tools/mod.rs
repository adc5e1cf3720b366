//! Built-in tools: knowledge graph search (executor) and knowledge
//! generator (planner).

pub mod generator;
pub mod kg_search;

pub use generator::{KnowledgeGeneratorTool, fabricate};
pub use kg_search::{KgSearchTool, format_edges};

// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # kg-duo
//!
//! Answers natural-language questions with two cooperating model roles over a
//! knowledge graph. A planner decides what to do next; an executor performs a
//! single one-hop lookup when asked. Facts the graph lacks can be hypothesized
//! into a short-term memory that lives only for the run.
//!
//! ## Architecture
//!
//! - **Graph lookup** (`graph`): one-hop outgoing edges from Neo4j or an in-memory graph
//! - **Agent** (`agent`): transcript, directives, planner, executor, orchestration loop
//! - **Config** (`config`): defaults, TOML file, environment overlay
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kg_duo::agent::llm::{ChatResponse, ScriptedModel};
//! use kg_duo::agent::Orchestrator;
//! use kg_duo::config::RunConfig;
//! use kg_duo::graph::{GraphLookup, memory::MemoryGraph};
//!
//! let model = Arc::new(ScriptedModel::replies(vec![
//!     ChatResponse::text("FINAL ANSWER: You've Got Mail"),
//! ]));
//! let lookup = GraphLookup::new(Arc::new(MemoryGraph::movie_sample()));
//! let report = Orchestrator::new(model, lookup, &RunConfig::default())
//!     .run("Which movie did Tom Hanks and Meg Ryan both act in?");
//! assert!(report.outcome.is_answered());
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod graph;

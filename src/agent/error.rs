//! Agent-specific error types with rich miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use crate::error::LookupError;

use super::llm::LlmError;

/// Errors from the agent layer (roles, tools, loop).
#[derive(Debug, Error, Diagnostic)]
pub enum AgentError {
    #[error("tool not found: \"{name}\"")]
    #[diagnostic(
        code(duo::agent::tool_not_found),
        help("The model asked for a tool that was not offered to this role.")
    )]
    ToolNotFound { name: String },

    #[error("tool execution failed: {tool_name}: {message}")]
    #[diagnostic(
        code(duo::agent::tool_execution),
        help("The tool rejected its arguments. Check the inner cause for details.")
    )]
    ToolExecution { tool_name: String, message: String },

    #[error("planner call failed at step {step}")]
    #[diagnostic(
        code(duo::agent::planner),
        help("The planner's model request failed; the run was aborted without an answer.")
    )]
    Planner {
        step: usize,
        #[source]
        source: LlmError,
    },

    #[error("executor call failed for \"{entity}\"")]
    #[diagnostic(
        code(duo::agent::executor),
        help("The executor's model request failed; the search step was skipped.")
    )]
    Executor {
        entity: String,
        #[source]
        source: LlmError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lookup(#[from] LookupError),
}

/// Convenience alias for agent operations.
pub type AgentResult<T> = std::result::Result<T, AgentError>;

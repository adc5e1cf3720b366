//! Agent layer: planner and executor roles driven by a bounded loop.
//!
//! - **Planner** (`planner`): reads the transcript and memory, emits a directive
//!   or a fabrication tool call
//! - **Executor** (`executor`): turns a search directive into one graph lookup
//! - **Orchestrator** (`orchestrator`): alternates the two until a final answer,
//!   the step budget, a fatal error, or cancellation
//! - **Tools** (`tool`, `tools`): trait impls with runtime registration
//! - **LLM** (`llm`): chat model backends

pub mod directive;
pub mod error;
pub mod executor;
pub mod llm;
pub mod orchestrator;
pub mod planner;
pub mod tool;
pub mod tools;
pub mod transcript;

pub use directive::{Directive, FINAL_MARKER, SEARCH_MARKER};
pub use error::{AgentError, AgentResult};
pub use executor::{EXECUTOR_PROMPT, Executor, ExecutorOutput};
pub use llm::{ChatModel, ChatRequest, ChatResponse, LlmError};
pub use orchestrator::{CancelFlag, LoopState, Orchestrator, RunOutcome, RunReport};
pub use planner::{PLANNER_PROMPT, Planner, PlannerOutput};
pub use tool::{Tool, ToolInput, ToolOutput, ToolRegistry, ToolSignature};
pub use transcript::{Memory, Message, ToolCall, Transcript};

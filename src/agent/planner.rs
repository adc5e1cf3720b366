//! Planner role: decides the next action from the transcript and memory.

use std::sync::Arc;

use super::llm::{ChatModel, ChatRequest, LlmError};
use super::tool::ToolRegistry;
use super::tools::KnowledgeGeneratorTool;
use super::transcript::{Message, ToolCall, Transcript};

/// Fixed planner instructions.
pub const PLANNER_PROMPT: &str = "You are the Planner. Analyze the question and decide the next step.\n\
    1. To search, say: 'INSTRUCTION: PERFORM SEARCH for entity [Name]'.\n\
    2. To hypothesize missing data, use 'knowledge_generator'.\n\
    3. When finished, say: 'FINAL ANSWER: [Your Answer]'.";

/// What the planner produced for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerOutput {
    /// Structured tool invocation(s); any accompanying text is kept.
    ToolInvocation { content: String, calls: Vec<ToolCall> },
    /// Free text that may carry a directive.
    FreeText(String),
}

pub struct Planner {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
}

impl Planner {
    /// A planner offered only the knowledge generator tool.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            tools: ToolRegistry::new().with(Box::new(KnowledgeGeneratorTool)),
        }
    }

    /// Tools the planner may invoke.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// One planner call. The memory summary rides along as a trailing human
    /// message and is not added to the transcript.
    pub fn plan(
        &self,
        transcript: &Transcript,
        memory_summary: &str,
    ) -> Result<PlannerOutput, LlmError> {
        let mut messages = transcript.messages().to_vec();
        if !memory_summary.is_empty() {
            messages.push(Message::human(memory_summary));
        }
        let request = ChatRequest::new(messages).with_tools(self.tools.list());

        let response = self.model.complete(&request)?;
        if response.has_tool_calls() {
            Ok(PlannerOutput::ToolInvocation {
                content: response.content,
                calls: response.tool_calls,
            })
        } else {
            Ok(PlannerOutput::FreeText(response.content))
        }
    }
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("model", &self.model.name())
            .field("tools", &self.tools)
            .finish()
    }
}

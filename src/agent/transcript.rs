//! Conversational state for one run: the role-tagged transcript and the
//! short-term memory of fabricated facts. Both are append-only and dropped
//! when the run ends.

use serde::Serialize;

use super::tool::ToolInput;

/// A structured tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    /// Identifier pairing the call with its result message.
    pub id: String,
    /// Name of the requested tool.
    pub name: String,
    /// Arguments supplied by the model.
    #[serde(serialize_with = "serialize_input")]
    pub args: ToolInput,
}

fn serialize_input<S: serde::Serializer>(input: &ToolInput, s: S) -> Result<S::Ok, S::Error> {
    input.params.serialize(s)
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: ToolInput) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// Role instructions.
    System { content: String },
    /// Input from the human side.
    Human { content: String },
    /// Model output, optionally requesting tool invocations.
    Assistant {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    /// Result of a tool invocation.
    Tool {
        call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(call: &ToolCall, content: impl Into<String>) -> Self {
        Self::Tool {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
        }
    }

    /// Text content of the message.
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Human { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }
}

/// Ordered, append-only message log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// `[System(instructions), Human(question)]`.
    pub fn seeded(instructions: &str, question: &str) -> Self {
        Self {
            messages: vec![Message::system(instructions), Message::human(question)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Every tool-call bearing assistant message is immediately followed by
    /// one tool result per call id, in call order.
    pub fn is_consistent(&self) -> bool {
        let mut i = 0;
        while i < self.messages.len() {
            if let Message::Assistant { tool_calls, .. } = &self.messages[i] {
                for (offset, call) in tool_calls.iter().enumerate() {
                    match self.messages.get(i + 1 + offset) {
                        Some(Message::Tool { call_id, .. }) if *call_id == call.id => {}
                        _ => return false,
                    }
                }
                i += tool_calls.len();
            }
            i += 1;
        }
        true
    }
}

/// Fabricated facts recorded during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Memory {
    facts: Vec<String>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, fact: impl Into<String>) {
        self.facts.push(fact.into());
    }

    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Flattened form injected into the planner context; empty when there are no facts.
    pub fn summary(&self) -> String {
        if self.facts.is_empty() {
            String::new()
        } else {
            format!("\n[Memory: {}]", self.facts.join("; "))
        }
    }
}

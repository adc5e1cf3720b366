//! Chat model interface used by the planner and executor roles.
//!
//! A role sends a [`ChatRequest`] (role-tagged messages plus the tools it may
//! invoke) and gets back a [`ChatResponse`]: free text, structured tool calls,
//! or both. Backends:
//!
//! - [`GeminiClient`]: Google `generateContent` REST API
//! - [`OllamaClient`]: local Ollama `/api/chat`
//! - [`ScriptedModel`]: canned responses for tests and offline demos

pub mod gemini;
pub mod ollama;
pub mod scripted;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::{LlmConfig, Provider};
use crate::error::ConfigError;

use super::tool::{ToolInput, ToolSignature};
use super::transcript::{Message, ToolCall};

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use scripted::ScriptedModel;

/// Errors from the LLM subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("model server is not available at {url}")]
    #[diagnostic(
        code(duo::llm::unavailable),
        help("Check the base URL and that the server is running and reachable.")
    )]
    Unavailable { url: String },

    #[error("model request failed: {message}")]
    #[diagnostic(
        code(duo::llm::request_failed),
        help("Check network connectivity and the model name.")
    )]
    RequestFailed { message: String },

    #[error("model server rejected the request with status {status}: {message}")]
    #[diagnostic(
        code(duo::llm::rejected),
        help("401/403 usually means a bad API key; 404 an unknown model; 429 a rate limit.")
    )]
    Rejected { status: u16, message: String },

    #[error("failed to parse model response: {message}")]
    #[diagnostic(
        code(duo::llm::parse_error),
        help("The model returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("model request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(duo::llm::timeout),
        help("Increase llm.timeout_secs or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

/// Sampling temperature sent with every request; both roles run fully greedy.
pub const TEMPERATURE: f32 = 0.0;

/// One request to a chat model.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Tools the model may invoke; empty for plain chat.
    pub tools: Vec<ToolSignature>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSignature>) -> Self {
        self.tools = tools;
        self
    }
}

/// A model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    /// Flattened text content (may be empty when only tools were called).
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    /// A text-only reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A reply with a single tool call.
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, args: ToolInput) -> Self {
        Self {
            content: String::new(),
            tool_calls: vec![ToolCall::new(id, name, args)],
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A chat model backend.
pub trait ChatModel: Send + Sync {
    /// Send one request and wait for the reply.
    fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Backend and model name, for logs.
    fn name(&self) -> String;
}

/// Build the backend selected by `config`, failing fast on missing credentials.
pub fn from_config(config: &LlmConfig) -> Result<Box<dyn ChatModel>, ConfigError> {
    config.validate()?;
    Ok(match config.provider {
        Provider::Gemini => Box::new(GeminiClient::new(config)?),
        Provider::Ollama => Box::new(OllamaClient::new(config)),
    })
}

/// Join content that may arrive as a string or a list of parts.
pub fn flatten_content(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .map(|p| match p {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Object(obj) => obj
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string(),
                other => other.to_string(),
            })
            .collect(),
        other => other.to_string(),
    }
}

/// Hands out `call_N` identifiers for backends that do not supply their own.
#[derive(Debug, Default)]
pub(crate) struct CallIds {
    next: AtomicU64,
}

impl CallIds {
    pub(crate) fn next(&self) -> String {
        format!("call_{}", self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// POST a JSON body and parse the JSON reply.
pub(crate) fn post_json(
    url: &str,
    headers: &[(&str, &str)],
    body: &serde_json::Value,
    timeout_secs: u64,
) -> Result<serde_json::Value, LlmError> {
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .build();

    let body_str = serde_json::to_string(body).map_err(|e| LlmError::RequestFailed {
        message: format!("JSON serialize error: {e}"),
    })?;

    let mut req = agent.post(url).set("Content-Type", "application/json");
    for (name, value) in headers {
        req = req.set(name, value);
    }

    let resp = req
        .send_string(&body_str)
        .map_err(|e| map_ureq_error(e, url, timeout_secs))?;

    let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
        message: e.to_string(),
    })?;

    serde_json::from_str(&resp_str).map_err(|e| LlmError::ParseError {
        message: e.to_string(),
    })
}

pub(crate) fn map_ureq_error(err: ureq::Error, url: &str, timeout_secs: u64) -> LlmError {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            LlmError::Rejected {
                status,
                message: truncate(&body, 300),
            }
        }
        ureq::Error::Transport(t) => {
            let message = t.to_string();
            match t.kind() {
                ureq::ErrorKind::Io if message.contains("timed out") => {
                    LlmError::Timeout { timeout_secs }
                }
                ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
                    LlmError::Unavailable {
                        url: strip_query(url).to_string(),
                    }
                }
                _ => LlmError::RequestFailed { message },
            }
        }
    }
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_plain_string() {
        assert_eq!(flatten_content(&serde_json::json!("hello")), "hello");
        assert_eq!(flatten_content(&serde_json::Value::Null), "");
    }

    #[test]
    fn flatten_list_of_parts() {
        let parts = serde_json::json!([
            {"type": "text", "text": "INSTRUCTION: "},
            "PERFORM SEARCH ",
            {"type": "image"},
            {"text": "for entity [Big]"}
        ]);
        assert_eq!(
            flatten_content(&parts),
            "INSTRUCTION: PERFORM SEARCH for entity [Big]"
        );
    }

    #[test]
    fn call_ids_are_unique() {
        let ids = CallIds::default();
        assert_eq!(ids.next(), "call_1");
        assert_eq!(ids.next(), "call_2");
    }

    #[test]
    fn truncate_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(truncate(&long, 10).chars().count(), 11);
        assert_eq!(truncate(" short ", 10), "short");
    }

    #[test]
    fn from_config_requires_gemini_key() {
        let config = LlmConfig::default();
        assert!(from_config(&config).is_err());

        let config = LlmConfig {
            api_key: Some("key".into()),
            ..Default::default()
        };
        let model = from_config(&config).unwrap();
        assert!(model.name().contains("gemini-2.0-flash"));
    }

    #[test]
    fn unreachable_server_is_unavailable() {
        let err = post_json(
            "http://127.0.0.1:1/api/chat",
            &[],
            &serde_json::json!({}),
            5,
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::Unavailable { .. }), "got {err:?}");
    }
}

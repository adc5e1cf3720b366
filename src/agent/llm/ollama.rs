//! Ollama client for running both roles against a local model.

use std::time::Duration;

use crate::agent::tool::ToolInput;
use crate::agent::transcript::{Message, ToolCall};
use crate::config::LlmConfig;

use super::{
    CallIds, ChatModel, ChatRequest, ChatResponse, LlmError, TEMPERATURE, flatten_content, post_json,
};

/// Client for the Ollama REST API.
pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout_secs: u64,
    /// Models available locally after `probe()`.
    available_models: Vec<String>,
    ids: CallIds,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration.
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            timeout_secs: config.timeout_secs,
            available_models: Vec::new(),
            ids: CallIds::default(),
        }
    }

    /// Probe the Ollama server to check availability.
    ///
    /// Sends a lightweight request to the `/api/tags` endpoint and
    /// records the list of locally available models.
    pub fn probe(&mut self) -> Result<(), LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();

        let resp = agent
            .get(&url)
            .call()
            .map_err(|_| LlmError::Unavailable { url: url.clone() })?;
        let body = resp.into_string().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| LlmError::ParseError {
                message: e.to_string(),
            })?;

        self.available_models = json["models"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["name"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(())
    }

    /// Whether the configured model is locally available.
    pub fn has_model(&self) -> bool {
        let target = &self.model;
        self.available_models
            .iter()
            .any(|m| m == target || m.split(':').next() == Some(target))
    }

    /// Get the model name being used.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request body for `/api/chat`.
    pub fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let msgs: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| match m {
                Message::System { content } => {
                    serde_json::json!({ "role": "system", "content": content })
                }
                Message::Human { content } => {
                    serde_json::json!({ "role": "user", "content": content })
                }
                Message::Assistant {
                    content,
                    tool_calls,
                } => {
                    let calls: Vec<serde_json::Value> = tool_calls
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "function": { "name": c.name, "arguments": c.args.to_json() },
                            })
                        })
                        .collect();
                    serde_json::json!({
                        "role": "assistant",
                        "content": content,
                        "tool_calls": calls,
                    })
                }
                Message::Tool { name, content, .. } => {
                    serde_json::json!({ "role": "tool", "tool_name": name, "content": content })
                }
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": msgs,
            "stream": false,
            "options": { "temperature": TEMPERATURE },
        });
        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|sig| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": sig.name,
                            "description": sig.description,
                            "parameters": sig.json_schema(),
                        },
                    })
                })
                .collect();
            body["tools"] = serde_json::Value::Array(tools);
        }
        body
    }

    /// Parse an `/api/chat` reply.
    pub fn parse_response(&self, json: &serde_json::Value) -> Result<ChatResponse, LlmError> {
        let message = json.get("message").ok_or_else(|| LlmError::ParseError {
            message: "missing 'message' field".into(),
        })?;

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|c| {
                        let name = c["function"]["name"].as_str()?;
                        Some(ToolCall::new(
                            self.ids.next(),
                            name,
                            ToolInput::from_json(&c["function"]["arguments"]),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content: flatten_content(&message["content"]),
            tool_calls,
        })
    }
}

impl ChatModel for OllamaClient {
    fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let json = post_json(&url, &[], &self.request_body(request), self.timeout_secs)?;
        self.parse_response(&json)
    }

    fn name(&self) -> String {
        format!("ollama/{}", self.model)
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tool::Tool;
    use crate::agent::tools::KgSearchTool;
    use crate::config::Provider;
    use crate::graph::GraphLookup;
    use crate::graph::memory::MemoryGraph;

    fn config() -> LlmConfig {
        LlmConfig {
            provider: Provider::Ollama,
            ..Default::default()
        }
    }

    #[test]
    fn probe_unreachable_returns_error() {
        let mut client = OllamaClient::new(&LlmConfig {
            base_url: Some("http://127.0.0.1:1".into()),
            ..config()
        });
        assert!(matches!(client.probe(), Err(LlmError::Unavailable { .. })));
        assert!(!client.has_model());
    }

    #[test]
    fn default_config_values() {
        let client = OllamaClient::new(&config());
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model(), "llama3.2");
        assert_eq!(client.timeout_secs, 120);
    }

    #[test]
    fn body_declares_tools_and_temperature() {
        let client = OllamaClient::new(&config());
        let search = KgSearchTool::new(GraphLookup::new(std::sync::Arc::new(MemoryGraph::new())));
        let request = ChatRequest::new(vec![
            Message::system("You are the Executor."),
            Message::human("PERFORM SEARCH for entity Tom Hanks"),
        ])
        .with_tools(vec![search.signature()]);

        let body = client.request_body(&request);
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.0);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tools"][0]["function"]["name"], "knowledge_graph_search");
        assert_eq!(
            body["tools"][0]["function"]["parameters"]["required"][0],
            "entity_name"
        );
    }

    #[test]
    fn parses_tool_calls() {
        let client = OllamaClient::new(&config());
        let json = serde_json::json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    { "function": { "name": "knowledge_graph_search",
                                    "arguments": { "entity_name": "Tom Hanks" } } }
                ]
            }
        });
        let resp = client.parse_response(&json).unwrap();
        assert_eq!(resp.tool_calls[0].name, "knowledge_graph_search");
        assert_eq!(resp.tool_calls[0].args.get("entity_name"), Some("Tom Hanks"));
    }

    #[test]
    fn missing_message_is_parse_error() {
        let client = OllamaClient::new(&config());
        assert!(matches!(
            client.parse_response(&serde_json::json!({ "done": true })),
            Err(LlmError::ParseError { .. })
        ));
    }
}

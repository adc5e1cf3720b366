//! Gemini client over the `generateContent` REST API.

use crate::agent::tool::{ToolInput, ToolSignature};
use crate::agent::transcript::{Message, ToolCall};
use crate::config::{ENV_GEMINI_API_KEY, LlmConfig};
use crate::error::ConfigError;

use super::{
    CallIds, ChatModel, ChatRequest, ChatResponse, LlmError, TEMPERATURE, flatten_content, post_json,
};

/// Client for Google's Gemini API.
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    timeout_secs: u64,
    ids: CallIds,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar {
                var: ENV_GEMINI_API_KEY.into(),
            })?;
        Ok(Self {
            api_key,
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            timeout_secs: config.timeout_secs,
            ids: CallIds::default(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Request body for `generateContent`.
    pub fn request_body(request: &ChatRequest) -> serde_json::Value {
        let mut system = Vec::new();
        let mut contents = Vec::new();

        for message in &request.messages {
            match message {
                Message::System { content } => system.push(content.as_str()),
                Message::Human { content } => {
                    if !content.is_empty() {
                        contents.push(serde_json::json!({
                            "role": "user",
                            "parts": [{ "text": content }],
                        }));
                    }
                }
                Message::Assistant {
                    content,
                    tool_calls,
                } => {
                    let mut parts = Vec::new();
                    if !content.is_empty() {
                        parts.push(serde_json::json!({ "text": content }));
                    }
                    for call in tool_calls {
                        parts.push(serde_json::json!({
                            "functionCall": { "name": call.name, "args": call.args.to_json() },
                        }));
                    }
                    if !parts.is_empty() {
                        contents.push(serde_json::json!({ "role": "model", "parts": parts }));
                    }
                }
                Message::Tool { name, content, .. } => {
                    contents.push(serde_json::json!({
                        "role": "user",
                        "parts": [{
                            "functionResponse": {
                                "name": name,
                                "response": { "content": content },
                            },
                        }],
                    }));
                }
            }
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": { "temperature": TEMPERATURE },
        });
        if !system.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": system.join("\n\n") }],
            });
        }
        if !request.tools.is_empty() {
            let declarations: Vec<serde_json::Value> =
                request.tools.iter().map(function_declaration).collect();
            body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
        }
        body
    }

    /// Parse a `generateContent` reply.
    pub fn parse_response(&self, json: &serde_json::Value) -> Result<ChatResponse, LlmError> {
        let Some(candidate) = json["candidates"].get(0) else {
            let reason = json["promptFeedback"]["blockReason"]
                .as_str()
                .unwrap_or("no candidates returned");
            return Err(LlmError::ParseError {
                message: reason.to_string(),
            });
        };

        let parts = candidate["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut tool_calls = Vec::new();
        let mut texts = Vec::new();
        for part in parts {
            if let Some(fc) = part.get("functionCall") {
                let name = fc["name"].as_str().ok_or_else(|| LlmError::ParseError {
                    message: "functionCall without a name".into(),
                })?;
                let id = fc["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| self.ids.next());
                tool_calls.push(ToolCall::new(id, name, ToolInput::from_json(&fc["args"])));
            } else {
                texts.push(part);
            }
        }

        Ok(ChatResponse {
            content: flatten_content(&serde_json::Value::Array(texts)),
            tool_calls,
        })
    }
}

impl ChatModel for GeminiClient {
    fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = Self::request_body(request);
        let json = post_json(
            &self.endpoint(),
            &[("x-goog-api-key", self.api_key.as_str())],
            &body,
            self.timeout_secs,
        )?;
        self.parse_response(&json)
    }

    fn name(&self) -> String {
        format!("gemini/{}", self.model)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"********")
            .finish()
    }
}

/// Gemini wants OpenAPI-style upper-case type names.
fn function_declaration(sig: &ToolSignature) -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = sig
        .parameters
        .iter()
        .map(|p| {
            (
                p.name.clone(),
                serde_json::json!({ "type": "STRING", "description": p.description }),
            )
        })
        .collect();
    let required: Vec<&str> = sig
        .parameters
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();
    serde_json::json!({
        "name": sig.name,
        "description": sig.description,
        "parameters": {
            "type": "OBJECT",
            "properties": properties,
            "required": required,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tool::Tool;
    use crate::agent::tools::KnowledgeGeneratorTool;

    fn client() -> GeminiClient {
        GeminiClient::new(&LlmConfig {
            api_key: Some("test-key".into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn body_folds_system_and_declares_tools() {
        let call = ToolCall::new(
            "call_1",
            "knowledge_generator",
            ToolInput::new().with_param("entity_name", "Keanu Reeves"),
        );
        let request = ChatRequest::new(vec![
            Message::system("You are the Planner."),
            Message::human("Who?"),
            Message::human(""),
            Message::assistant_with_calls("", vec![call.clone()]),
            Message::tool(&call, "Hypothesized: Keanu Reeves has relation X."),
        ])
        .with_tools(vec![KnowledgeGeneratorTool.signature()]);

        let body = GeminiClient::request_body(&request);
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are the Planner."
        );
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(
            contents[1]["parts"][0]["functionCall"]["args"]["entity_name"],
            "Keanu Reeves"
        );
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["name"],
            "knowledge_generator"
        );
        let decl = &body["tools"][0]["functionDeclarations"][0];
        assert_eq!(decl["name"], "knowledge_generator");
        assert_eq!(decl["parameters"]["type"], "OBJECT");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn temperature_in_config_file_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("duo.toml");
        std::fs::write(&path, "[llm]\napi_key = \"k\"\ntemperature = 0.9\n").unwrap();
        let config = crate::config::DuoConfig::from_file(&path).unwrap();
        GeminiClient::new(&config.llm).unwrap();

        let body = GeminiClient::request_body(&ChatRequest::new(vec![Message::human("Who?")]));
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn parses_text_parts() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "role": "model", "parts": [
                { "text": "FINAL ANSWER: " },
                { "text": "None" }
            ]}}]
        });
        let resp = client().parse_response(&json).unwrap();
        assert_eq!(resp.content, "FINAL ANSWER: None");
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn parses_function_calls_with_generated_ids() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [
                { "functionCall": { "name": "knowledge_graph_search",
                                    "args": { "entity_name": "Tom Hanks" } } }
            ]}}]
        });
        let c = client();
        let resp = c.parse_response(&json).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].id, "call_1");
        assert_eq!(resp.tool_calls[0].args.get("entity_name"), Some("Tom Hanks"));
        assert_eq!(c.parse_response(&json).unwrap().tool_calls[0].id, "call_2");
    }

    #[test]
    fn blocked_prompt_is_parse_error() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        match client().parse_response(&json) {
            Err(LlmError::ParseError { message }) => assert_eq!(message, "SAFETY"),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn debug_hides_key() {
        assert!(!format!("{:?}", client()).contains("test-key"));
    }
}

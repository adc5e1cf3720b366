//! Scripted chat model: replays canned replies in order and records every
//! request it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ChatModel, ChatRequest, ChatResponse, LlmError};

/// A model whose replies are fixed up front.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    /// Reply used once the script runs out; an error when `None`.
    fallback: Option<ChatResponse>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ChatResponse, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Successful replies only.
    pub fn replies(replies: Vec<ChatResponse>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    /// The same reply forever.
    pub fn always(reply: ChatResponse) -> Self {
        Self::new(Vec::new()).with_fallback(reply)
    }

    pub fn with_fallback(mut self, reply: ChatResponse) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl ChatModel for ScriptedModel {
    fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(LlmError::RequestFailed {
                message: "script exhausted".into(),
            }),
        }
    }

    fn name(&self) -> String {
        "scripted".into()
    }
}

impl std::fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::transcript::Message;

    fn request() -> ChatRequest {
        ChatRequest::new(vec![Message::human("hi")])
    }

    #[test]
    fn replays_in_order_then_fails() {
        let model = ScriptedModel::replies(vec![ChatResponse::text("one"), ChatResponse::text("two")]);
        assert_eq!(model.complete(&request()).unwrap().content, "one");
        assert_eq!(model.complete(&request()).unwrap().content, "two");
        assert!(model.complete(&request()).is_err());
        assert_eq!(model.call_count(), 3);
    }

    #[test]
    fn fallback_repeats() {
        let model = ScriptedModel::always(ChatResponse::text("again"));
        for _ in 0..3 {
            assert_eq!(model.complete(&request()).unwrap().content, "again");
        }
        assert_eq!(model.requests().len(), 3);
    }
}

//! Executor role: turns one search directive into exactly one graph lookup.

use std::sync::Arc;

use crate::graph::GraphLookup;

use super::error::{AgentError, AgentResult};
use super::llm::{ChatModel, ChatRequest};
use super::tool::ToolRegistry;
use super::tools::KgSearchTool;
use super::transcript::Message;

/// Fixed executor instructions.
pub const EXECUTOR_PROMPT: &str =
    "You are the Executor. If told to search, use 'knowledge_graph_search' immediately.";

/// Result of one executor call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorOutput {
    /// The lookup ran; `text` is the formatted result or failure notice.
    Searched { text: String, connections: usize },
    /// The model did not request the search tool; nothing was looked up.
    Declined,
}

pub struct Executor {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    lookup_retries: u32,
}

impl Executor {
    /// An executor offered only the knowledge graph search tool.
    pub fn new(model: Arc<dyn ChatModel>, lookup: GraphLookup) -> Self {
        Self {
            model,
            tools: ToolRegistry::new().with(Box::new(KgSearchTool::new(lookup))),
            lookup_retries: 0,
        }
    }

    /// Extra attempts for connection failures and timeouts.
    pub fn with_lookup_retries(mut self, retries: u32) -> Self {
        self.lookup_retries = retries;
        self
    }

    /// Ask the model to search for `entity` and run its first tool call.
    ///
    /// Authentication failures are returned as errors; other lookup failures
    /// become a notice in the output text after retries are spent.
    pub fn execute(&self, entity: &str) -> AgentResult<ExecutorOutput> {
        let request = ChatRequest::new(vec![
            Message::system(EXECUTOR_PROMPT),
            Message::human(format!("PERFORM SEARCH for entity {entity}")),
        ])
        .with_tools(self.tools.list());

        let response = self
            .model
            .complete(&request)
            .map_err(|source| AgentError::Executor {
                entity: entity.to_string(),
                source,
            })?;

        let Some(call) = response.tool_calls.into_iter().next() else {
            return Ok(ExecutorOutput::Declined);
        };

        let mut attempt = 0;
        loop {
            match self.tools.execute(&call.name, call.args.clone()) {
                Ok(out) => {
                    let connections = out.result.lines().filter(|l| l.starts_with("- ")).count();
                    return Ok(ExecutorOutput::Searched {
                        text: out.result,
                        connections,
                    });
                }
                Err(AgentError::Lookup(e)) if e.is_transient() && attempt < self.lookup_retries => {
                    attempt += 1;
                    tracing::warn!(entity, attempt, error = %e, "executor: retrying lookup");
                }
                Err(AgentError::Lookup(e @ crate::error::LookupError::Auth { .. })) => {
                    return Err(AgentError::Lookup(e));
                }
                Err(AgentError::Lookup(e)) => {
                    return Ok(ExecutorOutput::Searched {
                        text: format!("Search failed for {entity}: {e}"),
                        connections: 0,
                    });
                }
                Err(other) => return Err(other),
            }
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("model", &self.model.name())
            .field("tools", &self.tools)
            .field("lookup_retries", &self.lookup_retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::agent::llm::{ChatResponse, LlmError, ScriptedModel};
    use crate::agent::tool::ToolInput;
    use crate::error::LookupError;
    use crate::graph::memory::MemoryGraph;
    use crate::graph::{Edge, GraphStore};

    fn search_call(entity: &str) -> ChatResponse {
        ChatResponse::tool_call(
            "call_1",
            "knowledge_graph_search",
            ToolInput::new().with_param("entity_name", entity),
        )
    }

    fn movies() -> GraphLookup {
        GraphLookup::new(Arc::new(MemoryGraph::movie_sample()))
    }

    /// Fails the first `failures` lookups with `err`, then answers with one edge.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        err: fn() -> LookupError,
    }

    impl GraphStore for Flaky {
        fn try_lookup(&self, _entity_name: &str) -> Result<Vec<Edge>, LookupError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.err)())
            } else {
                Ok(vec![Edge::new("ACTED_IN", "Big", "Movie")])
            }
        }

        fn describe(&self) -> String {
            "flaky".into()
        }
    }

    fn timeout() -> LookupError {
        LookupError::Timeout { timeout_secs: 1 }
    }

    fn auth() -> LookupError {
        LookupError::Auth {
            user: "neo4j".into(),
        }
    }

    #[test]
    fn searches_with_model_arguments() {
        let model = Arc::new(ScriptedModel::replies(vec![search_call("Tom Hanks")]));
        let executor = Executor::new(model.clone(), movies());

        match executor.execute("Tom Hanks").unwrap() {
            ExecutorOutput::Searched { text, connections } => {
                assert_eq!(connections, 5);
                assert!(text.starts_with("- ACTED_IN -> Big (Movie)"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let req = &model.requests()[0];
        assert_eq!(req.messages[0].content(), EXECUTOR_PROMPT);
        assert_eq!(req.messages[1].content(), "PERFORM SEARCH for entity Tom Hanks");
        assert_eq!(req.tools[0].name, "knowledge_graph_search");
    }

    #[test]
    fn declining_model_performs_no_search() {
        let model = Arc::new(ScriptedModel::replies(vec![ChatResponse::text("I'd rather not.")]));
        let executor = Executor::new(model, movies());
        assert_eq!(executor.execute("Tom Hanks").unwrap(), ExecutorOutput::Declined);
    }

    #[test]
    fn model_failure_is_executor_error() {
        let model = Arc::new(ScriptedModel::new(vec![Err(LlmError::RequestFailed {
            message: "boom".into(),
        })]));
        let executor = Executor::new(model, movies());
        assert!(matches!(
            executor.execute("Tom Hanks"),
            Err(AgentError::Executor { .. })
        ));
    }

    #[test]
    fn transient_failures_are_retried() {
        let store = Arc::new(Flaky {
            failures: 1,
            calls: AtomicUsize::new(0),
            err: timeout,
        });
        let model = Arc::new(ScriptedModel::replies(vec![search_call("Tom Hanks")]));
        let executor = Executor::new(model, GraphLookup::new(store.clone())).with_lookup_retries(1);

        let out = executor.execute("Tom Hanks").unwrap();
        assert_eq!(
            out,
            ExecutorOutput::Searched {
                text: "- ACTED_IN -> Big (Movie)".into(),
                connections: 1,
            }
        );
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn exhausted_retries_become_notice() {
        let store = Arc::new(Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
            err: timeout,
        });
        let model = Arc::new(ScriptedModel::replies(vec![search_call("Tom Hanks")]));
        let executor = Executor::new(model, GraphLookup::new(store.clone())).with_lookup_retries(2);

        match executor.execute("Tom Hanks").unwrap() {
            ExecutorOutput::Searched { text, connections } => {
                assert!(text.starts_with("Search failed for Tom Hanks"));
                assert_eq!(connections, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn auth_failure_is_not_retried() {
        let store = Arc::new(Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
            err: auth,
        });
        let model = Arc::new(ScriptedModel::replies(vec![search_call("Tom Hanks")]));
        let executor = Executor::new(model, GraphLookup::new(store.clone())).with_lookup_retries(3);

        assert!(matches!(
            executor.execute("Tom Hanks"),
            Err(AgentError::Lookup(LookupError::Auth { .. }))
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}

//! Orchestration loop: alternates planner and executor for a bounded number
//! of steps.
//!
//! ```text
//! Planning ──tool call──▶ ToolDispatch ──▶ Planning
//! Planning ──search────▶ Searching ────▶ Planning
//! Planning ──final─────▶ Terminated (Answered)
//! budget spent / planner error / cancel ──▶ Terminated
//! ```
//!
//! Each step completes fully before the next begins. A step whose planner
//! output carries no recognised directive still consumes budget.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::RunConfig;
use crate::error::LookupError;
use crate::graph::GraphLookup;

use super::directive::Directive;
use super::error::AgentError;
use super::executor::{Executor, ExecutorOutput};
use super::llm::ChatModel;
use super::planner::{PLANNER_PROMPT, Planner, PlannerOutput};
use super::tools::fabricate;
use super::transcript::{Memory, Message, ToolCall, Transcript};

/// Loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Planning,
    ToolDispatch,
    Searching,
    Terminated,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Planning => "planning",
            LoopState::ToolDispatch => "tool-dispatch",
            LoopState::Searching => "searching",
            LoopState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The planner emitted the final-answer marker; the text is verbatim.
    Answered(String),
    /// The step budget ran out first.
    Inconclusive,
    /// A fatal error stopped the run.
    Failed(AgentError),
    /// The cancel flag was raised between steps.
    Cancelled,
}

impl RunOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            RunOutcome::Answered(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, RunOutcome::Answered(_))
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Planner invocations made.
    pub steps: usize,
    pub transcript: Transcript,
    pub memory: Memory,
    /// States entered, in order, without repeats of the current state.
    pub states: Vec<LoopState>,
}

/// Shared flag that stops a run before its next step.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for signal handler registration.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// Drives one question through the planner/executor loop.
#[derive(Debug)]
pub struct Orchestrator {
    planner: Planner,
    executor: Executor,
    max_steps: usize,
    cancel: CancelFlag,
}

impl Orchestrator {
    /// Both roles share `model`; the executor searches through `lookup`.
    pub fn new(model: Arc<dyn ChatModel>, lookup: GraphLookup, run: &RunConfig) -> Self {
        Self {
            planner: Planner::new(Arc::clone(&model)),
            executor: Executor::new(model, lookup).with_lookup_retries(run.lookup_retries),
            max_steps: run.max_steps,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Answer `question`, or report why no answer was reached.
    pub fn run(&self, question: &str) -> RunReport {
        let mut run = Run {
            transcript: Transcript::seeded(PLANNER_PROMPT, question),
            memory: Memory::new(),
            states: vec![LoopState::Planning],
            steps: 0,
        };

        tracing::info!(max_steps = self.max_steps, "starting dual-agent run");

        for step in 1..=self.max_steps {
            if self.cancel.is_cancelled() {
                tracing::info!(step, "run cancelled");
                return run.finish(RunOutcome::Cancelled);
            }

            tracing::info!(step, "planner's turn");
            let output = match self.planner.plan(&run.transcript, &run.memory.summary()) {
                Ok(output) => output,
                Err(source) => {
                    tracing::error!(step, error = %source, "planner call failed");
                    run.steps = step;
                    return run.finish(RunOutcome::Failed(AgentError::Planner { step, source }));
                }
            };
            run.steps = step;

            match output {
                PlannerOutput::ToolInvocation { content, calls } => {
                    run.enter(LoopState::ToolDispatch);
                    self.dispatch(content, calls, &mut run);
                }
                PlannerOutput::FreeText(text) => match Directive::parse(&text) {
                    Some(Directive::FinalAnswer(answer)) => {
                        tracing::info!(step, "final answer");
                        return run.finish(RunOutcome::Answered(answer));
                    }
                    Some(Directive::Search(entity)) => {
                        run.enter(LoopState::Searching);
                        if let Err(e) = self.search(&entity, &mut run) {
                            return run.finish(RunOutcome::Failed(e));
                        }
                    }
                    Some(Directive::Fabricate { .. }) | None => {
                        tracing::info!(step, "no directive recognised");
                    }
                },
            }
            run.enter(LoopState::Planning);
        }

        tracing::info!(steps = run.steps, "loop ended without final answer");
        run.finish(RunOutcome::Inconclusive)
    }

    /// Record the tool-call message, then one result per call.
    fn dispatch(&self, content: String, calls: Vec<ToolCall>, run: &mut Run) {
        run.transcript
            .push(Message::assistant_with_calls(content, calls.clone()));

        for call in &calls {
            let result = match Directive::from_tool_call(&call.name, &call.args) {
                Some(Directive::Fabricate { entity, relation }) => {
                    tracing::info!(%entity, %relation, "planner: hypothesizing missing data");
                    let fact = fabricate(&entity, &relation);
                    run.memory.record(fact.clone());
                    fact
                }
                _ => match self.planner.tools().execute(&call.name, call.args.clone()) {
                    Ok(out) => out.result,
                    Err(e) => {
                        tracing::warn!(tool = %call.name, error = %e, "planner tool call failed");
                        format!("Error: {e}")
                    }
                },
            };
            run.transcript.push(Message::tool(call, result));
        }
    }

    /// Run the executor; only an authentication failure escapes.
    fn search(&self, entity: &str, run: &mut Run) -> Result<(), AgentError> {
        tracing::info!(entity, "planner instruction: search");
        match self.executor.execute(entity) {
            Ok(ExecutorOutput::Searched { text, connections }) => {
                tracing::info!(entity, connections, "executor: search complete");
                run.transcript.push(Message::assistant(format!(
                    "Search Results for {entity}:\n{text}"
                )));
                Ok(())
            }
            Ok(ExecutorOutput::Declined) => {
                tracing::info!(entity, "executor did not call the search tool");
                Ok(())
            }
            Err(e @ AgentError::Lookup(LookupError::Auth { .. })) => {
                tracing::error!(entity, error = %e, "graph store rejected credentials");
                Err(e)
            }
            Err(e) => {
                tracing::warn!(entity, error = %e, "executor step failed");
                Ok(())
            }
        }
    }
}

/// Mutable state owned by a single run.
struct Run {
    transcript: Transcript,
    memory: Memory,
    states: Vec<LoopState>,
    steps: usize,
}

impl Run {
    /// Record a transition; staying in the same state records nothing.
    fn enter(&mut self, state: LoopState) {
        if self.states.last() == Some(&state) {
            return;
        }
        tracing::debug!(%state, "transition");
        self.states.push(state);
    }

    fn finish(mut self, outcome: RunOutcome) -> RunReport {
        self.enter(LoopState::Terminated);
        RunReport {
            outcome,
            steps: self.steps,
            transcript: self.transcript,
            memory: self.memory,
            states: self.states,
        }
    }
}

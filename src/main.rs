//! kg-duo CLI: planner/executor question answering over a knowledge graph.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use kg_duo::agent::llm::{self, ChatModel, OllamaClient};
use kg_duo::agent::{CancelFlag, Orchestrator, RunOutcome};
use kg_duo::config::{self, DuoConfig, ENV_OLLAMA_URL, GraphConfig, Provider};
use kg_duo::graph::memory::MemoryGraph;
use kg_duo::graph::{GraphLookup, GraphStore};

const DEFAULT_QUESTION: &str = "What movie did both Tom Hanks and Keanu Reeves act in?";

#[derive(Parser)]
#[command(
    name = "kg-duo",
    version,
    about = "Planner/executor question answering over a knowledge graph"
)]
struct Cli {
    /// TOML config file; environment variables override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use a built-in sample movie graph instead of Neo4j.
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question with the planner/executor loop.
    Ask {
        /// The question to answer.
        question: Option<String>,

        /// Maximum planner steps before giving up.
        #[arg(long, value_parser = config::parse_max_steps)]
        max_steps: Option<usize>,

        /// Chat model backend.
        #[arg(long, value_enum)]
        provider: Option<Provider>,

        /// Model name for the selected backend.
        #[arg(long)]
        model: Option<String>,
    },

    /// Run one one-hop lookup and print the connections.
    Lookup {
        /// Exact entity name, e.g. "Tom Hanks".
        entity: String,

        /// Maximum connections to print.
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Print the effective configuration with secrets redacted.
    Config,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = DuoConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask {
            question,
            max_steps,
            provider,
            model,
        } => {
            if let Some(p) = provider.filter(|p| *p != config.llm.provider) {
                // A base URL loaded for the other backend does not apply.
                config.llm.provider = p;
                config.llm.base_url = match p {
                    Provider::Ollama => std::env::var(ENV_OLLAMA_URL).ok(),
                    Provider::Gemini => None,
                };
            }
            if let Some(n) = max_steps {
                config.run.max_steps = n;
            }
            if model.is_some() {
                config.llm.model = model;
            }

            let store = open_store(&config.graph, cli.demo)?;
            let chat = open_model(&config)?;
            tracing::info!(model = %chat.name(), store = %store.describe(), "ready");

            let cancel = CancelFlag::new();
            signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.handle())
                .into_diagnostic()?;

            let orchestrator = Orchestrator::new(chat, GraphLookup::new(store), &config.run)
                .with_cancel(cancel);

            let question = question.unwrap_or_else(|| DEFAULT_QUESTION.to_string());
            println!("--- Question: {question}");
            let report = orchestrator.run(&question);

            match report.outcome {
                RunOutcome::Answered(text) => println!("\n{text}"),
                RunOutcome::Inconclusive => println!(
                    "\nLoop ended without final answer after {} step(s).",
                    report.steps
                ),
                RunOutcome::Cancelled => println!("\nCancelled after {} step(s).", report.steps),
                RunOutcome::Failed(e) => return Err(e.into()),
            }
            if !report.memory.is_empty() {
                println!("\nHypothesized facts (not in the graph):");
                for fact in report.memory.facts() {
                    println!("  - {fact}");
                }
            }
        }

        Commands::Lookup { entity, limit } => {
            let store = open_store(&config.graph, cli.demo)?;
            let edges = GraphLookup::new(store).try_lookup(&entity).or_else(|e| match e {
                kg_duo::error::LookupError::NotFound { .. } => Ok(Vec::new()),
                other => Err(other),
            })?;

            println!("Results for '{entity}' ({} connections found):", edges.len());
            for edge in edges.iter().take(limit) {
                println!("  -> ({}) -> {} ({})", edge.relation, edge.neighbor, edge.neighbor_type);
            }
            if edges.len() > limit {
                println!("  ... {} more", edges.len() - limit);
            }
        }

        Commands::Config => {
            let shown = toml::to_string_pretty(&config.redacted()).into_diagnostic()?;
            println!("{shown}");
        }
    }

    Ok(())
}

fn open_store(graph: &GraphConfig, demo: bool) -> Result<Arc<dyn GraphStore>> {
    if demo {
        return Ok(Arc::new(MemoryGraph::movie_sample()));
    }
    open_neo4j(graph)
}

#[cfg(feature = "neo4j")]
fn open_neo4j(graph: &GraphConfig) -> Result<Arc<dyn GraphStore>> {
    let store = kg_duo::graph::neo4j::Neo4jStore::new(graph)?;
    store.verify_connectivity()?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "neo4j"))]
fn open_neo4j(_graph: &GraphConfig) -> Result<Arc<dyn GraphStore>> {
    miette::bail!("built without the `neo4j` feature; pass --demo to use the sample graph")
}

fn open_model(config: &DuoConfig) -> Result<Arc<dyn ChatModel>> {
    if config.llm.provider == Provider::Ollama {
        let mut client = OllamaClient::new(&config.llm);
        client.probe()?;
        if !client.has_model() {
            tracing::warn!(model = client.model(), "model not pulled locally; run `ollama pull`");
        }
        return Ok(Arc::new(client));
    }
    Ok(Arc::from(llm::from_config(&config.llm)?))
}

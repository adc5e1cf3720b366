//! Run configuration: graph store, language model, and loop settings.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables. Nothing is read from ambient global state after
//! loading; the resulting [`DuoConfig`] is passed explicitly to constructors.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_NEO4J_URI: &str = "NEO4J_URI";
pub const ENV_NEO4J_USERNAME: &str = "NEO4J_USERNAME";
pub const ENV_NEO4J_PASSWORD: &str = "NEO4J_PASSWORD";
pub const ENV_NEO4J_DATABASE: &str = "NEO4J_DATABASE";
pub const ENV_NEO4J_ENTITY_LABEL: &str = "NEO4J_ENTITY_LABEL";
pub const ENV_PROVIDER: &str = "KG_DUO_PROVIDER";
pub const ENV_MODEL: &str = "KG_DUO_MODEL";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_OLLAMA_URL: &str = "OLLAMA_URL";
pub const ENV_MAX_STEPS: &str = "KG_DUO_MAX_STEPS";

const REDACTED: &str = "********";

/// Which chat model backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini `generateContent` API.
    #[default]
    Gemini,
    /// Local Ollama server.
    Ollama,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.0-flash",
            Provider::Ollama => "llama3.2",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::Ollama => "http://localhost:11434",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "ollama" => Ok(Provider::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_PROVIDER.into(),
                value: s.into(),
                expected: "Use \"gemini\" or \"ollama\".".into(),
            }),
        }
    }
}

/// Graph store connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Bolt URI, e.g. `neo4j+s://xxxx.databases.neo4j.io`.
    pub uri: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Database name; the server default when unset.
    pub database: Option<String>,
    /// Restrict the start node to this label (e.g. `Person`).
    pub entity_label: Option<String>,
    /// Per-lookup timeout in seconds (default: 30).
    pub timeout_secs: u64,
    /// Connection pool size (default: 2).
    pub max_connections: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: None,
            user: None,
            password: None,
            database: None,
            entity_label: None,
            timeout_secs: 30,
            max_connections: 2,
        }
    }
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("database", &self.database)
            .field("entity_label", &self.entity_label)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Validated graph connection parameters.
#[derive(Clone)]
pub struct GraphCredentials {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for GraphCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCredentials")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &REDACTED)
            .finish()
    }
}

impl GraphConfig {
    /// Fail fast unless URI, user, and password are all present.
    pub fn credentials(&self) -> Result<GraphCredentials, ConfigError> {
        let uri = require(&self.uri, ENV_NEO4J_URI)?;
        let user = require(&self.user, ENV_NEO4J_USERNAME)?;
        let password = require(&self.password, ENV_NEO4J_PASSWORD)?;
        if let Some(label) = &self.entity_label {
            if !is_identifier(label) {
                return Err(ConfigError::InvalidValue {
                    key: ENV_NEO4J_ENTITY_LABEL.into(),
                    value: label.clone(),
                    expected: "Labels may only contain ASCII letters, digits and '_'.".into(),
                });
            }
        }
        Ok(GraphCredentials {
            uri,
            user,
            password,
        })
    }
}

/// Chat model settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    /// Model name; the provider default when unset.
    pub model: Option<String>,
    /// API key (required for Gemini).
    pub api_key: Option<String>,
    /// API base URL; the provider default when unset.
    pub base_url: Option<String>,
    /// Per-request timeout in seconds (default: 120).
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            api_key: None,
            base_url: None,
            timeout_secs: 120,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model())
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("base_url", &self.base_url())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    /// Fail fast when the selected provider needs a credential that is absent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider == Provider::Gemini {
            require(&self.api_key, ENV_GEMINI_API_KEY)?;
        }
        Ok(())
    }
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum planner iterations per question (default: 8).
    pub max_steps: usize,
    /// Extra attempts for a lookup that failed transiently (default: 1).
    pub lookup_retries: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 8,
            lookup_retries: 1,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuoConfig {
    pub graph: GraphConfig,
    pub llm: LlmConfig,
    pub run: RunConfig,
}

impl DuoConfig {
    /// Defaults, overlaid by `path` (if given), overlaid by the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if config.run.max_steps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "run.max_steps".into(),
                value: "0".into(),
                expected: MAX_STEPS_EXPECTED.into(),
            });
        }
        Ok(config)
    }

    /// Overlay values from an environment-like source. Empty values are ignored.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_NEO4J_URI) {
            self.graph.uri = Some(v);
        }
        if let Some(v) = get(ENV_NEO4J_USERNAME) {
            self.graph.user = Some(v);
        }
        if let Some(v) = get(ENV_NEO4J_PASSWORD) {
            self.graph.password = Some(v);
        }
        if let Some(v) = get(ENV_NEO4J_DATABASE) {
            self.graph.database = Some(v);
        }
        if let Some(v) = get(ENV_NEO4J_ENTITY_LABEL) {
            self.graph.entity_label = Some(v);
        }
        if let Some(v) = get(ENV_PROVIDER) {
            self.llm.provider = v.parse()?;
        }
        if let Some(v) = get(ENV_MODEL) {
            self.llm.model = Some(v);
        }
        if let Some(v) = get(ENV_GEMINI_API_KEY) {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get(ENV_OLLAMA_URL) {
            if self.llm.provider == Provider::Ollama {
                self.llm.base_url = Some(v);
            }
        }
        if let Some(v) = get(ENV_MAX_STEPS) {
            self.run.max_steps = parse_max_steps(&v)?;
        }
        Ok(())
    }

    /// A copy with every secret replaced, safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.graph.password.is_some() {
            copy.graph.password = Some(REDACTED.into());
        }
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some(REDACTED.into());
        }
        copy
    }
}

const MAX_STEPS_EXPECTED: &str = "Use a positive integer.";

/// Parse a step budget; zero is rejected because the loop would never run.
pub fn parse_max_steps(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: ENV_MAX_STEPS.into(),
            value: value.into(),
            expected: MAX_STEPS_EXPECTED.into(),
        }),
    }
}

fn require(value: &Option<String>, var: &str) -> Result<String, ConfigError> {
    value
        .as_ref()
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingVar { var: var.into() })
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn default_config_values() {
        let config = DuoConfig::default();
        assert_eq!(config.run.max_steps, 8);
        assert_eq!(config.llm.provider, Provider::Gemini);
        assert_eq!(config.llm.model(), "gemini-2.0-flash");
        assert_eq!(config.graph.timeout_secs, 30);
    }

    #[test]
    fn env_overlay_fills_credentials() {
        let mut config = DuoConfig::default();
        config
            .apply_env(env(&[
                (ENV_NEO4J_URI, "neo4j://localhost:7687"),
                (ENV_NEO4J_USERNAME, "neo4j"),
                (ENV_NEO4J_PASSWORD, "secret"),
                (ENV_GEMINI_API_KEY, "key"),
                (ENV_MAX_STEPS, "3"),
            ]))
            .unwrap();

        let creds = config.graph.credentials().unwrap();
        assert_eq!(creds.uri, "neo4j://localhost:7687");
        assert_eq!(creds.user, "neo4j");
        assert_eq!(config.run.max_steps, 3);
        assert!(config.llm.validate().is_ok());
    }

    #[test]
    fn missing_password_names_the_variable() {
        let mut config = DuoConfig::default();
        config
            .apply_env(env(&[
                (ENV_NEO4J_URI, "neo4j://localhost:7687"),
                (ENV_NEO4J_USERNAME, "neo4j"),
                (ENV_NEO4J_PASSWORD, "  "),
            ]))
            .unwrap();

        match config.graph.credentials() {
            Err(ConfigError::MissingVar { var }) => assert_eq!(var, ENV_NEO4J_PASSWORD),
            other => panic!("expected MissingVar, got {other:?}"),
        }
    }

    #[test]
    fn gemini_requires_api_key_but_ollama_does_not() {
        let mut config = DuoConfig::default();
        assert!(matches!(
            config.llm.validate(),
            Err(ConfigError::MissingVar { .. })
        ));

        config.apply_env(env(&[(ENV_PROVIDER, "Ollama")])).unwrap();
        assert_eq!(config.llm.provider, Provider::Ollama);
        assert_eq!(config.llm.model(), "llama3.2");
        assert!(config.llm.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = DuoConfig::default();
        assert!(config.apply_env(env(&[(ENV_PROVIDER, "gpt")])).is_err());
        assert!(config.apply_env(env(&[(ENV_MAX_STEPS, "many")])).is_err());
    }

    #[test]
    fn zero_step_budget_is_rejected() {
        let mut config = DuoConfig::default();
        assert!(matches!(
            config.apply_env(env(&[(ENV_MAX_STEPS, "0")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(config.run.max_steps, 8);

        assert_eq!(parse_max_steps(" 3 ").unwrap(), 3);
        assert!(parse_max_steps("0").is_err());
        assert!(parse_max_steps("-1").is_err());

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("zero.toml");
        std::fs::write(&path, "[run]\nmax_steps = 0\n").unwrap();
        match DuoConfig::from_file(&path) {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "run.max_steps"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn entity_label_must_be_identifier() {
        let mut config = DuoConfig::default();
        config.graph.uri = Some("neo4j://h".into());
        config.graph.user = Some("u".into());
        config.graph.password = Some("p".into());
        config.graph.entity_label = Some("Person) DETACH DELETE (n".into());
        assert!(matches!(
            config.graph.credentials(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn toml_file_then_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("duo.toml");
        std::fs::write(
            &path,
            "[graph]\nuri = \"neo4j://file:7687\"\nentity_label = \"Person\"\n\n[run]\nmax_steps = 5\n",
        )
        .unwrap();

        let mut config = DuoConfig::from_file(&path).unwrap();
        assert_eq!(config.graph.uri.as_deref(), Some("neo4j://file:7687"));
        assert_eq!(config.run.max_steps, 5);
        assert_eq!(config.run.lookup_retries, 1);

        config
            .apply_env(env(&[(ENV_NEO4J_URI, "neo4j://env:7687")]))
            .unwrap();
        assert_eq!(config.graph.uri.as_deref(), Some("neo4j://env:7687"));
        assert_eq!(config.graph.entity_label.as_deref(), Some("Person"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[run\nmax_steps = ").unwrap();
        assert!(matches!(
            DuoConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn redaction_hides_secrets() {
        let mut config = DuoConfig::default();
        config.graph.password = Some("hunter2".into());
        config.llm.api_key = Some("AIza-secret".into());

        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("AIza-secret"));
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}

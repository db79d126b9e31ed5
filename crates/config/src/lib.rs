//! Configuration loading, validation, and management for Caduceus.
//!
//! Loads configuration from `~/.caduceus/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use caduceus_core::PromptBudget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Names accepted in `grounding.chain`, in their default order.
pub const KNOWN_SOURCES: &[&str] = &[
    "wikipedia",
    "medlineplus",
    "cdc",
    "mayo",
    "semantic_scholar",
    "pubmed",
];

/// The root configuration structure.
///
/// Maps directly to `~/.caduceus/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Token budget for the composed prompt
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Conversation history handling
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Evidence gathering
    #[serde(default)]
    pub grounding: GroundingConfig,

    /// Outbound HTTP to knowledge sources
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Text-generation backends
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Tokens reserved for the completion.
    #[serde(default = "default_generate_tokens")]
    pub generate_tokens: usize,

    /// Ceiling on trimming iterations before the hard-truncation fallback.
    #[serde(default = "default_max_trim_iterations")]
    pub max_trim_iterations: usize,
}

fn default_context_window() -> usize {
    1024
}
fn default_generate_tokens() -> usize {
    400
}
fn default_max_trim_iterations() -> usize {
    64
}

impl BudgetConfig {
    pub fn prompt_budget(&self) -> PromptBudget {
        PromptBudget::new(self.context_window, self.generate_tokens)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            context_window: default_context_window(),
            generate_tokens: default_generate_tokens(),
            max_trim_iterations: default_max_trim_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Most recent turns considered live.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// User text longer than this (in chars) may be shortened by the trimmer.
    #[serde(default = "default_user_text_floor")]
    pub user_text_floor: usize,
}

fn default_history_limit() -> usize {
    3
}
fn default_user_text_floor() -> usize {
    256
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            user_text_floor: default_user_text_floor(),
        }
    }
}

/// How the external lookup chain is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainMode {
    /// Query one source at a time, stop at the first hit.
    #[default]
    Sequential,
    /// Query every source at once, keep the first hit in chain order.
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingConfig {
    #[serde(default = "default_max_evidence")]
    pub max_evidence: usize,

    #[serde(default = "default_max_terms")]
    pub max_terms: usize,

    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,

    /// Key terms looked up in the dictionary per request.
    #[serde(default = "default_max_definitions")]
    pub max_definitions: usize,

    #[serde(default = "default_true")]
    pub dictionary: bool,

    /// External lookup chain, highest priority first.
    #[serde(default = "default_chain")]
    pub chain: Vec<String>,

    #[serde(default)]
    pub chain_mode: ChainMode,

    /// Extra reference entries (TOML, `[[entries]]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_file: Option<PathBuf>,

    /// Replaces the built-in clinical system preamble.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_max_evidence() -> usize {
    3
}
fn default_max_terms() -> usize {
    5
}
fn default_max_sentences() -> usize {
    2
}
fn default_max_definitions() -> usize {
    3
}
fn default_true() -> bool {
    true
}
fn default_chain() -> Vec<String> {
    KNOWN_SOURCES.iter().map(|s| s.to_string()).collect()
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            max_evidence: default_max_evidence(),
            max_terms: default_max_terms(),
            max_sentences: default_max_sentences(),
            max_definitions: default_max_definitions(),
            dictionary: true,
            chain: default_chain(),
            chain_mode: ChainMode::default(),
            reference_file: None,
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Per-request timeout for every outbound fetch.
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_source_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    concat!("caduceus/", env!("CARGO_PKG_VERSION"), " (clinical grounding)").into()
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_source_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Which key/value store backs the cache.
///
/// In TOML the unit backends are plain strings (`backend = "file"`) and Redis
/// is a table (`backend = { redis = { url = "redis://cache:6379" } }`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    File,
    Redis {
        #[serde(default = "default_redis_url")]
        url: String,
    },
    None,
}

pub fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".into()
}

impl FromStr for CacheBackend {
    type Err = ConfigError;

    /// Accepts a backend name, or a `redis://`/`rediss://` URL for Redis.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with("redis://") || trimmed.starts_with("rediss://") {
            return Ok(Self::Redis {
                url: trimmed.to_string(),
            });
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "redis" => Ok(Self::Redis {
                url: default_redis_url(),
            }),
            "none" => Ok(Self::None),
            other => Err(ConfigError::ValidationError(format!(
                "unknown cache backend '{other}' (expected memory, file, redis, a redis:// URL or none)"
            ))),
        }
    }
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Redis { .. } => "redis",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Directory for the file backend. Defaults to `~/.caduceus/cache`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Store "no result" values so repeated empty lookups are skipped.
    #[serde(default = "default_true")]
    pub cache_empty_results: bool,

    /// Strings inside cached values are cut to this many chars.
    #[serde(default = "default_max_value_chars")]
    pub max_value_chars: usize,

    /// Entry ceiling for the memory backend.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl_secs() -> u64 {
    86_400
}
fn default_max_value_chars() -> usize {
    4000
}
fn default_max_entries() -> usize {
    10_000
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("cache"))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            ttl_secs: default_ttl_secs(),
            dir: None,
            cache_empty_results: true,
            max_value_chars: default_max_value_chars(),
            max_entries: default_max_entries(),
        }
    }
}

/// Protocol spoken by a generation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// llama.cpp server (`/completion`, `/tokenize`, `/health`).
    Llamacpp,
    /// OpenAI-compatible legacy completions (`/completions`).
    Openai,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub kind: EndpointKind,

    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_endpoint_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint_timeout() -> u64 {
    120
}

impl EndpointConfig {
    pub fn llamacpp(base_url: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::Llamacpp,
            base_url: base_url.into(),
            api_key: None,
            model: None,
            timeout_secs: default_endpoint_timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_stop")]
    pub stop: Vec<String>,

    /// Tried in order. Empty means generation is unavailable.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointConfig>,

    /// `tokenizer.json` for local token counting (`local` feature).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_file: Option<PathBuf>,
}

fn default_temperature() -> f32 {
    0.2
}
fn default_stop() -> Vec<String> {
    vec!["User:".into(), "AI:".into()]
}
fn default_endpoints() -> Vec<EndpointConfig> {
    vec![EndpointConfig::llamacpp("http://127.0.0.1:8080")]
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            stop: default_stop(),
            endpoints: default_endpoints(),
            tokenizer_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".into()]
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.caduceus/config.toml),
    /// then apply environment overrides:
    /// - `CADUCEUS_GENERATOR_URL`: base URL of the first endpoint
    /// - `CADUCEUS_API_KEY`: API key for endpoints without one
    /// - `CADUCEUS_MODEL`: model for endpoints without one
    /// - `CADUCEUS_CACHE_BACKEND`: `memory`, `file`, `redis`, a `redis://` URL or `none`
    /// - `CADUCEUS_PORT`: gateway port
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `CADUCEUS_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CADUCEUS_GENERATOR_URL") {
            match self.generator.endpoints.first_mut() {
                Some(endpoint) => endpoint.base_url = url,
                None => self.generator.endpoints.push(EndpointConfig::llamacpp(url)),
            }
        }

        if let Some(key) = lookup("CADUCEUS_API_KEY") {
            for endpoint in &mut self.generator.endpoints {
                endpoint.api_key.get_or_insert_with(|| key.clone());
            }
        }

        if let Some(model) = lookup("CADUCEUS_MODEL") {
            for endpoint in &mut self.generator.endpoints {
                endpoint.model.get_or_insert_with(|| model.clone());
            }
        }

        if let Some(backend) = lookup("CADUCEUS_CACHE_BACKEND") {
            self.cache.backend = backend.parse()?;
        }

        if let Some(port) = lookup("CADUCEUS_PORT") {
            self.gateway.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("CADUCEUS_PORT is not a valid port: {port}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".caduceus")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.budget.context_window == 0 {
            return invalid("budget.context_window must be > 0".into());
        }
        if self.budget.generate_tokens >= self.budget.context_window {
            return invalid(format!(
                "budget.generate_tokens ({}) must be smaller than budget.context_window ({})",
                self.budget.generate_tokens, self.budget.context_window
            ));
        }
        if self.budget.max_trim_iterations == 0 {
            return invalid("budget.max_trim_iterations must be >= 1".into());
        }
        if self.conversation.history_limit > 32 {
            return invalid("conversation.history_limit must be <= 32".into());
        }
        if self.conversation.user_text_floor < 16 {
            return invalid("conversation.user_text_floor must be >= 16".into());
        }
        if self.grounding.max_evidence == 0 {
            return invalid("grounding.max_evidence must be >= 1".into());
        }
        if self.grounding.max_terms == 0 {
            return invalid("grounding.max_terms must be >= 1".into());
        }
        if self.grounding.max_sentences == 0 {
            return invalid("grounding.max_sentences must be >= 1".into());
        }
        if let Some(unknown) = self
            .grounding
            .chain
            .iter()
            .find(|name| !KNOWN_SOURCES.contains(&name.as_str()))
        {
            return invalid(format!(
                "unknown source '{unknown}' in grounding.chain (known: {})",
                KNOWN_SOURCES.join(", ")
            ));
        }
        if self.sources.timeout_secs == 0 {
            return invalid("sources.timeout_secs must be > 0".into());
        }
        if self.cache.ttl_secs == 0 {
            return invalid("cache.ttl_secs must be > 0".into());
        }
        if let CacheBackend::Redis { url } = &self.cache.backend {
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return invalid(format!(
                    "cache.backend redis url must start with redis:// (got '{url}')"
                ));
            }
        }
        if self.generator.temperature < 0.0 || self.generator.temperature > 2.0 {
            return invalid("generator.temperature must be between 0.0 and 2.0".into());
        }
        if let Some(endpoint) = self
            .generator
            .endpoints
            .iter()
            .find(|e| e.base_url.trim().is_empty())
        {
            return invalid(format!("{:?} endpoint has an empty base_url", endpoint.kind));
        }

        Ok(())
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

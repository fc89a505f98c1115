//! TOML configuration.
//!
//! Every section except `[data]` is optional and falls back to defaults.
//! See `config/smatch.example.toml` for a complete example.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ranking::{RecencyDecay, SocialWeights};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// JSON file holding the `authors_data` payload.
    pub authors_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Prepended to search queries (E5 models expect `"query: "`).
    #[serde(default)]
    pub query_prefix: String,
    /// Prepended to author text chunks (E5 models expect `"passage: "`).
    #[serde(default)]
    pub passage_prefix: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            query_prefix: String::new(),
            passage_prefix: String::new(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: None,
            timeout_secs: default_llm_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_llm_timeout_secs() -> u64 {
    20
}
fn default_temperature() -> f64 {
    0.2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Vector candidates fetched before social and recency re-scoring.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Heuristic results forwarded to the LLM reranker.
    #[serde(default = "default_rerank_pool")]
    pub rerank_pool: usize,
    #[serde(default = "default_use_llm")]
    pub use_llm: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            search_limit: default_search_limit(),
            rerank_pool: default_rerank_pool(),
            use_llm: default_use_llm(),
        }
    }
}

fn default_top_n() -> usize {
    5
}
fn default_search_limit() -> usize {
    50
}
fn default_rerank_pool() -> usize {
    15
}
fn default_use_llm() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    #[serde(default = "default_co_author_bonus")]
    pub co_author_bonus: f64,
    #[serde(default = "default_second_degree_bonus")]
    pub second_degree_bonus: f64,
    /// Pin the year used for recency decay. Defaults to the current UTC year.
    #[serde(default)]
    pub current_year: Option<i32>,
    #[serde(default)]
    pub decay: DecayConfig,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            co_author_bonus: default_co_author_bonus(),
            second_degree_bonus: default_second_degree_bonus(),
            current_year: None,
            decay: DecayConfig::default(),
        }
    }
}

impl RankingConfig {
    pub fn social_weights(&self) -> SocialWeights {
        SocialWeights {
            co_author: self.co_author_bonus,
            second_degree: self.second_degree_bonus,
        }
    }
}

fn default_co_author_bonus() -> f64 {
    0.25
}
fn default_second_degree_bonus() -> f64 {
    0.10
}

/// Recency decay table. A named `preset` supplies the base values and any
/// explicit field overrides it.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DecayConfig {
    #[serde(default)]
    pub preset: Option<String>,
    pub recent_years: Option<i32>,
    pub moderate_years: Option<i32>,
    pub stale_years: Option<i32>,
    pub recent: Option<f64>,
    pub moderate: Option<f64>,
    pub stale: Option<f64>,
    pub very_stale: Option<f64>,
}

impl DecayConfig {
    pub fn resolve(&self) -> Result<RecencyDecay> {
        let base = match self.preset.as_deref() {
            None | Some("standard") => RecencyDecay::standard(),
            Some("strict") => RecencyDecay::strict(),
            Some(other) => bail!(
                "Unknown ranking.decay.preset: '{}'. Must be standard or strict.",
                other
            ),
        };
        let decay = RecencyDecay {
            recent_years: self.recent_years.unwrap_or(base.recent_years),
            moderate_years: self.moderate_years.unwrap_or(base.moderate_years),
            stale_years: self.stale_years.unwrap_or(base.stale_years),
            recent: self.recent.unwrap_or(base.recent),
            moderate: self.moderate.unwrap_or(base.moderate),
            stale: self.stale.unwrap_or(base.stale),
            very_stale: self.very_stale.unwrap_or(base.very_stale),
        };
        decay.validate()?;
        Ok(decay)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_n == 0 {
        bail!("retrieval.top_n must be >= 1");
    }
    if config.retrieval.search_limit < config.retrieval.top_n {
        bail!("retrieval.search_limit must be >= retrieval.top_n");
    }
    if config.retrieval.rerank_pool == 0 {
        bail!("retrieval.rerank_pool must be >= 1");
    }

    let ranking = &config.ranking;
    if ranking.co_author_bonus < 0.0 || ranking.second_degree_bonus < 0.0 {
        bail!("ranking bonuses must be >= 0");
    }
    if ranking.second_degree_bonus > ranking.co_author_bonus {
        bail!("ranking.second_degree_bonus must not exceed ranking.co_author_bonus");
    }
    ranking.decay.resolve()?;

    match config.embedding.provider.as_str() {
        "disabled" | "hashing" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hashing, openai, ollama, or local.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" | "gemini" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or gemini.",
            other
        ),
    }
    if config.llm.is_enabled() && config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }

    Ok(())
}

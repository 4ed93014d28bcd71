//! Application configuration for Evana.
//!
//! User config lives at `~/.evana/evana.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file, only the names of the env vars
//! that hold them; they are resolved into a [`RunContext`] at call time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EvanaError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "evana.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".evana";

// ---------------------------------------------------------------------------
// Config structs (matching evana.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Web search tool settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Web crawl tool settings.
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Email tool settings.
    #[serde(default)]
    pub email: EmailConfig,

    /// Orchestration limits.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_model_api_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retries for transient failures (network, 429, 5xx, timeout).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Optional sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_base_url(),
            api_key_env: default_model_api_key_env(),
            model: default_model(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            temperature: None,
        }
    }
}

fn default_model_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_request_timeout() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of an Exa-compatible search API.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Results per query when the model does not say.
    #[serde(default = "default_results")]
    pub default_results: u32,

    /// Provider timeout in seconds.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key_env: default_search_api_key_env(),
            default_results: default_results(),
            timeout_secs: default_tool_timeout(),
        }
    }
}

fn default_search_base_url() -> String {
    "https://api.exa.ai".into()
}
fn default_search_api_key_env() -> String {
    "EXA_API_KEY".into()
}
fn default_results() -> u32 {
    5
}
fn default_tool_timeout() -> u64 {
    30
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Pages per crawl when the model does not say.
    #[serde(default = "default_max_pages")]
    pub default_max_pages: u32,

    /// Maximum characters of Markdown kept per page.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Provider timeout in seconds.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Allow crawling localhost/private addresses.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            default_max_pages: default_max_pages(),
            max_content_chars: default_max_content_chars(),
            timeout_secs: default_tool_timeout(),
            allow_private_hosts: false,
        }
    }
}

fn default_max_pages() -> u32 {
    3
}
fn default_max_content_chars() -> usize {
    8_000
}

/// `[email]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address recorded by the email tool.
    #[serde(default = "default_sender")]
    pub sender: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
        }
    }
}

fn default_sender() -> String {
    "evana@localhost".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model round trips allowed per tool-call loop.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Tool calls from one model turn dispatched at once.
    #[serde(default = "default_tool_concurrency")]
    pub tool_concurrency: usize,

    /// Deadline for a whole pipeline run, in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            tool_concurrency: default_tool_concurrency(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

fn default_max_tool_iterations() -> u32 {
    5
}
fn default_tool_concurrency() -> usize {
    4
}
fn default_run_timeout() -> u64 {
    600
}

// ---------------------------------------------------------------------------
// Run context (runtime, resolved from config + env + CLI flags)
// ---------------------------------------------------------------------------

/// Everything one pipeline run needs, resolved up front and passed in
/// explicitly.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub model: ModelSettings,
    pub search: SearchSettings,
    pub crawl: CrawlSettings,
    /// Sender address for the email tool.
    pub email_sender: String,
    pub limits: PipelineLimits,
}

/// Resolved model provider settings.
#[derive(Clone)]
pub struct ModelSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub temperature: Option<f32>,
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Resolved search provider settings.
#[derive(Clone)]
pub struct SearchSettings {
    pub base_url: String,
    /// `None` when the env var is unset; searches then degrade.
    pub api_key: Option<String>,
    pub default_results: u32,
    pub timeout: Duration,
}

impl std::fmt::Debug for SearchSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("default_results", &self.default_results)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Resolved crawl provider settings.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub default_max_pages: u32,
    pub max_content_chars: usize,
    pub timeout: Duration,
    pub allow_private_hosts: bool,
}

/// Orchestration limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    pub max_tool_iterations: u32,
    pub tool_concurrency: usize,
    pub run_timeout: Duration,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_tool_iterations: config.max_tool_iterations.max(1),
            tool_concurrency: config.tool_concurrency.max(1),
            run_timeout: Duration::from_secs(config.run_timeout_secs),
        }
    }
}

impl From<&CrawlConfig> for CrawlSettings {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            default_max_pages: config.default_max_pages,
            max_content_chars: config.max_content_chars,
            timeout: Duration::from_secs(config.timeout_secs),
            allow_private_hosts: config.allow_private_hosts,
        }
    }
}

impl RunContext {
    /// Resolve a run context from config, reading API keys from the
    /// environment.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve a run context with a custom env lookup.
    pub fn from_config_with(
        config: &AppConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let var_name = &config.model.api_key_env;
        let api_key = lookup(var_name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                EvanaError::config(format!(
                    "model API key not found. Set the {var_name} environment variable."
                ))
            })?;

        let search_key = lookup(&config.search.api_key_env).filter(|v| !v.is_empty());
        if search_key.is_none() {
            tracing::warn!(
                env = %config.search.api_key_env,
                "search API key not set, vendor searches will return placeholder results"
            );
        }

        Ok(Self {
            model: ModelSettings {
                base_url: config.model.base_url.trim_end_matches('/').to_string(),
                api_key,
                model: config.model.model.clone(),
                request_timeout: Duration::from_secs(config.model.request_timeout_secs),
                max_retries: config.model.max_retries,
                temperature: config.model.temperature,
            },
            search: SearchSettings {
                base_url: config.search.base_url.trim_end_matches('/').to_string(),
                api_key: search_key,
                default_results: config.search.default_results,
                timeout: Duration::from_secs(config.search.timeout_secs),
            },
            crawl: CrawlSettings::from(&config.crawl),
            email_sender: config.email.sender.clone(),
            limits: PipelineLimits::from(&config.pipeline),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.evana/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| EvanaError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.evana/evana.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| EvanaError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| EvanaError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EvanaError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EvanaError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EvanaError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with_model_key(name: &str) -> Option<String> {
        (name == "OPENAI_API_KEY").then(|| "sk-test".to_string())
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("max_tool_iterations"));
        assert!(!toml_str.contains("temperature"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.model.model, "gpt-4.1-mini");
        assert_eq!(parsed.pipeline.max_tool_iterations, 5);
        assert_eq!(parsed.crawl.default_max_pages, 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[model]
model = "gpt-4o"

[pipeline]
run_timeout_secs = 30
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.model.model, "gpt-4o");
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.pipeline.run_timeout_secs, 30);
        assert_eq!(config.pipeline.tool_concurrency, 4);
        assert_eq!(config.search.default_results, 5);
    }

    #[test]
    fn run_context_requires_model_key() {
        let config = AppConfig::default();
        let err = RunContext::from_config_with(&config, |_| None).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn run_context_resolves_limits_and_keys() {
        let mut config = AppConfig::default();
        config.model.base_url = "http://localhost:9999/v1/".into();
        config.pipeline.max_tool_iterations = 0;
        let ctx = RunContext::from_config_with(&config, env_with_model_key).unwrap();
        assert_eq!(ctx.model.api_key, "sk-test");
        assert_eq!(ctx.model.base_url, "http://localhost:9999/v1");
        assert!(ctx.search.api_key.is_none());
        assert_eq!(ctx.limits.max_tool_iterations, 1);
        assert_eq!(ctx.limits.run_timeout, Duration::from_secs(600));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = AppConfig::default();
        let ctx = RunContext::from_config_with(&config, env_with_model_key).unwrap();
        let debug = format!("{ctx:?}");
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<redacted>"));
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub rules: RulesConfig,
    pub models: ModelConfig,
}

impl ProxyConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: ProxyConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("NIM_API_KEY") {
            self.upstream.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("NIM_API_BASE") {
            self.upstream.base_url = v;
        }
        if let Ok(v) = std::env::var("UPSTREAM_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.upstream.timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("PORT") {
            if let Ok(n) = v.parse() {
                self.server.port = n;
            }
        }
        if let Ok(v) = std::env::var("RULESETS_PATH") {
            self.rules.path = Some(PathBuf::from(v));
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Per-request timeout. Long reasoning models can take minutes.
    pub timeout_secs: u64,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            api_key: None,
            timeout_secs: 300,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// JSON rule catalog. None = run without rule sets.
    pub path: Option<PathBuf>,
}

/// Client-facing model name → upstream model id.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub mapping: BTreeMap<String, String>,
    pub fallback_large: String,
    pub fallback_medium: String,
    pub fallback_small: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            mapping: default_model_mapping(),
            fallback_large: "meta/llama-3.1-405b-instruct".to_string(),
            fallback_medium: "meta/llama-3.1-70b-instruct".to_string(),
            fallback_small: "meta/llama-3.1-8b-instruct".to_string(),
        }
    }
}

impl ModelConfig {
    /// Resolve a client model name to the upstream model id.
    ///
    /// Exact mapping entries win; otherwise the name is bucketed by size hints.
    pub fn resolve(&self, requested: &str) -> String {
        if let Some(mapped) = self.mapping.get(requested) {
            return mapped.clone();
        }
        let lower = requested.to_lowercase();
        if lower.contains("gpt-4") || lower.contains("405b") {
            self.fallback_large.clone()
        } else if lower.contains("claude") || lower.contains("70b") {
            self.fallback_medium.clone()
        } else {
            self.fallback_small.clone()
        }
    }
}

fn default_model_mapping() -> BTreeMap<String, String> {
    [
        ("gpt-3.5-turbo", "nvidia/llama-3.1-nemotron-ultra-253b-v1"),
        ("gpt-4", "deepseek-ai/deepseek-r1-0528"),
        ("gpt-4-turbo", "deepseek-ai/deepseek-v3.1-terminus"),
        ("gpt-4o", "deepseek-ai/deepseek-v3.1"),
        ("claude-3-opus", "openai/gpt-oss-120b"),
        ("claude-3-sonnet", "openai/gpt-oss-20b"),
        ("claude-3-5-sonnet", "moonshotai/kimi-k2-thinking"),
        ("gemini-pro", "qwen/qwen3-next-80b-a3b-thinking"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// ============================================================================
// Tests
// ============================================================================

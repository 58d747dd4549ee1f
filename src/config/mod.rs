//! Runtime configuration loaded from the environment.
//!
//! Every knob lives in one typed struct built once in `main` and passed down
//! to the components that need it. There is no global config instance.

use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // ── OpenAI-compatible backend
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub openai_timeout: u64,

    // ── Context assembly
    pub knowledge_base_path: String,
    pub context_max_chars: usize,
    pub common_issues_limit: usize,
    pub semantic_search_url: Option<String>,
    pub semantic_search_timeout: u64,

    // ── Parts lookup
    pub parts_search_url: Option<String>,
    pub parts_search_timeout: u64,

    // ── Result cache
    pub cache_path: String,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,

    // ── Conversation history
    pub history_max_exchanges: usize,

    // ── Server
    pub host: String,
    pub port: u16,
}

/// Parse an environment variable, falling back to a default on absence or
/// parse failure. Values may carry trailing comments and whitespace.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    tracing::warn!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

/// Read an optional string variable. Empty values count as unset.
fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_var_opt("OPENAI_API_KEY"),
            openai_base_url: env_var_or("OPENAI_BASE_URL", "https://api.openai.com".to_string()),
            model: env_var_or("SHOPTALK_MODEL", "gpt-4o-mini".to_string()),
            max_output_tokens: env_var_or("SHOPTALK_MAX_OUTPUT_TOKENS", 1000),
            temperature: env_var_or("SHOPTALK_TEMPERATURE", 0.7),
            openai_timeout: env_var_or("SHOPTALK_OPENAI_TIMEOUT", 60),
            knowledge_base_path: env_var_or(
                "SHOPTALK_KNOWLEDGE_BASE",
                "./knowledge_base.json".to_string(),
            ),
            context_max_chars: env_var_or("SHOPTALK_CONTEXT_MAX_CHARS", 2000),
            common_issues_limit: env_var_or("SHOPTALK_COMMON_ISSUES_LIMIT", 5),
            semantic_search_url: env_var_opt("SHOPTALK_SEMANTIC_SEARCH_URL"),
            semantic_search_timeout: env_var_or("SHOPTALK_SEMANTIC_SEARCH_TIMEOUT", 5),
            parts_search_url: env_var_opt("SHOPTALK_PARTS_SEARCH_URL"),
            parts_search_timeout: env_var_or("SHOPTALK_PARTS_SEARCH_TIMEOUT", 5),
            cache_path: env_var_or("SHOPTALK_CACHE_PATH", "./shoptalk_cache.json".to_string()),
            cache_ttl_secs: env_var_or("SHOPTALK_CACHE_TTL_SECS", 3600),
            cache_max_entries: env_var_or("SHOPTALK_CACHE_MAX_ENTRIES", 100),
            history_max_exchanges: env_var_or("SHOPTALK_HISTORY_MAX_EXCHANGES", 10),
            host: env_var_or("SHOPTALK_HOST", "0.0.0.0".to_string()),
            port: env_var_or("SHOPTALK_PORT", 5001),
        }
    }

    /// Full URL for the chat completions endpoint.
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.openai_base_url.trim_end_matches('/')
        )
    }

    /// Server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Names of required variables that are missing, for the status endpoint.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        missing
    }
}

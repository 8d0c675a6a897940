use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL URL for the external anime catalog table
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL, caching is disabled when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// JSON file holding the anime catalog
    #[serde(default)]
    pub catalog_path: Option<String>,

    /// API key for the LLM explanation backend, template explanations when unset
    #[serde(default)]
    pub explainer_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_explainer_api_url")]
    pub explainer_api_url: String,

    /// Chat model used for explanations
    #[serde(default = "default_explainer_model")]
    pub explainer_model: String,

    /// Timeout for a single explanation call, in seconds
    #[serde(default = "default_explainer_timeout_secs")]
    pub explainer_timeout_secs: u64,

    /// Maximum number of remembered user preference profiles
    #[serde(default = "default_preference_store_capacity")]
    pub preference_store_capacity: usize,

    /// TTL for cached search results, in seconds
    #[serde(default = "default_search_cache_ttl")]
    pub search_cache_ttl: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_explainer_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_explainer_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_explainer_timeout_secs() -> u64 {
    10
}

fn default_preference_store_capacity() -> usize {
    10_000
}

fn default_search_cache_ttl() -> u64 {
    3600
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            redis_url: None,
            catalog_path: None,
            explainer_api_key: None,
            explainer_api_url: default_explainer_api_url(),
            explainer_model: default_explainer_model(),
            explainer_timeout_secs: default_explainer_timeout_secs(),
            preference_store_capacity: default_preference_store_capacity(),
            search_cache_ttl: default_search_cache_ttl(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of key/value pairs
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(vars).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Socket address the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

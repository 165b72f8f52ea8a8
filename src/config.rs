use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// LLM service settings
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    /// Destination database settings
    #[serde(default)]
    pub notion: NotionConfig,
    /// Retry behavior for overloaded LLM responses
    #[serde(default)]
    pub retry: RetryConfig,
    /// Category enumeration cache and matching
    #[serde(default)]
    pub categories: CategoriesConfig,
    /// Where persisted state (cache, session markers) is written
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// An in-progress marker older than this is considered stuck
    #[serde(default = "default_stale_session_minutes")]
    pub stale_session_minutes: u64,
    /// Optional HTTP request timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            anthropic: AnthropicConfig::default(),
            notion: NotionConfig::default(),
            retry: RetryConfig::default(),
            categories: CategoriesConfig::default(),
            state_path: default_state_path(),
            stale_session_minutes: default_stale_session_minutes(),
            timeout: None,
        }
    }
}

/// Configuration for the Anthropic messages API
#[derive(Debug, Deserialize, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication (can also be set via ANTHROPIC_API_KEY)
    pub api_key: Option<String>,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Base URL for API endpoint (for proxies and tests)
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    /// Value of the anthropic-version header
    #[serde(default = "default_anthropic_version")]
    pub version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: default_anthropic_base_url(),
            version: default_anthropic_version(),
        }
    }
}

/// Configuration for the Notion API
#[derive(Debug, Deserialize, Clone)]
pub struct NotionConfig {
    /// Integration token (can also be set via NOTION_TOKEN)
    pub token: Option<String>,
    /// Target database (can also be set via NOTION_DATABASE_ID)
    pub database_id: Option<String>,
    /// Base URL for API endpoint (for proxies and tests)
    #[serde(default = "default_notion_base_url")]
    pub base_url: String,
    /// Value of the Notion-Version header
    #[serde(default = "default_notion_version")]
    pub version: String,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            database_id: None,
            base_url: default_notion_base_url(),
            version: default_notion_version(),
        }
    }
}

/// Configuration for retrying overloaded LLM requests
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, first one included
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    /// Base delay in milliseconds, multiplied by the attempt number
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Configuration for the category enumeration
#[derive(Debug, Deserialize, Clone)]
pub struct CategoriesConfig {
    /// How long fetched options stay fresh
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    /// Whether an unmatched category may be written as a new option
    #[serde(default = "default_allow_new")]
    pub allow_new: bool,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            allow_new: default_allow_new(),
        }
    }
}

// Default value functions
fn default_model() -> String {
    "claude-3-7-sonnet-20250219".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

fn default_notion_base_url() -> String {
    "https://api.notion.com".to_string()
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_allow_new() -> bool {
    true
}

fn default_state_path() -> PathBuf {
    PathBuf::from("recipe-import-state.json")
}

fn default_stale_session_minutes() -> u64 {
    5
}

impl ImportConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPE_IMPORT__ prefix
    /// 2. config.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPE_IMPORT__NOTION__TOKEN
    pub fn load() -> Result<Self, ConfigError> {
        load_config()
    }

    /// LLM API key from config, falling back to ANTHROPIC_API_KEY
    pub fn anthropic_api_key(&self) -> Option<String> {
        non_empty(self.anthropic.api_key.clone())
            .or_else(|| non_empty(std::env::var("ANTHROPIC_API_KEY").ok()))
    }

    /// Notion token from config, falling back to NOTION_TOKEN
    pub fn notion_token(&self) -> Option<String> {
        non_empty(self.notion.token.clone())
            .or_else(|| non_empty(std::env::var("NOTION_TOKEN").ok()))
    }

    /// Notion database id from config, falling back to NOTION_DATABASE_ID
    pub fn notion_database_id(&self) -> Option<String> {
        non_empty(self.notion.database_id.clone())
            .or_else(|| non_empty(std::env::var("NOTION_DATABASE_ID").ok()))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn category_ttl(&self) -> Duration {
        Duration::from_secs(self.categories.ttl_hours.saturating_mul(60 * 60))
    }

    pub fn stale_session_after(&self) -> Duration {
        Duration::from_secs(self.stale_session_minutes.saturating_mul(60))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Load configuration from file and environment variables
///
/// See [`ImportConfig::load`] for the priority order.
pub fn load_config() -> Result<ImportConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("config").required(false))
        // Use double underscore for nested: RECIPE_IMPORT__ANTHROPIC__API_KEY
        .add_source(
            Environment::with_prefix("RECIPE_IMPORT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ImportConfig::default();
        assert_eq!(config.anthropic.model, "claude-3-7-sonnet-20250219");
        assert_eq!(config.anthropic.max_tokens, 4000);
        assert_eq!(config.notion.version, "2022-06-28");
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.delay_ms, 2000);
        assert_eq!(config.categories.ttl_hours, 24);
        assert!(config.categories.allow_new);
    }

    #[test]
    fn test_serde_defaults_fill_missing_sections() {
        let config: ImportConfig = serde_json::from_str(
            r#"{"notion": {"token": "secret", "database_id": "abc"}, "retry": {"attempts": 5}}"#,
        )
        .unwrap();

        assert_eq!(config.notion.token.as_deref(), Some("secret"));
        assert_eq!(config.notion.base_url, "https://api.notion.com");
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.delay_ms, 2000);
        assert_eq!(config.state_path, PathBuf::from("recipe-import-state.json"));
        assert_eq!(config.stale_session_minutes, 5);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_blank_credentials_count_as_missing() {
        let mut config = ImportConfig::default();
        config.notion.database_id = Some("   ".to_string());
        assert_eq!(non_empty(config.notion.database_id.clone()), None);
    }

    #[test]
    fn test_huge_durations_saturate() {
        let mut config = ImportConfig::default();
        config.categories.ttl_hours = u64::MAX;
        config.stale_session_minutes = u64::MAX;
        assert_eq!(config.category_ttl(), Duration::from_secs(u64::MAX));
        assert_eq!(config.stale_session_after(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_stale_session_duration() {
        let config = ImportConfig::default();
        assert_eq!(config.stale_session_after(), Duration::from_secs(300));
    }
}

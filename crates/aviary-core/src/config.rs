use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AviaryError, Result};

/// Top-level configuration for Aviary.
///
/// Loaded from `~/.aviary/config.toml` by default. Every section falls back
/// to its defaults when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AviaryConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl AviaryConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AviaryConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AviaryError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite document store.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port the service listens on.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.aviary/data".to_string(),
            log_level: "info".to_string(),
            port: 3000,
        }
    }
}

/// Settings for the HTTP client used by the chat and history components.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the Aviary service.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Chat behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum characters kept from the first message as the thread title.
    pub title_max_chars: usize,
    /// Content of the typing placeholder.
    pub typing_marker: String,
    /// Number of questions served by `/bird-questions`.
    pub suggestion_count: usize,
    /// Pool the suggested questions are sampled from.
    pub question_pool: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            title_max_chars: 30,
            typing_marker: "...".to_string(),
            suggestion_count: 4,
            question_pool: vec![
                "What does a robin eat?".to_string(),
                "How can I attract hummingbirds to my garden?".to_string(),
                "Why do birds migrate?".to_string(),
                "How do I tell a crow from a raven?".to_string(),
                "What birds are active at night?".to_string(),
                "Which birds visit feeders in winter?".to_string(),
                "How long do songbirds live?".to_string(),
                "What is the fastest bird in the world?".to_string(),
            ],
        }
    }
}

/// History browsing behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Sightings per page.
    pub page_size: usize,
    /// Delay after the last keystroke before the search is applied.
    pub search_debounce_ms: u64,
    /// Maximum normalized edit distance accepted by the fuzzy matcher (0.0 to 1.0).
    pub fuzzy_threshold: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            search_debounce_ms: 300,
            fuzzy_threshold: 0.4,
        }
    }
}

/// Completion provider used by the assistant proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Provider: "openai" or "canned".
    pub provider: String,
    /// Model name passed to the provider.
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Optional system prompt sent ahead of the user message.
    pub system_prompt: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            api_base: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            system_prompt: None,
            request_timeout_secs: 60,
        }
    }
}

/// Species reference-page lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Base URL species names are appended to.
    pub reference_base_url: String,
    /// Timeout for fetching reference pages, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            reference_base_url: "https://en.wikipedia.org/wiki/".to_string(),
            request_timeout_secs: 10,
        }
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CartwiseError, Result};

/// Top-level configuration for Cartwise.
///
/// Loaded from `~/.cartwise/config.toml` by default. Every section falls back
/// to its defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartwiseConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    #[serde(default = "default_personas")]
    pub personas: Vec<PersonaConfig>,
}

impl Default for CartwiseConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            chat: ChatConfig::default(),
            generation: GenerationConfig::default(),
            recommendation: RecommendationConfig::default(),
            personas: default_personas(),
        }
    }
}

impl CartwiseConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CartwiseConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or cannot be parsed.
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
            toml::to_string_pretty(self).map_err(|e| CartwiseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Look up a persona by id, falling back to the configured default and
    /// then to the first persona.
    pub fn persona(&self, id: Option<&str>) -> Option<&PersonaConfig> {
        id.and_then(|id| self.personas.iter().find(|p| p.id == id))
            .or_else(|| {
                self.personas
                    .iter()
                    .find(|p| p.id == self.chat.default_persona)
            })
            .or_else(|| self.personas.first())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.cartwise/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

/// Conversation handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum user message length in characters.
    pub max_message_length: usize,
    /// Prior messages included in the generation prompt.
    pub history_messages: usize,
    /// Persona used when a session does not name one.
    pub default_persona: String,
    /// Phrases that count as an explicit request for recommendations.
    pub recommend_keywords: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            history_messages: 10,
            default_persona: "friendly".to_string(),
            recommend_keywords: [
                "recommend",
                "suggest",
                "what should i buy",
                "推荐",
                "买什么好",
                "该买什么",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Text generation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of the Ollama-compatible server.
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Maximum wait between two fragments.
    pub token_timeout_secs: u64,
    /// Maximum duration of one generated reply.
    pub turn_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            token_timeout_secs: 30,
            turn_timeout_secs: 120,
        }
    }
}

/// Recommendation pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub enabled: bool,
    /// Cap on products returned per recommendation.
    pub max_products: usize,
    /// Limit applied to each catalog query attempt.
    pub page_size: usize,
    /// Below this many results the relaxed attempts run.
    pub min_results: usize,
    /// Budget for the whole recommendation step.
    pub timeout_ms: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_products: 6,
            page_size: 6,
            min_results: 3,
            timeout_ms: 5000,
        }
    }
}

/// A named response style attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub id: String,
    pub name: String,
    /// Style instructions appended to the system prompt.
    pub tone: String,
    pub greeting: String,
}

fn default_personas() -> Vec<PersonaConfig> {
    vec![
        PersonaConfig {
            id: "friendly".to_string(),
            name: "Mia".to_string(),
            tone: "Warm, upbeat and concise. Use casual language and the occasional emoji."
                .to_string(),
            greeting: "Hi! I'm Mia. Tell me what you're shopping for today.".to_string(),
        },
        PersonaConfig {
            id: "expert".to_string(),
            name: "Leo".to_string(),
            tone: "Knowledgeable and precise. Compare options and explain trade-offs briefly."
                .to_string(),
            greeting: "Hello, I'm Leo. What product can I help you evaluate?".to_string(),
        },
    ]
}

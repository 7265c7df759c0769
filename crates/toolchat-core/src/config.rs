//! Configuration management for toolchat
//!
//! Handles loading and saving the TOML configuration file: provider
//! settings and API keys, loop limits, and how tool server scripts are launched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::ProviderType;

/// Default bound on model rounds per query
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Maximum size for tool results in characters (~7.5k tokens)
pub const MAX_TOOL_RESULT_SIZE: usize = 30_000;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default provider to use
    #[serde(default = "default_provider_name")]
    pub default_provider: String,
    /// Provider configurations keyed by name
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,
    /// Tool-calling loop settings
    #[serde(default, rename = "loop")]
    pub loop_config: LoopConfig,
    /// How tool server scripts are started
    #[serde(default)]
    pub launcher: LauncherConfig,
    /// Tool server to connect to when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,
    /// System prompt override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_provider_name() -> String {
    "gemini".to_string()
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert("gemini".to_string(), ProviderConfig::gemini());
    providers.insert("anthropic".to_string(), ProviderConfig::anthropic());
    providers.insert("openai".to_string(), ProviderConfig::openai());
    providers
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: default_provider_name(),
            providers: default_providers(),
            loop_config: LoopConfig::default(),
            launcher: LauncherConfig::default(),
            default_target: None,
            system_prompt: None,
        }
    }
}

impl Config {
    /// Get the provider config for the default provider
    pub fn get_default_provider(&self) -> Option<&ProviderConfig> {
        self.providers.get(&self.default_provider)
    }

    /// Get a specific provider config by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// List all configured provider names, sorted
    pub fn list_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider type: "gemini", "anthropic", "openai", etc.
    pub provider_type: String,
    /// API key (can be loaded from env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name for API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Model to use
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::gemini()
    }
}

impl ProviderConfig {
    /// Defaults for a provider, taken from the catalog
    pub fn for_type(provider_type: ProviderType) -> Self {
        Self {
            provider_type: provider_type.as_str().to_string(),
            api_key: None,
            api_key_env: provider_type.api_key_env().map(String::from),
            model: provider_type.default_model().to_string(),
        }
    }

    pub fn gemini() -> Self {
        Self::for_type(ProviderType::Gemini)
    }

    pub fn anthropic() -> Self {
        Self::for_type(ProviderType::Anthropic)
    }

    pub fn openai() -> Self {
        Self::for_type(ProviderType::OpenAI)
    }

    /// Get the API key, checking environment variable if not set directly
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }

        if let Some(env_name) = &self.api_key_env {
            if let Ok(key) = std::env::var(env_name) {
                if !key.is_empty() {
                    return Some(key);
                }
            }
        }

        match self.provider_type.as_str() {
            "gemini" | "google" => std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_API_KEY"))
                .ok(),
            "anthropic" => std::env::var("ANTHROPIC_API_KEY").ok(),
            "openai" => std::env::var("OPENAI_API_KEY").ok(),
            "groq" => std::env::var("GROQ_API_KEY").ok(),
            "deepseek" => std::env::var("DEEPSEEK_API_KEY").ok(),
            "xai" | "grok" => std::env::var("XAI_API_KEY").ok(),
            _ => None,
        }
    }
}

/// Tool-calling loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Model rounds allowed per query before giving up
    pub max_iterations: usize,
    /// Tool results longer than this are truncated before the model sees them
    pub max_tool_result_chars: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tool_result_chars: MAX_TOOL_RESULT_SIZE,
        }
    }
}

impl LoopConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Interpreters used to start tool server scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub python_command: String,
    pub node_command: String,
    /// Extra environment passed to the tool server process
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            python_command: "python".to_string(),
            node_command: "node".to_string(),
            env: HashMap::new(),
        }
    }
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("toolchat").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn set_provider(&mut self, name: &str, provider: ProviderConfig) {
        self.config.providers.insert(name.to_string(), provider);
    }

    pub fn set_default_provider(&mut self, name: &str) {
        self.config.default_provider = name.to_string();
    }

    /// Get API key for default provider
    pub fn get_api_key(&self) -> Option<String> {
        self.config.get_default_provider().and_then(|p| p.get_api_key())
    }

    /// Get API key for a specific provider
    pub fn get_api_key_for(&self, provider_name: &str) -> Option<String> {
        self.config.get_provider(provider_name).and_then(|p| p.get_api_key())
    }

    pub fn default_provider(&self) -> &str {
        &self.config.default_provider
    }
}

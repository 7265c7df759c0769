//! Provider catalog, the single source of provider defaults
//!
//! Loads provider data from embedded JSON at compile time.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::error;

/// Embedded JSON data
const PROVIDERS_JSON: &str = include_str!("providers.json");

/// Provider information
#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    pub name: String,
    pub api_key_env: Option<String>,
    pub default_model: String,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Deserialize)]
struct RawCatalog {
    providers: HashMap<String, Provider>,
}

static CATALOG: LazyLock<HashMap<String, Provider>> = LazyLock::new(|| {
    match serde_json::from_str::<RawCatalog>(PROVIDERS_JSON) {
        Ok(raw) => raw.providers,
        Err(e) => {
            error!(error = %e, "Embedded provider catalog is invalid");
            HashMap::new()
        }
    }
});

/// Get a provider by ID
pub fn get(provider_id: &str) -> Option<&'static Provider> {
    CATALOG.get(provider_id)
}

/// All provider IDs, sorted
pub fn ids() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = CATALOG.keys().map(|s| s.as_str()).collect();
    ids.sort_unstable();
    ids
}

/// Get API key environment variable for a provider
pub fn api_key_env(provider_id: &str) -> Option<&'static str> {
    get(provider_id).and_then(|p| p.api_key_env.as_deref())
}

/// Get default model ID for a provider
pub fn default_model(provider_id: &str) -> Option<&'static str> {
    get(provider_id).map(|p| p.default_model.as_str())
}

/// Supported LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gemini,
    Anthropic,
    OpenAI,
    Groq,
    DeepSeek,
    XAI,
    /// Local models, no API key
    Ollama,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderType::Gemini),
            "anthropic" => Ok(ProviderType::Anthropic),
            "openai" => Ok(ProviderType::OpenAI),
            "groq" => Ok(ProviderType::Groq),
            "deepseek" => Ok(ProviderType::DeepSeek),
            "xai" | "grok" => Ok(ProviderType::XAI),
            "ollama" => Ok(ProviderType::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl ProviderType {
    /// Get the default model for this provider
    pub fn default_model(&self) -> &'static str {
        default_model(self.as_str()).unwrap_or("unknown")
    }

    /// Get the environment variable name for API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        api_key_env(self.as_str())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Gemini => "gemini",
            ProviderType::Anthropic => "anthropic",
            ProviderType::OpenAI => "openai",
            ProviderType::Groq => "groq",
            ProviderType::DeepSeek => "deepseek",
            ProviderType::XAI => "xai",
            ProviderType::Ollama => "ollama",
        }
    }
}

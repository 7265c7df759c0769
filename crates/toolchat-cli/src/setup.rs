//! Startup plumbing: logging, provider selection and loop settings

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use console::style;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use toolchat_core::config::{ConfigManager, LoopConfig, ProviderConfig};
use toolchat_core::provider::{ModelProvider, ProviderType, create_provider};

/// Install the tracing subscriber
///
/// Logs go to stderr, or to `log_file` when given, so stdout carries only
/// the answer. `RUST_LOG` overrides the level chosen by `verbose`.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn default_filter(verbose: bool) -> &'static str {
    // warn by default so log lines don't interleave with the prompt
    if verbose { "info,toolchat_core=debug" } else { "warn" }
}

/// Settings that command line flags may override
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_iterations: Option<usize>,
}

/// Provider choice after merging flags over the config file
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderChoice {
    pub provider_type: ProviderType,
    pub model: String,
    pub api_key: Option<String>,
}

/// Resolve provider, model and API key. Flags win over the config file
pub fn resolve_provider(config_manager: &ConfigManager, overrides: &Overrides) -> anyhow::Result<ProviderChoice> {
    let name = overrides
        .provider
        .as_deref()
        .unwrap_or_else(|| config_manager.default_provider());
    let provider_type: ProviderType = name.parse().map_err(|e: String| anyhow!(e))?;

    let configured = config_manager
        .config()
        .get_provider(provider_type.as_str())
        .cloned()
        .unwrap_or_else(|| ProviderConfig::for_type(provider_type));

    let model = overrides.model.clone().unwrap_or_else(|| configured.model.clone());
    let api_key = configured.get_api_key();

    if api_key.is_none() && provider_type.api_key_env().is_some() {
        return Err(anyhow!(missing_key_message(provider_type, config_manager)));
    }

    Ok(ProviderChoice {
        provider_type,
        model,
        api_key,
    })
}

fn missing_key_message(provider_type: ProviderType, config_manager: &ConfigManager) -> String {
    let env_var = provider_type.api_key_env().unwrap_or("API_KEY");
    format!(
        "No API key configured for {}. Set {} or add it to {}",
        provider_type,
        env_var,
        config_manager.config_path().display()
    )
}

/// Build the model provider for this run
pub fn build_provider(config_manager: &ConfigManager, overrides: &Overrides) -> anyhow::Result<Arc<dyn ModelProvider>> {
    let choice = resolve_provider(config_manager, overrides)?;
    tracing::info!(provider = %choice.provider_type, model = %choice.model, "Using model provider");

    let provider = create_provider(
        choice.provider_type,
        choice.api_key.as_deref(),
        Some(&choice.model),
        config_manager.config().system_prompt.as_deref(),
    );
    Ok(Arc::new(provider))
}

/// Loop settings from config, with the round limit overridable
pub fn loop_config(config_manager: &ConfigManager, overrides: &Overrides) -> LoopConfig {
    let config = config_manager.config().loop_config.clone();
    match overrides.max_iterations {
        Some(max) => config.with_max_iterations(max),
        None => config,
    }
}

/// Load the config file, falling back to defaults with a warning
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ConfigManager> {
    match path {
        Some(p) => ConfigManager::with_path(p.to_path_buf()).context("Failed to load config file"),
        None => match ConfigManager::new() {
            Ok(manager) => Ok(manager),
            Err(e) => {
                eprintln!("{}", style(format!("Warning: {}", e)).yellow());
                let fallback = std::env::temp_dir().join("toolchat").join("config.toml");
                ConfigManager::with_path(fallback).context("Failed to load default config")
            }
        },
    }
}

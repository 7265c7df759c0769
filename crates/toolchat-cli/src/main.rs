//! toolchat CLI - chat with a language model that can call MCP tool servers
//!
//! `run` answers one query statelessly (history is passed in as JSON and the
//! answer is printed after a `Response:` marker); `chat` keeps a session open
//! in an interactive prompt.

mod chat;
mod setup;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;

use toolchat_core::config::ConfigManager;
use toolchat_core::connection::{ToolConnection, ToolDescriptor};
use toolchat_core::error::Error;
use toolchat_core::history::parse_json;
use toolchat_core::marker::format_response;
use toolchat_core::session::{ChatSession, error_sentence};
use toolchat_core::target::{TargetRef, discover_targets};

use setup::Overrides;

#[derive(Parser)]
#[command(name = "toolchat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat with a language model that can call MCP tool servers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// LLM provider (gemini, anthropic, openai, ...) - defaults to config setting
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Model to use (defaults to provider's default)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Model rounds allowed per query
    #[arg(long, global = true)]
    max_iterations: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one query and exit
    Run {
        /// Tool server script or command line
        target: String,

        /// The query
        query: String,

        /// Earlier conversation as a JSON array of {role, content}
        #[arg(long)]
        history: Option<String>,
    },

    /// Interactive chat mode
    Chat {
        /// Tool server to connect to first
        target: Option<String>,
    },

    /// List the tools a server offers
    Tools {
        /// Tool server script or command line
        target: String,

        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find tool server scripts in a directory
    Targets {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let _log_guard = setup::init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config_manager = setup::load_config(cli.config.as_deref())?;
    let overrides = Overrides {
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        max_iterations: cli.max_iterations,
    };

    match cli.command {
        Commands::Run { target, query, history } => {
            Ok(run_once(&config_manager, &overrides, &target, &query, history.as_deref()).await)
        }
        Commands::Chat { target } => {
            run_interactive(&config_manager, &overrides, target).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tools { target, json } => {
            show_tools(&config_manager, &target, json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Targets { dir } => {
            show_targets(&dir);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            show_config(&config_manager, &overrides);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Stateless one-shot query
///
/// The answer goes to stdout after the `Response:` marker. Fatal errors go to
/// stderr with exit code 1. The tool server is shut down either way.
async fn run_once(
    config_manager: &ConfigManager,
    overrides: &Overrides,
    raw_target: &str,
    query: &str,
    history: Option<&str>,
) -> ExitCode {
    let provider = match setup::build_provider(config_manager, overrides) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", style(format!("Error: {}", e)).red());
            return ExitCode::FAILURE;
        }
    };

    let target = match TargetRef::parse(raw_target) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", error_sentence(&Error::from(e)));
            return ExitCode::FAILURE;
        }
    };

    let mut session = ChatSession::new(provider, setup::loop_config(config_manager, overrides))
        .with_launcher(config_manager.config().launcher.clone());

    let history = parse_json(history);
    let result = match session.connect(&target).await {
        Ok(()) => {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => Err(Error::Cancelled),
                result = session.run_query(query, Some(&history)) => result,
            }
        }
        Err(e) => Err(e),
    };

    session.cleanup().await;

    match result {
        Ok(outcome) => {
            if !outcome.is_complete() {
                tracing::warn!(rounds = outcome.rounds, "Query stopped at the round limit");
            }
            println!("{}", format_response(&outcome.text));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", error_sentence(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run_interactive(
    config_manager: &ConfigManager,
    overrides: &Overrides,
    target: Option<String>,
) -> anyhow::Result<()> {
    let provider = setup::build_provider(config_manager, overrides)?;
    let mut session = ChatSession::new(provider, setup::loop_config(config_manager, overrides))
        .with_launcher(config_manager.config().launcher.clone());

    let initial = match target.or_else(|| config_manager.config().default_target.clone()) {
        Some(raw) => Some(TargetRef::parse(&raw)?),
        None => None,
    };

    let result = chat::run_chat(&mut session, initial).await;
    session.cleanup().await;
    result
}

async fn show_tools(config_manager: &ConfigManager, raw_target: &str, json: bool) -> anyhow::Result<()> {
    let target = TargetRef::parse(raw_target)?;
    let mut connection = ToolConnection::connect(&target, &config_manager.config().launcher).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(connection.descriptors())?);
    } else {
        print_tools(connection.label(), connection.descriptors());
    }

    connection.close().await;
    Ok(())
}

/// Print a server's tools with their parameters
pub(crate) fn print_tools(label: &str, descriptors: &[ToolDescriptor]) {
    println!("{} {}", style("Tools on").bold(), style(label).cyan());
    println!();

    if descriptors.is_empty() {
        println!("  {}", style("(none)").dim());
        return;
    }

    for tool in descriptors {
        println!("  {:<20} {}", style(&tool.name).cyan(), tool.description);
        for (name, spec) in &tool.parameters {
            let kind = spec.param_type.as_deref().unwrap_or("any");
            let marker = if spec.required {
                style("required").yellow()
            } else {
                style("optional").dim()
            };
            println!("    {} {} [{}]", style(name).green(), style(kind).dim(), marker);
        }
    }
}

fn show_targets(dir: &Path) {
    let found = discover_targets(dir);
    if found.is_empty() {
        println!("{}", style(format!("No tool server scripts found in {}", dir.display())).dim());
        return;
    }

    println!("{}", style("Tool servers:").bold());
    for path in found {
        println!("  {} {}", style("•").cyan(), path.display());
    }
}

fn show_config(config_manager: &ConfigManager, overrides: &Overrides) {
    let config = config_manager.config();

    println!("{}", style("Configuration:").bold());
    println!();
    println!("  Config file: {}", style(config_manager.config_path().display()).dim());

    match setup::resolve_provider(config_manager, overrides) {
        Ok(choice) => {
            println!("  Provider:    {}", style(choice.provider_type).green());
            println!("  Model:       {}", style(&choice.model).green());
            let key = if choice.api_key.is_some() {
                style("set").green()
            } else {
                style("not needed").dim()
            };
            println!("  API key:     {}", key);
        }
        Err(e) => println!("  Provider:    {}", style(e).red()),
    }

    let loop_config = setup::loop_config(config_manager, overrides);
    println!("  Max rounds:  {}", loop_config.max_iterations);
    println!("  Result cap:  {} chars", loop_config.max_tool_result_chars);
    println!(
        "  Launchers:   .py → {}, .js → {}",
        config.launcher.python_command, config.launcher.node_command
    );
    if let Some(target) = &config.default_target {
        println!("  Default target: {}", style(target).cyan());
    }
    println!("  Configured providers: {}", config.list_providers().join(", "));
}

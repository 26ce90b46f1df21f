//! Parley - streaming chat with tools in the terminal
//!
//! One-shot when given a prompt, otherwise reads prompts line by line.
//! Logs go to `~/.parley/logs/parley.log` so they never mix with the chat.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use parley_core::ai::providers::ProviderId;
use parley_core::tools::register_builtin_tools;
use parley_core::{
    paths, prompts, AiClient, AiClientConfig, ChatEngine, Config, EngineConfig, EngineServices,
    HookRegistry, JsonFileStore, ToolPolicy, ToolRegistry,
};

mod chat;

/// Parley - streaming chat with tools
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Chat with an LLM that can call local tools", long_about = None)]
struct Cli {
    /// Provider: anthropic, google, openai or ollama
    #[arg(short, long)]
    provider: Option<ProviderId>,

    /// Model id (defaults to the provider's default model)
    #[arg(short, long)]
    model: Option<String>,

    /// Run tools without asking for permission
    #[arg(short, long)]
    yes: bool,

    /// Replace the system prompt for this run
    #[arg(long)]
    system: Option<String>,

    /// Working directory for tools (defaults to current)
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Resume a saved session
    #[arg(long)]
    session: Option<String>,

    /// Prompt to send; omit to chat interactively
    prompt: Option<String>,
}

impl Cli {
    /// Command-line values win over the config file
    fn apply_to(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            if provider != config.provider {
                // Provider-specific settings from the file no longer apply
                config.model = None;
                config.base_url = None;
                config.api_key_env = None;
            }
            config.provider = provider;
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(directory) = &self.directory {
            config.working_directory = Some(directory.clone());
        }
    }
}

fn init_logging() {
    let log_dir = paths::logs_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let writer = match std::fs::File::create(log_dir.join("parley.log")) {
        Ok(file) => BoxMakeWriter::new(std::sync::Mutex::new(file)),
        Err(_) => BoxMakeWriter::new(std::io::sink),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = Config::load(&paths::config_file())?;
    cli.apply_to(&mut config);
    let api_key = config.resolve_api_key()?;
    tracing::info!(
        "Starting Parley: provider={}, model={}",
        config.provider,
        config.model()
    );

    let system_prompt = prompts::load_system_prompt(&paths::system_prompt_file());
    let mut engine_config = EngineConfig::from_config(&config, system_prompt);
    engine_config.system_override = cli.system.clone();

    let registry = ToolRegistry::new();
    register_builtin_tools(&registry).await;
    let mut policy = ToolPolicy::from_config(&config.tools);
    if cli.yes {
        policy = policy.approve_all();
    }

    let client = AiClient::new(AiClientConfig::new(config.provider_config()), api_key);
    let services = EngineServices {
        provider: Arc::new(client),
        tools: Arc::new(registry),
        policy: Arc::new(policy),
        store: Arc::new(JsonFileStore::new(paths::sessions_dir())),
        hooks: Arc::new(HookRegistry::from_config(&config.hooks)),
    };

    let session_id = cli
        .session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let engine = ChatEngine::new(engine_config, services, session_id, config.provider)?;
    let session_id = engine.session().id.clone();
    let mut handle = engine.spawn();

    let result = match &cli.prompt {
        Some(prompt) => chat::run_once(&mut handle, prompt).await,
        None => chat::run_interactive(&mut handle).await,
    };

    let session = handle.shutdown().await?;
    tracing::info!(
        "Session {} closed with {} message(s)",
        session.id,
        session.messages().len()
    );
    eprintln!("session: {}", session_id);
    result
}

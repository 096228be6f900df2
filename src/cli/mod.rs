//! Terminal REPL channel for Parley
//!
//! Wires the configuration, provider, tool registry, session store, and
//! agent loop together behind a line-based REPL. Leading-slash directives
//! are intercepted here and never reach the agent loop as chat input.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use parley::agent::AgentLoop;
use parley::config::Config;
use parley::events::AgentEvent;
use parley::providers::{ChatProvider, OpenAiProvider};
use parley::session::{SessionRuntime, SessionStore};
use parley::tools::{
    EchoTool, FindFilesTool, ListDirTool, ReadFileTool, ShellTool, ToolRegistry, WriteFileTool,
};

/// Conversational agent runtime.
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Path to the config file (default: ~/.parley/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session id to resume (default: most recent, or a new session)
    #[arg(long, short)]
    session: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat (the default)
    Chat,
    /// List stored sessions
    Sessions,
    /// Delete a stored session
    Delete {
        /// Session id to delete
        id: String,
    },
}

/// CLI entry point.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    config.clone().set_global().ok();

    let store = SessionStore::with_path(config.sessions_dir())
        .context("failed to open sessions directory")?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(config, store, cli.session).await,
        Command::Sessions => {
            for id in store.list().await? {
                println!("{}", id);
            }
            Ok(())
        }
        Command::Delete { id } => {
            store.delete(&id).await?;
            println!("Deleted session: {}", id);
            Ok(())
        }
    }
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn ChatProvider>> {
    let api_key = config
        .provider
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty());
    let Some(api_key) = api_key else {
        bail!(
            "no API key configured; set PARLEY_API_KEY (or OPENAI_API_KEY), \
             or provider.api_key in {}",
            Config::path().display()
        );
    };
    let provider = match config.provider.api_base.as_deref() {
        Some(base) => OpenAiProvider::with_base_url(api_key, base),
        None => OpenAiProvider::new(api_key),
    };
    Ok(Arc::new(provider))
}

fn build_registry(config: &Config) -> anyhow::Result<Arc<ToolRegistry>> {
    let mut registry = ToolRegistry::new()
        .with_timeout(std::time::Duration::from_secs(config.agent.tool_timeout_secs));
    registry.register(Box::new(EchoTool))?;
    registry.register(Box::new(ReadFileTool))?;
    registry.register(Box::new(WriteFileTool))?;
    registry.register(Box::new(ListDirTool))?;
    registry.register(Box::new(FindFilesTool))?;
    registry.register(Box::new(ShellTool))?;
    Ok(Arc::new(registry))
}

async fn resume_runtime(store: &SessionStore, session: Option<String>) -> anyhow::Result<SessionRuntime> {
    match session {
        Some(id) => Ok(store.get_or_create(&id).await?),
        None => match store.latest().await? {
            Some(runtime) => Ok(runtime),
            None => Ok(SessionRuntime::generate()),
        },
    }
}

async fn chat(config: Config, store: SessionStore, session: Option<String>) -> anyhow::Result<()> {
    let provider = build_provider(&config)?;
    let registry = build_registry(&config)?;
    std::fs::create_dir_all(config.workspace_path()).ok();

    let runtime = resume_runtime(&store, session).await?;
    println!("Session: {}", runtime.session_id);

    let agent = Arc::new(AgentLoop::new(&config, provider, registry, runtime));

    // Render tool progress as it happens; the final answer is printed by the
    // REPL itself.
    let mut events = agent.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                AgentEvent::Thinking { content } => eprintln!("  … {}", content),
                AgentEvent::ToolCall { tool, arguments, .. } => {
                    eprintln!("  ⚙ {} {}", tool, arguments)
                }
                AgentEvent::ToolResult { result } => {
                    let mark = if result.success { "✔" } else { "✖" };
                    eprintln!("  {} {}", mark, result.tool_name);
                }
                AgentEvent::Error { message } => eprintln!("  ! {}", message),
                AgentEvent::UserInput { .. } | AgentEvent::AssistantResponse { .. } => {}
            }
        }
    });

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Directive interception: these never enter the context store
        if let Some(directive) = line.strip_prefix('/') {
            let mut parts = directive.split_whitespace();
            match (parts.next().unwrap_or(""), parts.next()) {
                ("quit", _) | ("exit", _) => break,
                ("reset", _) => {
                    agent.reset().await;
                    store.save(&agent.runtime_snapshot().await).await?;
                    println!("Session history cleared.");
                }
                ("new", id) => {
                    let fresh = match id {
                        Some(id) => SessionRuntime::new(id),
                        None => SessionRuntime::generate(),
                    };
                    let fresh_id = fresh.session_id.clone();
                    let previous = agent.update_runtime(fresh).await;
                    store.save(&previous).await?;
                    store.save(&agent.runtime_snapshot().await).await?;
                    println!("Started session: {}", fresh_id);
                }
                ("switch", None) => println!("Usage: /switch <session-id>"),
                ("switch", Some(id)) => {
                    let incoming = store.get_or_create(id).await?;
                    let previous = agent.update_runtime(incoming).await;
                    store.save(&previous).await?;
                    println!("Switched to session: {}", id);
                }
                ("sessions", _) => {
                    let current = agent.session_id().await;
                    for id in store.list().await? {
                        let marker = if id == current { " *" } else { "" };
                        println!("{}{}", id, marker);
                    }
                }
                ("help", _) => {
                    println!("/reset /new [id] /switch <id> /sessions /quit");
                }
                (other, _) => println!("Unknown directive '/{}'; try /help", other),
            }
            continue;
        }

        match agent.chat(line).await {
            Ok(answer) => println!("{}", answer),
            Err(e) => eprintln!("error: {}", e),
        }
        store.save(&agent.runtime_snapshot().await).await?;
    }

    store.save(&agent.runtime_snapshot().await).await?;
    Ok(())
}

//! wsrelay - a password-gated terminal chat relayed to an LLM.
//!
//! One binary, two roles: `wsrelay server` accepts WebSocket connections and
//! forwards every message to a chat-completion API; `wsrelay client` asks
//! for a password, connects, and chats from the terminal.

mod client;
mod config;
mod protocol;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "wsrelay")]
#[command(author, version, about = "A terminal chat client and WebSocket relay to an LLM")]
#[command(long_about = "Chat with an LLM from the terminal through a relay server.\n\nBoth sides read PORT from the environment; the client also needs PASSWORD and the server API_KEY.")]
struct Cli {
    /// Settings file (default: ~/.config/wsrelay/config.toml)
    #[arg(short = 'c', long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server in the foreground
    Server,
    /// Authenticate and start an interactive chat
    Client {
        /// Server host to connect to
        #[arg(long, default_value = protocol::DEFAULT_HOST)]
        host: String,
    },
    /// Open the settings file in $EDITOR
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server => run_server(cli.config).await,
        Commands::Client { host } => run_client(&host).await,
        Commands::Config => handle_config(cli.config),
    }
}

fn init_logging(default_directive: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(default_directive.parse()?)
                .add_directive("reqwest=warn".parse()?)
                .add_directive("tungstenite=warn".parse()?),
        )
        .init();
    Ok(())
}

/// Run the relay server until the process is stopped.
async fn run_server(config_path: Option<PathBuf>) -> Result<()> {
    init_logging("wsrelay=info")?;

    let settings = config::Settings::load(config_path.as_deref()).context("Failed to load configuration")?;
    let config = config::ServerConfig::from_env(settings).context("Missing required environment variables")?;

    let completion = &config.settings.completion;
    let backend = server::llm::OpenAIBackend::new(config.api_key.clone(), completion)
        .context("Failed to create completion API client")?;
    let relay = server::Relay::new(Arc::new(backend), completion.system_prompt.clone(), completion.timeout());
    info!(
        "Using backend: {} (model: {}, deadline: {:?})",
        relay.backend().name(),
        relay.backend().model(),
        completion.timeout()
    );

    let server = server::RelayServer::bind(&config.bind_addr(), relay, config.settings.server.reply_order).await?;
    server.run().await
}

/// Authenticate, connect, and chat. Never returns on success: the process
/// exits once the session ends.
async fn run_client(host: &str) -> Result<()> {
    init_logging("wsrelay=warn")?;

    let config = config::ClientConfig::from_env().context("Missing required environment variables")?;

    match client::authenticate(config.password.clone()).await {
        Ok(()) => println!("\nAccess granted.\n"),
        Err(client::AuthError::Mismatch) => {
            println!("\nIncorrect password. Exiting...");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    let url = protocol::server_url(host, config.port);
    match client::connect(&url).await {
        Ok(socket) => {
            let lines = client::spawn_stdin_reader();
            let mut stdout = std::io::stdout();
            let end = client::run_session(socket, &url, lines, &mut stdout).await?;
            info!("Session ended: {:?}", end);
        }
        Err(e) => {
            error!("Connection to {} failed: {}", url, e);
            println!("[Client] WebSocket error: {}", e);
        }
    }

    println!("Connection closed.");
    // The stdin reader is parked in a blocking read; exit instead of waiting
    // for the runtime to shut down.
    std::process::exit(0);
}

/// Handle the config command.
fn handle_config(config_path: Option<PathBuf>) -> Result<()> {
    let path = match config_path {
        Some(p) => p,
        None => config::Settings::config_path()?,
    };

    // Create default settings if they don't exist
    if !path.exists() {
        config::Settings::default().save(&path)?;
        println!("Created default config at {}", path.display());
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = ProcessCommand::new(&editor)
        .arg(&path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        eprintln!("Editor exited with non-zero status");
    }

    Ok(())
}

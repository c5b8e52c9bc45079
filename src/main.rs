use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

mod app;
mod config;
mod handler;
mod ollama;
mod tui;
mod ui;

use app::{App, ChatMessage, ChatRole};
use config::{Config, Overrides, Settings};
use ollama::{GenerateOptions, OllamaClient};

#[derive(Parser)]
#[command(name = "ollama-panel", version)]
#[command(about = "Chat with and generate text from a local Ollama-compatible server")]
struct Cli {
    /// Server base URL (without the /api suffix)
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Preferred model; the server's first model is used when it is not listed
    #[arg(short, long, global = true)]
    model: Option<String>,
    /// Sampling temperature for generation (0.0 - 2.0)
    #[arg(short, long, global = true)]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[arg(long, global = true)]
    max_tokens: Option<u32>,
    /// Tab shown when the TUI starts (chat or generate)
    #[arg(long, default_value = "chat")]
    tab: String,
    /// Log file used while the TUI is running
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List models available on the server
    Models,
    /// Send a single chat message and print the reply
    Chat {
        /// Message to send
        message: String,
    },
    /// Generate a completion for a prompt
    Generate {
        /// Prompt text
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_result = Config::load();
    let config_error = config_result.as_ref().err().map(|e| format!("{:#}", e));
    let config = config_result.unwrap_or_else(|_| Config::new());
    let settings = config.resolve(&Overrides {
        base_url: cli.base_url.clone(),
        model: cli.model.clone(),
        temperature: cli.temperature,
        max_tokens: cli.max_tokens,
    });

    match cli.command {
        None => {
            let log_path = match cli.log_file {
                Some(path) => path,
                None => default_log_path()?,
            };
            init_file_logging(&log_path)?;
            warn_config_error(config_error.as_deref());
            run_tui(&settings, &cli.tab).await
        }
        Some(command) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
                .try_init()
                .ok();
            warn_config_error(config_error.as_deref());
            run_command(&settings, command).await
        }
    }
}

fn warn_config_error(error: Option<&str>) {
    if let Some(e) = error {
        log::warn!("Ignoring unreadable config, using defaults: {}", e);
    }
}

fn default_log_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir().context("Could not determine data directory")?;
    Ok(data_dir.join("ollama-panel").join("ollama-panel.log"))
}

// The alternate screen owns stderr while the TUI runs, so logs go to a file.
fn init_file_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .ok();
    Ok(())
}

async fn run_tui(settings: &Settings, initial_tab: &str) -> Result<()> {
    info!("Starting TUI against {}", settings.base_url);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let mut app = App::new(settings, events.sender());
    app.config_path = Config::default_path().ok();
    if !app.switch_tab_by_id(initial_tab) {
        log::warn!("Unknown tab '{}', starting on chat", initial_tab);
    }

    handler::load_model_info(&mut app);
    handler::load_server_version(&app);

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if let Err(e) = &result {
        error!("TUI exited with error: {:#}", e);
    }
    result
}

async fn run_loop(
    terminal: &mut tui::Tui,
    app: &mut App,
    events: &mut tui::EventHandler,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}

async fn run_command(settings: &Settings, command: Commands) -> Result<()> {
    let client = OllamaClient::new(&settings.base_url);

    match command {
        Commands::Models => {
            let models = client
                .list_models()
                .await
                .with_context(|| format!("Could not reach {}", client.base_url()))?;
            if models.is_empty() {
                println!("No models available");
            }
            for model in models {
                println!("{}  {}", model.name, model.size_label());
            }
        }
        Commands::Chat { message } => {
            let message = message.trim().to_string();
            if message.is_empty() {
                return Ok(());
            }
            let model = resolve_model(&client, settings).await;
            let messages = [ChatMessage {
                role: ChatRole::User,
                content: message,
            }];
            let reply = client.chat(&model, &messages).await?;
            println!("{}", reply);
        }
        Commands::Generate { prompt } => {
            let prompt = prompt.trim();
            if prompt.is_empty() {
                return Ok(());
            }
            let model = resolve_model(&client, settings).await;
            let options = GenerateOptions {
                temperature: settings.temperature,
                num_predict: Some(settings.max_tokens),
            };
            let text = client.generate(&model, prompt, options).await?;
            println!("{}", text);
        }
    }

    Ok(())
}

/// The configured model when the server has it, else the first reported one.
/// Falls back to the configured name when the server reports nothing.
async fn resolve_model(client: &OllamaClient, settings: &Settings) -> String {
    match client.list_models().await {
        Ok(models) => {
            let preferred = models
                .iter()
                .find(|m| m.name == settings.model)
                .or_else(|| models.first());
            preferred
                .map(|m| m.name.clone())
                .unwrap_or_else(|| settings.model.clone())
        }
        Err(e) => {
            log::warn!("Could not list models: {}", e);
            settings.model.clone()
        }
    }
}

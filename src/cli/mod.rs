//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod say;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::cli::say::run_say;
use crate::core::config::{path_display, Config, Settings, SettingsOverrides};
use crate::core::transport::{HttpTransport, Transport};
use crate::ui::chat_loop::run_chat;
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "sidechat")]
#[command(about = "A terminal workspace with a streaming chat sidebar")]
#[command(
    long_about = "Sidechat is a full-screen terminal workspace with a resizable chat sidebar. \
Messages are sent to an OpenAI-compatible endpoint and the reply streams in token by token.\n\n\
Environment Variables:\n\
  GROQ_API_KEY          API key (required)\n\
  SIDECHAT_BASE_URL     Custom API base URL (optional, defaults to https://api.groq.com/openai/v1)\n\
  SKIP_ENV_VALIDATION   Start without an API key\n\
  SIDECHAT_LOG          Log filter used with --log-file (defaults to sidechat=info)\n\n\
Controls:\n\
  Enter             Send the message\n\
  Esc               Clear the input\n\
  Ctrl+N            Start a new chat\n\
  Ctrl+B            Collapse or expand the chat sidebar\n\
  Ctrl+Left/Right   Resize the chat sidebar\n\
  Ctrl+D            Toggle dark/light theme\n\
  Ctrl+S            Toggle sound\n\
  Up/Down/PgUp/PgDn Scroll the conversation\n\
  Ctrl+C            Quit the application"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for chat
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// API base URL
    #[arg(short = 'b', long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Color theme (dark or light)
    #[arg(short = 't', long, global = true, value_name = "THEME")]
    pub theme: Option<String>,

    /// Disable the terminal bell
    #[arg(long, global = true)]
    pub no_sound: bool,

    /// Text prepended to every message sent
    #[arg(short = 'c', long, global = true, value_name = "TEXT")]
    pub context: Option<String>,

    /// Write diagnostic logs to this file
    #[arg(short = 'l', long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Send a single prompt and print the reply
    Say {
        /// Prompt to send
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Show the configuration file and its values
    Config,
}

impl Args {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            theme: self.theme.clone(),
            no_sound: self.no_sound,
            context: self.context.clone(),
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if let Err(err) = init_tracing(args.log_file.as_deref()) {
        eprintln!("❌ Error: cannot open log file: {err}");
        std::process::exit(1);
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("❌ Error: {err}");
            std::process::exit(1);
        }
    };

    if let Some(Commands::Config) = args.command {
        println!("Config file: {}", path_display(Config::config_path()?));
        config.print_all();
        return Ok(());
    }

    let settings = match Settings::from_env(&config, args.overrides()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("❌ Error: {err}");
            std::process::exit(1);
        }
    };

    info!(
        base_url = %settings.transport.base_url,
        model = %settings.transport.model,
        "settings resolved"
    );
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(settings.transport.clone()));

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Say { prompt } => run_say(prompt, transport, &settings.context).await,
        Commands::Chat | Commands::Config => run_chat(settings, transport).await,
    }
}

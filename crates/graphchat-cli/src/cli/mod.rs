//! CLI entry and dispatch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use graphchat_core::config::{self, Config};
use graphchat_core::models::ModelKind;
use graphchat_core::{
    ControllerHandle, ControllerOptions, HttpTransport, SnapshotRx, interrupt, logging,
    spawn_controller,
};

mod commands;

#[derive(Parser)]
#[command(name = "graphchat")]
#[command(version)]
#[command(about = "Chat with a SPARQL knowledge-graph agent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Backend base URL (overrides GRAPHCHAT_BASE_URL and config)
    #[arg(long, global = true, value_name = "URL")]
    url: Option<String>,

    /// Backend model provider id (see `graphchat models`)
    #[arg(short, long, global = true, env = "GRAPHCHAT_MODEL")]
    model: Option<String>,

    /// Log at debug level (unless GRAPHCHAT_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Sends a single prompt and streams the answer
    Ask {
        /// The prompt to send to the agent
        #[arg(short, long)]
        prompt: String,
    },
    /// List or select backend models
    Models {
        #[command(subcommand)]
        command: Option<ModelsCommands>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ModelsCommands {
    /// Lists available model providers
    List,
    /// Saves a model provider as the default in config
    Use {
        /// Provider id
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

/// Everything needed to open chat requests against the backend.
#[derive(Debug, Clone)]
pub(crate) struct ChatSettings {
    pub base_url: String,
    pub model: ModelKind,
    pub connect_timeout: Option<Duration>,
    pub snapshot_capacity: usize,
}

impl ChatSettings {
    /// Resolves settings with precedence: flags > env > config.
    fn resolve(
        config: &Config,
        url_override: Option<&str>,
        model_override: Option<&str>,
    ) -> Result<Self> {
        let base_url = match url_override {
            Some(url) => config::resolve_base_url(Some(url), &config.base_url)?,
            None => config.effective_base_url()?,
        };

        Ok(Self {
            base_url,
            model: parse_model(model_override.unwrap_or(&config.model))?,
            connect_timeout: config.connect_timeout(),
            snapshot_capacity: config.snapshot_capacity(),
        })
    }

    /// Spawns a controller talking HTTP to the backend.
    pub fn start(&self) -> Result<(ControllerHandle, SnapshotRx)> {
        let transport = HttpTransport::new(&self.base_url, self.connect_timeout)?;
        tracing::debug!(url = transport.url(), model = %self.model, "chat transport ready");
        Ok(spawn_controller(
            Arc::new(transport),
            ControllerOptions {
                model: self.model.id().to_string(),
                snapshot_capacity: self.snapshot_capacity,
            },
        ))
    }
}

pub(crate) fn parse_model(id: &str) -> Result<ModelKind> {
    ModelKind::from_id(id).with_context(|| {
        format!(
            "Unknown model '{}'. Valid models: {}",
            id.trim(),
            ModelKind::valid_ids()
        )
    })
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    interrupt::init().context("install Ctrl+C handler")?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load().context("load config")?;

    let Cli {
        command,
        url,
        model,
        verbose,
    } = cli;

    let chat_settings = || -> Result<(ChatSettings, Option<_>)> {
        let settings = ChatSettings::resolve(&config, url.as_deref(), model.as_deref())?;
        let guard = logging::init(&config.logging, verbose, &config::paths::logs_dir())
            .context("initialize logging")?;
        Ok((settings, guard))
    };

    // default to chat mode
    let command = command.unwrap_or(Commands::Chat);

    match command {
        Commands::Chat => {
            let (settings, _guard) = chat_settings()?;
            commands::chat::run(&settings).await
        }
        Commands::Ask { prompt } => {
            let (settings, _guard) = chat_settings()?;
            commands::ask::run(&prompt, &settings).await
        }
        Commands::Models { command } => match command.unwrap_or(ModelsCommands::List) {
            ModelsCommands::List => {
                commands::models::list(model.as_deref().unwrap_or(&config.model));
                Ok(())
            }
            ModelsCommands::Use { id } => commands::models::select(&id),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            base_url: "http://config.example:8000".to_string(),
            model: "groq".to_string(),
            ..Config::default()
        };

        let settings =
            ChatSettings::resolve(&config, Some("http://flag.example/"), Some("ollama")).unwrap();
        assert_eq!(settings.base_url, "http://flag.example");
        assert_eq!(settings.model, ModelKind::Ollama);
    }

    #[test]
    fn test_unknown_model_lists_valid_ids() {
        let err = parse_model("gemini").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Unknown model 'gemini'"));
        assert!(message.contains("openai, groq, anthropic, mistral, ollama"));
    }

    #[test]
    fn test_cli_parses_ask_with_global_flags() {
        let cli = Cli::try_parse_from([
            "graphchat",
            "--url",
            "http://localhost:9000",
            "ask",
            "-p",
            "hi",
            "-m",
            "groq",
        ])
        .unwrap();
        assert_eq!(cli.url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(cli.model.as_deref(), Some("groq"));
        assert!(matches!(cli.command, Some(Commands::Ask { ref prompt }) if prompt == "hi"));
    }
}

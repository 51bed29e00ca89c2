//! chatgate - Chat completion gateway with real-time event fan-out
//!
//! Routes chat completion requests to configured upstream providers and
//! broadcasts completion events to connected WebSocket clients.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatgate::config::Config;
use chatgate::gateway::run_server;
use chatgate::registry::ModelRegistry;

#[derive(Parser)]
#[command(name = "chatgate")]
#[command(about = "Chat completion gateway with real-time event fan-out")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show the model-to-provider catalog
    Models {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatgate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            tracing::info!(config = %config, "Loading configuration");
            let (mut config, key_sources) = Config::from_file_with_env(&config)?;

            for (provider, source) in &key_sources {
                tracing::info!(provider = %provider, source = %source, "Resolved API key");
            }

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config } => {
            let (config, key_sources) = Config::from_file_with_env(&config)?;
            let registry = ModelRegistry::from_config(&config);

            println!("Configuration OK");
            println!("  listen: {}", config.server.listen);
            for provider in registry.providers() {
                let source = key_sources
                    .iter()
                    .find(|(name, _)| name == &provider.name)
                    .map(|(_, source)| source.to_string())
                    .unwrap_or_else(|| "none".to_string());
                println!(
                    "  provider {} ({}): {} models, key: {}{}",
                    provider.name,
                    provider.base_url,
                    provider.models.len(),
                    source,
                    if provider.enabled { "" } else { " [disabled]" },
                );
            }
            Ok(())
        }

        Commands::Models { config } => {
            let (config, _) = Config::from_file_with_env(&config)?;
            let registry = ModelRegistry::from_config(&config);

            if registry.available_models().is_empty() {
                println!("No models available (no enabled providers)");
                return Ok(());
            }
            for model in registry.available_models() {
                if let Some(provider) = registry.resolve(model) {
                    println!("{} -> {}", model, provider.name);
                }
            }
            Ok(())
        }
    }
}

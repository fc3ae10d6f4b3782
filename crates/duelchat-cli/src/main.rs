use clap::{Parser, Subcommand};
use duelchat_core::PersonaCatalog;
use duelchat_engine::{backend_from_config, ModelConfig};
use duelchat_gateway::{GatewayServer, HealthRegistry, ServingStatus};
use duelchat_session::{SessionStore, StoreConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Service name reported through the health endpoints.
const CHAT_SERVICE: &str = "duelchat.CharacterChat";

#[derive(Parser)]
#[command(name = "duelchat", about = "duelchat — character dialogue service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "duelchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage personas
    Persona {
        #[command(subcommand)]
        action: PersonaAction,
    },
}

#[derive(Subcommand)]
enum PersonaAction {
    /// List available personas
    List,
}

#[derive(Deserialize)]
struct DuelchatConfig {
    model: ModelConfig,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    sessions: SessionsConfig,
    /// Optional TOML file with extra personas, merged over the built-ins.
    persona_file: Option<PathBuf>,
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize)]
struct SessionsConfig {
    #[serde(default = "default_timeout_minutes")]
    timeout_minutes: u64,
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    shutdown_grace_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl SessionsConfig {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            session_timeout: Duration::from_secs(self.timeout_minutes * 60),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_timeout_minutes() -> u64 {
    60
}
fn default_sweep_interval_secs() -> u64 {
    600
}
fn default_shutdown_grace_secs() -> u64 {
    5
}

async fn load_catalog(config: &DuelchatConfig, config_dir: &std::path::Path) -> anyhow::Result<PersonaCatalog> {
    let mut catalog = PersonaCatalog::builtin();
    if let Some(path) = &config.persona_file {
        let path = if path.is_absolute() {
            path.clone()
        } else {
            config_dir.join(path)
        };
        let src = tokio::fs::read_to_string(&path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read persona file '{}': {}", path.display(), e)
        })?;
        let added = catalog.extend_from_toml(&src)?;
        info!(added, path = %path.display(), "extra personas loaded");
    }
    Ok(catalog)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    // Load config
    let config_str = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            cli.config.display(),
            e
        )
    })?;
    let mut config: DuelchatConfig = toml::from_str(&config_str)?;

    // The API key never lives in the config file; pull it from the
    // environment when absent.
    if config.model.api_key.is_empty() {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.model.api_key = key;
        }
    }

    let config_dir = cli
        .config
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .to_path_buf();

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            info!("Starting duelchat gateway on {}:{}", host, port);

            let catalog = Arc::new(load_catalog(&config, &config_dir).await?);
            info!(personas = catalog.len(), "persona catalog ready");

            let backend = backend_from_config(config.model.clone());
            let store = SessionStore::new(catalog, backend, config.sessions.store_config());

            let health = Arc::new(HealthRegistry::new());
            health.set_status(CHAT_SERVICE, ServingStatus::Unknown);

            let app = GatewayServer::build(store.clone(), health.clone());

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            health.set_status(CHAT_SERVICE, ServingStatus::Serving);
            info!("duelchat gateway listening on {}", addr);

            let shutdown_health = health.clone();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("shutdown signal received");
                    shutdown_health.set_status(CHAT_SERVICE, ServingStatus::NotServing);
                })
                .await?;

            store.shutdown().await;
            info!("duelchat gateway stopped");
        }
        Commands::Persona { action } => match action {
            PersonaAction::List => {
                let catalog = load_catalog(&config, &config_dir).await?;
                let mut roles: Vec<&str> = catalog.roles();
                roles.sort_unstable();

                println!("Available personas:");
                for role in &roles {
                    if let Ok(persona) = catalog.get(role) {
                        println!("  {} — {}", persona.role, persona.group);
                    }
                }
                println!("\nTotal: {} persona(s)", roles.len());
            }
        },
    }

    Ok(())
}

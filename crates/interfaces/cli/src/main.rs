//! Operator CLI — spec.md §6.6. Grounded on `crates/interfaces/cli/src/main.rs`'s
//! `clap` derive shape and startup sequence (`dotenvy` + `tracing_subscriber`
//! init, then `AppConfig::load_from`), narrowed from the teacher's
//! onboarding-wizard/TUI/tool-calling surface to the daemon lifecycle and
//! skill-management commands this spec names. Acts as the composition root:
//! the only crate depending on both `omnibrain-daemon` and `omnibrain-api`/
//! `omnibrain-telegram`, so it is where the HTTP server and Telegram
//! notification sink are actually spawned alongside `Daemon::run()`.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use omnibrain_api::{ApiState, LlmAgentFactory, LlmModels};
use omnibrain_chat::{AgentCache, ChatBridge, RegexSanitizer};
use omnibrain_config::AppConfig;
use omnibrain_daemon::Daemon;
use omnibrain_llm::{LlmRouter, Provider};
use omnibrain_memory::Memory;
use omnibrain_patterns::PatternDetector;
use omnibrain_store::Store;

const CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(name = "omnibrain", version, about = "A personal AI chief of staff")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the daemon: proactive engine, API server, and Telegram sink.
    Run {
        /// Run one proactive check immediately and exit, instead of looping.
        #[arg(long)]
        once: bool,
    },
    /// Print daemon configuration and subsystem health, then exit.
    Doctor,
    /// Manage installed skills.
    Skills {
        #[command(subcommand)]
        command: SkillCommands,
    },
}

#[derive(Debug, Subcommand)]
enum SkillCommands {
    /// List installed skills.
    List,
    /// Register a skill by name.
    Install { name: String },
    /// Remove an installed skill.
    Remove { name: String },
    /// Enable a disabled skill.
    Enable { name: String },
    /// Disable an enabled skill.
    Disable { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = AppConfig::load_from(CONFIG_PATH)?;

    match Cli::parse().command.unwrap_or(Commands::Run { once: false }) {
        Commands::Run { once } => run(config, once).await?,
        Commands::Doctor => doctor(config).await?,
        Commands::Skills { command } => skills(config, command)?,
    }

    Ok(())
}

async fn run(config: AppConfig, once: bool) -> Result<()> {
    let store = Arc::new(Store::open(config.store_path())?);
    let daemon = Daemon::new(config.clone(), store.clone());
    let resources = daemon.resources().clone();

    if once {
        tracing::info!("running one maintenance sweep and exiting (--once)");
        let expired = resources.store.expire_old_proposals()?;
        let pruned = resources.store.prune(90, 30, 30)?;
        tracing::info!(expired, ?pruned, "maintenance sweep complete");
        return Ok(());
    }

    let memory = resources.memory.clone().unwrap_or_else(|| Arc::new(Memory::new(store.clone())));
    let patterns = resources.patterns.clone().unwrap_or_else(|| Arc::new(PatternDetector::new(store.clone())));

    let primary = if config.llm.provider.eq_ignore_ascii_case("openrouter") { Provider::OpenRouter } else { Provider::Ollama };
    let llm_models =
        LlmModels { primary, ollama_model: config.llm.ollama_model.clone(), openrouter_model: config.llm.openrouter_model.clone() };
    let router = resources.llm.clone().unwrap_or_else(|| Arc::new(LlmRouter::default()));
    let factory = Arc::new(LlmAgentFactory::new(
        router,
        llm_models.primary,
        llm_models.ollama_model.clone(),
        llm_models.openrouter_model.clone(),
    ));
    let cache = Arc::new(AgentCache::new(factory));
    let chat = Arc::new(ChatBridge::new(store.clone(), memory, patterns, cache, Arc::new(RegexSanitizer)));

    let api_state = ApiState::new(resources.clone(), chat, None, config.daemon.api_key.clone(), llm_models);
    let router = omnibrain_api::build_router(api_state);
    let addr = format!("{}:{}", config.daemon.api_host, config.daemon.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "api server listening");
    let api_handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            tracing::error!(%err, "api server exited");
        }
    });

    let telegram_handle = if config.integrations.telegram_enabled {
        match (&config.integrations.telegram_bot_token, &config.integrations.telegram_chat_id) {
            (Some(token), Some(chat_id)) => {
                let sink = omnibrain_telegram::TelegramSink::new(token.clone(), chat_id.clone());
                let bus = resources.bus.clone();
                let store = store.clone();
                Some(tokio::spawn(omnibrain_telegram::run_notification_forwarder(bus, store, sink)))
            }
            _ => {
                tracing::warn!("telegram_enabled is set but bot token or chat id is missing, skipping");
                None
            }
        }
    } else {
        None
    };

    daemon.run().await?;

    api_handle.abort();
    if let Some(handle) = telegram_handle {
        handle.abort();
    }
    Ok(())
}

async fn doctor(config: AppConfig) -> Result<()> {
    let store = Store::open(config.store_path())?;
    println!("omnibrain doctor");
    println!("- store path    : {}", config.store_path().display());
    println!("- provider      : {}", config.llm.provider);
    println!("- model         : {}", config.active_model());
    println!("- onboarding    : {}", if config.needs_onboarding() { "pending" } else { "complete" });
    println!("- pending props : {}", store.list_pending_proposals()?.len());
    println!("- installed skl : {}", store.list_skills()?.len());
    println!("- telegram      : {}", if config.integrations.telegram_enabled { "enabled" } else { "disabled" });
    println!("- api           : {}:{}", config.daemon.api_host, config.daemon.api_port);
    Ok(())
}

fn skills(config: AppConfig, command: SkillCommands) -> Result<()> {
    let store = Store::open(config.store_path())?;
    match command {
        SkillCommands::List => {
            for skill in store.list_skills()? {
                println!("{:<24} {:<8} {}", skill.name, if skill.enabled { "enabled" } else { "disabled" }, skill.description);
            }
        }
        SkillCommands::Install { name } => {
            let now = chrono::Utc::now();
            let skill = omnibrain_store::schema::InstalledSkill {
                name: name.clone(),
                version: String::new(),
                description: String::new(),
                author: String::new(),
                category: "other".to_string(),
                permissions: Vec::new(),
                enabled: true,
                installed_at: now,
                updated_at: now,
                settings: serde_json::Value::Null,
                data: serde_json::Value::Null,
            };
            store.register_skill_if_absent(&skill)?;
            println!("installed {name}");
        }
        SkillCommands::Remove { name } => {
            store.delete_skill(&name)?;
            println!("removed {name}");
        }
        SkillCommands::Enable { name } => {
            store.set_skill_enabled(&name, true)?;
            println!("enabled {name}");
        }
        SkillCommands::Disable { name } => {
            store.set_skill_enabled(&name, false)?;
            println!("disabled {name}");
        }
    }
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use shoptalk::cache::ResultCache;
use shoptalk::config::AppConfig;
use shoptalk::context::{ContextAssembler, SemanticSearchClient};
use shoptalk::knowledge::KnowledgeBase;
use shoptalk::llm::{ChatBackend, OpenAiBackend};
use shoptalk::parts::PartsFinder;
use shoptalk::server::{AppState, run};
use shoptalk::session::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "shoptalk", about = "Web chat relay for an automotive repair assistant")]
struct Args {
    /// Bind host (overrides SHOPTALK_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides SHOPTALK_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Path to a .env file to load before reading configuration
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Knowledge base path (overrides SHOPTALK_KNOWLEDGE_BASE)
    #[arg(long)]
    knowledge_base: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.knowledge_base {
        config.knowledge_base_path = path.display().to_string();
    }
    let config = Arc::new(config);

    info!("Starting shoptalk chat relay");
    info!("Model: {}", config.model);

    // The server starts without an API key so status reporting still works;
    // chat requests then return a configuration error.
    let missing = config.missing_required();
    if !missing.is_empty() {
        warn!("Missing environment variables: {}", missing.join(", "));
        warn!("Chat requests will fail until OPENAI_API_KEY is set");
    }

    let backend: Option<Arc<dyn ChatBackend>> = match OpenAiBackend::new(&config) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(err) => {
            warn!(error = %err, "model backend not configured");
            None
        }
    };

    let cache = Arc::new(ResultCache::new(
        config.cache_path.clone(),
        config.cache_ttl_secs,
        config.cache_max_entries,
    ));

    let knowledge = KnowledgeBase::load(std::path::Path::new(&config.knowledge_base_path));
    if knowledge.is_none() {
        warn!("Knowledge base unavailable; context assembly will return empty context");
    }

    let semantic = match &config.semantic_search_url {
        Some(url) => Some(SemanticSearchClient::new(
            url.clone(),
            config.semantic_search_timeout,
        )?),
        None => None,
    };

    let context = Arc::new(ContextAssembler::new(
        knowledge,
        cache.clone(),
        semantic,
        config.common_issues_limit,
    ));

    let parts = match &config.parts_search_url {
        Some(url) => Some(Arc::new(PartsFinder::new(
            url.clone(),
            config.parts_search_timeout,
            cache.clone(),
        )?)),
        None => None,
    };

    let sessions = Arc::new(SessionStore::new(config.history_max_exchanges));

    let state = AppState {
        config,
        backend,
        context,
        sessions,
        parts,
    };

    run(state).await
}

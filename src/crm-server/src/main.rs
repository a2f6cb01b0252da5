//! CRM server: customer segmentation, live counts, and CSV export over HTTP.

use clap::Parser;
use crm_api::{ApiServer, AppState};
use crm_core::config::AppConfig;
use crm_store::{MemoryStore, StoreHandles};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "crm-server")]
#[command(about = "Customer segmentation and export service")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "CRM_SERVER_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "CRM_SERVER__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CRM_SERVER__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// PostgreSQL connection URL (overrides config)
    #[arg(long, env = "CRM_SERVER__DATABASE__URL")]
    database_url: Option<String>,

    /// Ignore any database URL and serve seeded in-memory data
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_server=info,crm_api=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("CRM server starting up");

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        database = config.database.is_configured() && !cli.in_memory,
        schema = %config.database.schema,
        "Configuration loaded"
    );

    let stores = if cli.in_memory {
        info!("Running with the in-memory store");
        StoreHandles::memory(Arc::new(MemoryStore::with_demo_data()))
    } else {
        StoreHandles::open(&config.database).await?
    };

    let state = AppState::new(&config, stores);
    let api_server = ApiServer::new(config.clone(), state);

    if config.metrics.enabled {
        if let Err(e) = api_server.start_metrics() {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    info!("CRM server is ready to serve traffic");

    api_server.start_http().await?;

    Ok(())
}

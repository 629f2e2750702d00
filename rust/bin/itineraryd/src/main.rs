//! `itineraryd`: logistic itinerary server.
//!
//! Usage:
//!   itineraryd [-c <config.toml>] [--listen <addr>] [--public-dir <dir>]
//!
//! Without `-c` every setting takes its default; the upstream credentials
//! then have to come from `SALES_ORDERS_AUTH_TOKEN` and
//! `TRANSACTION_AUTH_TOKEN`.

mod bootstrap;
mod config;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use itinerary_core::Module;
use tracing::info;

use config::ServerConfig;
use routes::AppState;

/// Logistic itinerary server.
#[derive(Parser, Debug)]
#[command(name = "itineraryd", about = "Logistic itinerary server and ERP forwarding proxy")]
struct Cli {
    /// Path to the config file.
    #[arg(short = 'c', long = "config", env = "ITINERARY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides config and PORT).
    #[arg(long = "listen")]
    listen: Option<String>,

    /// Directory of static files (overrides config).
    #[arg(long = "public-dir")]
    public_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let mut server_config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ServerConfig::load(path)?
        }
        None => ServerConfig::default(),
    };
    server_config.apply_env(|name| std::env::var(name).ok());
    if let Some(listen) = cli.listen {
        server_config.server.listen = listen;
    }
    if let Some(dir) = cli.public_dir {
        server_config.server.public_dir = dir;
    }

    // Refuse to start without upstream credentials.
    bootstrap::verify_config(&server_config)?;

    let gateway = Arc::new(bootstrap::build_gateway(&server_config.upstream));
    info!("Upstream gateway at {}", gateway.base_url());

    let itinerary_module = itinerary::ItineraryModule::new(
        gateway.clone(),
        server_config.picker.clone(),
        server_config.print.clone(),
    );
    info!("Itinerary module initialized");

    let module_routes = vec![(itinerary_module.name(), itinerary_module.routes())];

    let public_dir = PathBuf::from(&server_config.server.public_dir);
    let app = routes::build_router(AppState { gateway }, module_routes, &public_dir);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&server_config.server.listen).await?;
    info!("itineraryd listening on {}", server_config.server.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

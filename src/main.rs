use anyhow::{Context, Result};
use kgserve::api::HttpServer;
use kgserve::graph::{FalkorStore, GraphStore};
use kgserve::{Config, FalkorGraphRag};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    // Parse command-line arguments
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "verify" => {
            // Check configuration and graph database reachability
            run_verification().await?;
        }
        "serve" => {
            run_http_server().await?;
        }
        other => {
            anyhow::bail!("Unknown command '{}'. Use 'serve' (default) or 'verify'.", other);
        }
    }

    Ok(())
}

/// Run the HTTP server
async fn run_http_server() -> Result<()> {
    log::info!("Starting kgserve v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    if config.model.api_key.is_none() {
        log::warn!("No LITELLM_API_KEY or OPENAI_API_KEY set; model requests will be unauthenticated");
    }

    let server = HttpServer::new(config, Arc::new(FalkorGraphRag));
    server.run().await?;

    Ok(())
}

/// Load configuration and check that FalkorDB answers
async fn run_verification() -> Result<()> {
    log::info!("Starting kgserve v{} (verify)", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Graph database: {}", config.falkor_url());
    log::info!("Model: {} via {}", config.model.name, config.model.api_base);
    log::info!("Default graph: {}", config.graph.default_name);

    let store = FalkorStore::connect(&config.falkor)?;
    let pong = store
        .ping()
        .await
        .with_context(|| format!("FalkorDB at {} is not reachable", config.falkor_url()))?;
    log::info!("✓ FalkorDB replied {}", pong);

    let graphs = store.list_graphs().await.context("GRAPH.LIST failed; is the FalkorDB module loaded?")?;
    if graphs.iter().any(|g| g == &config.graph.default_name) {
        log::info!("✓ Default graph '{}' exists", config.graph.default_name);
    } else {
        log::warn!(
            "Default graph '{}' does not exist yet; POST /build before /chat",
            config.graph.default_name
        );
    }
    log::info!("{} graphs in database", graphs.len());

    Ok(())
}

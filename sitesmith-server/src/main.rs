use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Use JSON logs in production (SITESMITH_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("SITESMITH_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("sitesmith_server=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = sitesmith_server::config::ServerConfig::parse();
    tracing::info!("Starting sitesmith on {}", config.listen_addr);
    tracing::info!(model = %config.model, "Inference via {}", config.inference_base_url);
    tracing::info!("Publishing to {}", config.hub_base_url);
    if config.default_token.is_some() {
        tracing::info!("Shared fallback token configured for anonymous generation");
    }

    sitesmith_server::server::Server::new(config).run().await
}

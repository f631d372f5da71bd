use std::sync::Arc;

use dotenv::dotenv;
use relay_server::{RelayServer, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> relay_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    let config = Settings::new()?;

    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Configuration loaded successfully ({} environment)", config.environment);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1) as usize)
        .enable_all()
        .build()?
        .block_on(serve(config))
}

async fn serve(config: Settings) -> relay_server::Result<()> {
    let listener = RelayServer::bind(&config).await?;
    let server = Arc::new(RelayServer::new(config.relay.delivery));

    tokio::select! {
        _ = server.clone().run(listener) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!(
                "Shutdown requested, dropping {} active sessions",
                server.registry().size().await
            );
        }
    }

    Ok(())
}

use anyhow::Context;

use ig_engage::api;
use ig_engage::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    let database_url = config.database_url.clone();

    api::serve(config)
        .await
        .with_context(|| format!("Server failed (database {database_url})"))?;
    Ok(())
}

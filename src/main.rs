//! StudyNote API server

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use studynote_api::{
    config::{Cli, Config},
    server,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads its env fallbacks
    let _ = dotenv();

    init_tracing();

    let config = Config::from_cli(Cli::parse())?;
    info!(
        storage = ?config.storage,
        token_ttl_hours = config.token_ttl.num_hours(),
        "📝 StudyNote API starting"
    );

    server::serve(config).await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studynote_api=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

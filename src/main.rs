use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wfresh::config::{Cli, Config};
use wfresh::db;
use wfresh::forum::ThreadStore;
use wfresh::menu::{AviMenuFetcher, WeekMenuCache};
use wfresh::routes;
use wfresh::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let fetcher = AviMenuFetcher::new(&config.menu)?;
    let menu = WeekMenuCache::new(
        Arc::new(fetcher),
        config.menu.halls.clone(),
        config.menu_cache_path(),
    )
    .with_concurrency(config.menu.fetch_concurrency);
    tracing::info!(
        "Menu cache at {} for {} halls",
        menu.path().display(),
        config.menu.halls.len()
    );

    let state = AppState {
        threads: ThreadStore::new(pool.clone()),
        db: pool,
        config: config.clone(),
        menu: Arc::new(menu),
    };

    let app = routes::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use std::error::Error;
use std::sync::Arc;

use story_relay::{create_stories_router, logging, StoriesConfig, StoriesState, StoryStore};

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run().await {
        tracing::error!("Story service failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = StoriesConfig::from_env()?;
    let addr = config.listen.addr()?;

    tracing::info!("Story service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database: {}", config.database_path.display());

    // Schema is created before the listener binds, so the first request always sees the table.
    let store = StoryStore::open(&config.database_path)?;
    let app = create_stories_router(Arc::new(StoriesState { store }));

    tracing::info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use std::error::Error;
use std::sync::Arc;

use story_relay::tts::LazyPiperSynthesizer;
use story_relay::{create_relay_router, logging, CompletionClient, RelayConfig, RelayState, SpeechRelay};

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run().await {
        tracing::error!("Chat relay failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = RelayConfig::from_env()?;
    let addr = config.listen.addr()?;

    tracing::info!("Chat relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Completion model: {}", config.chat.model);
    tracing::info!("Static directory: {}", config.static_dir.display());
    tracing::info!("Audio retention: {:?}", config.retention);

    std::fs::create_dir_all(&config.static_dir)?;
    // Chat keeps working without a voice; /tts reports failures until the voice loads.
    let synthesizer = LazyPiperSynthesizer::new(&config.voices_dir, &config.voice);
    if let Err(e) = synthesizer.preload() {
        tracing::warn!("Piper voice {} not loaded, TTS unavailable for now: {}", config.voice, e);
    }

    let state = Arc::new(RelayState {
        chat: CompletionClient::new(config.chat),
        speech: SpeechRelay::new(Box::new(synthesizer), config.static_dir, config.retention),
    });

    let app = create_relay_router(state);

    tracing::info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers;
use crate::chat::CompletionClient;
use crate::store::StoryStore;
use crate::tts::{SpeechRelay, AUDIO_URL_PREFIX};

pub struct RelayState {
    pub chat: CompletionClient,
    pub speech: SpeechRelay,
}

pub struct StoriesState {
    pub store: StoryStore,
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Index page, `/chat`, `/tts` and the generated audio under `/static`.
pub fn create_relay_router(state: Arc<RelayState>) -> Router {
    let audio = ServeDir::new(state.speech.audio_dir());

    Router::new()
        .route("/", get(handlers::index))
        .route("/chat", post(handlers::chat))
        .route("/tts", post(handlers::tts))
        .route("/health", get(handlers::health))
        .nest_service(AUDIO_URL_PREFIX, audio)
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn create_stories_router(state: Arc<StoriesState>) -> Router {
    Router::new()
        .route(
            "/stories",
            get(handlers::list_stories).post(handlers::create_story),
        )
        .route("/health", get(handlers::health))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

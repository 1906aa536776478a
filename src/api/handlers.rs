use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Html,
    Json,
};
use std::sync::Arc;

use super::{
    ChatRequest, ChatResponse, CreateStoryRequest, CreateStoryResponse, HealthResponse,
    StoryView, TtsRequest, TtsResponse,
};
use crate::api::routes::{RelayState, StoriesState};
use crate::error::AppError;
use crate::store::{NewStory, StoreError, StoreResult, StoryStore};

const INDEX_HTML: &str = include_str!("../../templates/index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn chat(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload?;

    if request.message.trim().is_empty() {
        return Err(AppError::BadRequest("No message provided".into()));
    }

    let response = state.chat.complete(&request.message).await?;

    Ok(Json(ChatResponse { response }))
}

pub async fn tts(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Json<TtsResponse>, AppError> {
    let Json(request) = payload?;

    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("No text provided".into()));
    }

    // Synthesis and the file write block; keep them off the async workers.
    let artifact = tokio::task::spawn_blocking(move || state.speech.generate(&request.text))
        .await
        .map_err(|e| AppError::GenerationFailed(e.to_string()))??;

    Ok(Json(TtsResponse {
        audio_url: artifact.url,
    }))
}

pub async fn list_stories(
    State(state): State<Arc<StoriesState>>,
) -> Result<Json<Vec<StoryView>>, AppError> {
    let stories = with_store(state, |store| store.list_all_ordered_by_time_desc()).await?;
    Ok(Json(stories.into_iter().map(StoryView::from).collect()))
}

pub async fn create_story(
    State(state): State<Arc<StoriesState>>,
    payload: Result<Json<CreateStoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateStoryResponse>), AppError> {
    let Json(request) = payload?;

    let story = NewStory::new(
        required(request.title, "title")?,
        required(request.content, "content")?,
        required(request.author, "author")?,
    )
    .with_location(request.location.unwrap_or_default());

    let id = with_store(state, move |store| store.insert(&story)).await?;
    tracing::info!("Stored story {}", id);

    Ok((
        StatusCode::CREATED,
        Json(CreateStoryResponse {
            message: "Story submitted successfully!".to_string(),
            id,
        }),
    ))
}

/// Runs a store call on the blocking pool; rusqlite and the connection mutex both block.
async fn with_store<T, F>(state: Arc<StoriesState>, op: F) -> Result<T, AppError>
where
    F: FnOnce(&StoryStore) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || op(&state.store))
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?;
    Ok(result?)
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::BadRequest(format!("Missing required field: {}", field))),
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

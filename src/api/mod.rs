pub mod handlers;
pub mod routes;

use serde::{Deserialize, Serialize};

use crate::store::{Story, StoryId};

pub const STORY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TtsResponse {
    pub audio_url: String,
}

/// Story submission. Required fields are optional here so absence becomes a 400, not a 422.
#[derive(Debug, Deserialize)]
pub struct CreateStoryRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateStoryResponse {
    pub message: String,
    pub id: StoryId,
}

#[derive(Debug, Serialize)]
pub struct StoryView {
    pub id: StoryId,
    pub title: String,
    pub content: String,
    pub author: String,
    pub location: Option<String>,
    pub timestamp: String,
}

impl From<Story> for StoryView {
    fn from(story: Story) -> Self {
        Self {
            id: story.id,
            title: story.title,
            content: story.content,
            author: story.author,
            location: story.location,
            timestamp: story.timestamp.format(STORY_TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

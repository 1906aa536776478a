//! Two small web backends: a chat/text-to-speech relay and a success-story service.

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;
pub mod tts;

pub use api::routes::{create_relay_router, create_stories_router, RelayState, StoriesState};
pub use chat::{ChatError, CompletionClient};
pub use config::{ChatConfig, ConfigError, RelayConfig, StoriesConfig};
pub use error::AppError;
pub use store::{NewStory, Story, StoryStore};
pub use tts::{RetentionPolicy, SpeechError, SpeechRelay, Synthesizer};

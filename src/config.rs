//! Environment-driven configuration for both binaries.
//!
//! Values are read through a lookup function so the parsing can be exercised
//! without touching the process environment.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::tts::RetentionPolicy;

pub const DEFAULT_CHAT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "deepseek/deepseek-chat-v3.1:free";
pub const DEFAULT_MAX_AUDIO_FILES: usize = 100;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl ListenConfig {
    fn from_lookup<F>(lookup: &F, default_port: u16) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(lookup, "PORT", default_port)?,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            var: "HOST",
            value: self.host.clone(),
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub referer: String,
    pub title: String,
}

// Config values end up in startup logs; the key never does.
impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub listen: ListenConfig,
    pub chat: ChatConfig,
    pub static_dir: PathBuf,
    pub voices_dir: PathBuf,
    pub voice: String,
    pub retention: RetentionPolicy,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENROUTER_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?;

        let chat = ChatConfig {
            endpoint: lookup("CHAT_API_URL").unwrap_or_else(|| DEFAULT_CHAT_API_URL.to_string()),
            api_key,
            model: lookup("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            referer: lookup("CHAT_REFERER").unwrap_or_else(|| "http://localhost:5000".to_string()),
            title: lookup("CHAT_TITLE").unwrap_or_else(|| "DeepSeek Chat App".to_string()),
        };

        let max_files: usize = parse_or(&lookup, "TTS_MAX_FILES", DEFAULT_MAX_AUDIO_FILES)?;

        Ok(Self {
            listen: ListenConfig::from_lookup(&lookup, 5000)?,
            chat,
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "./static".to_string()).into(),
            voices_dir: lookup("VOICES_DIR").unwrap_or_else(|| "./voices".to_string()).into(),
            voice: lookup("TTS_VOICE").unwrap_or_else(|| "en_US-lessac-medium".to_string()),
            retention: RetentionPolicy::keep_latest(max_files),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoriesConfig {
    pub listen: ListenConfig,
    pub database_path: PathBuf,
}

impl StoriesConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            listen: ListenConfig::from_lookup(&lookup, 5001)?,
            database_path: lookup("DATABASE_PATH")
                .unwrap_or_else(|| "./stories.db".to_string())
                .into(),
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => {
            let parsed = value.trim().parse();
            parsed.map_err(|_| ConfigError::Invalid { var, value })
        }
        None => Ok(default),
    }
}

pub mod piper;
pub mod retention;
pub mod voice;

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

pub use piper::{LazyPiperSynthesizer, PiperSynthesizer};
pub use retention::RetentionPolicy;
pub use voice::Voice;

/// URL path under which the audio directory is served.
pub const AUDIO_URL_PREFIX: &str = "/static";

const ARTIFACT_PREFIX: &str = "tts_";
const ARTIFACT_EXTENSION: &str = ".wav";

#[derive(thiserror::Error, Debug)]
pub enum SynthesisError {
    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("Invalid voice config: {0}")]
    VoiceConfig(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Phonemizer failed: {0}")]
    Phonemizer(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("WAV encoding failed: {0}")]
    Encoding(String),
}

/// Failure of one text-to-speech request.
#[derive(thiserror::Error, Debug)]
pub enum SpeechError {
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("could not store audio artifact: {0}")]
    Storage(#[from] std::io::Error),
}

/// Text to WAV bytes. Implementations are called from the blocking pool.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub file_name: String,
    pub path: PathBuf,
    pub url: String,
}

/// Synthesizes text into uniquely named files inside the static directory.
pub struct SpeechRelay {
    synthesizer: Box<dyn Synthesizer>,
    audio_dir: PathBuf,
    retention: RetentionPolicy,
}

impl SpeechRelay {
    pub fn new(
        synthesizer: Box<dyn Synthesizer>,
        audio_dir: impl Into<PathBuf>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            synthesizer,
            audio_dir: audio_dir.into(),
            retention,
        }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn generate(&self, text: &str) -> Result<AudioArtifact, SpeechError> {
        let file_name = format!(
            "{}{}{}",
            ARTIFACT_PREFIX,
            Uuid::new_v4().simple(),
            ARTIFACT_EXTENSION
        );

        let wav = self.synthesizer.synthesize(text)?;

        fs::create_dir_all(&self.audio_dir)?;
        let path = self.audio_dir.join(&file_name);
        fs::write(&path, &wav)?;

        tracing::info!("Generated {} ({} bytes)", file_name, wav.len());

        match self.retention.prune(&self.audio_dir, &file_name) {
            Ok(0) => {}
            Ok(removed) => tracing::info!("Pruned {} old audio artifacts", removed),
            Err(e) => tracing::warn!("Audio retention cleanup failed: {}", e),
        }

        Ok(AudioArtifact {
            url: format!("{}/{}", AUDIO_URL_PREFIX, file_name),
            file_name,
            path,
        })
    }
}

//! Piper voice files: `<id>.onnx` next to its `<id>.onnx.json` description.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::SynthesisError;

const FALLBACK_ESPEAK_VOICE: &str = "en";

/// The parts of `<id>.onnx.json` synthesis reads; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceDescription {
    pub audio: AudioSection,
    #[serde(default)]
    pub espeak: Option<EspeakSection>,
    #[serde(default)]
    pub phoneme_id_map: HashMap<String, Vec<i64>>,
    #[serde(default)]
    pub inference: SynthesisParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioSection {
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspeakSection {
    pub voice: String,
}

/// Piper's `scales` input. Keys missing from the file keep Piper's stock values.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SynthesisParams {
    pub noise_scale: f32,
    pub length_scale: f32,
    pub noise_w: f32,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            noise_scale: 0.667,
            length_scale: 1.0,
            noise_w: 0.8,
        }
    }
}

impl SynthesisParams {
    /// Tensor order expected by the model.
    pub fn as_scales(&self) -> [f32; 3] {
        [self.noise_scale, self.length_scale, self.noise_w]
    }
}

#[derive(Debug)]
pub struct Voice {
    pub id: String,
    pub model_path: PathBuf,
    pub description: VoiceDescription,
}

impl Voice {
    pub fn load(voices_dir: &Path, voice_id: &str) -> Result<Self, SynthesisError> {
        let model_path = voices_dir.join(format!("{voice_id}.onnx"));
        if !model_path.is_file() {
            return Err(SynthesisError::VoiceNotFound(voice_id.to_string()));
        }

        let mut description_path = model_path.clone().into_os_string();
        description_path.push(".json");
        let description_path = PathBuf::from(description_path);
        if !description_path.is_file() {
            return Err(SynthesisError::VoiceNotFound(format!(
                "{voice_id} (missing config file)"
            )));
        }

        let file = File::open(&description_path)?;
        let description: VoiceDescription = serde_json::from_reader(file)?;

        Ok(Self {
            id: voice_id.to_string(),
            model_path,
            description,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.description.audio.sample_rate
    }

    pub fn phoneme_ids(&self) -> &HashMap<String, Vec<i64>> {
        &self.description.phoneme_id_map
    }

    pub fn params(&self) -> SynthesisParams {
        self.description.inference
    }

    /// espeak-ng voice used for phonemization.
    pub fn espeak_voice(&self) -> &str {
        match &self.description.espeak {
            Some(section) => &section.voice,
            None => FALLBACK_ESPEAK_VOICE,
        }
    }
}

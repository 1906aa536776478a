use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

use hound::{SampleFormat, WavSpec, WavWriter};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;

use super::voice::Voice;
use super::{SynthesisError, Synthesizer};

pub struct PiperEngine {
    session: Mutex<Session>,
    scales: [f32; 3],
}

impl PiperEngine {
    pub fn new(voice: &Voice) -> Result<Self, SynthesisError> {
        let session = Session::builder()
            .map_err(|e| inference(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| inference(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| inference(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&voice.model_path)
            .map_err(|e| inference(format!("Failed to load model: {}", e)))?;

        Ok(Self {
            session: Mutex::new(session),
            scales: voice.params().as_scales(),
        })
    }

    pub fn synthesize(&self, phoneme_ids: &[i64]) -> Result<Vec<f32>, SynthesisError> {
        if phoneme_ids.is_empty() {
            return Ok(Vec::new());
        }

        let input_len = phoneme_ids.len();

        // input: [1, phoneme_count], input_lengths: [1], scales: [3]
        let input_value = Value::from_array((vec![1, input_len], phoneme_ids.to_vec()))
            .map_err(|e| inference(format!("Failed to create input tensor: {}", e)))?;

        let lengths_value = Value::from_array((vec![1], vec![input_len as i64]))
            .map_err(|e| inference(format!("Failed to create lengths tensor: {}", e)))?;

        let scales_value = Value::from_array((vec![3], self.scales.to_vec()))
            .map_err(|e| inference(format!("Failed to create scales tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| inference("Piper session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![input_value, lengths_value, scales_value])
            .map_err(|e| inference(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get("output")
            .or_else(|| outputs.get("audio"))
            .ok_or_else(|| inference("Missing output tensor".to_string()))?;

        let (_, samples) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| inference(format!("Failed to extract output tensor: {}", e)))?;

        Ok(samples.to_vec())
    }
}

fn inference(msg: String) -> SynthesisError {
    SynthesisError::Inference(msg)
}

/// One loaded Piper voice, ready to turn text into WAV bytes.
pub struct PiperSynthesizer {
    voice: Voice,
    engine: PiperEngine,
}

impl PiperSynthesizer {
    pub fn load(voices_dir: &Path, voice_id: &str) -> Result<Self, SynthesisError> {
        let voice = Voice::load(voices_dir, voice_id)?;
        let engine = PiperEngine::new(&voice)?;
        tracing::info!(
            "Loaded Piper voice {} ({} Hz)",
            voice.id,
            voice.sample_rate()
        );
        Ok(Self { voice, engine })
    }
}

/// Loads the Piper voice on first use and keeps it; a failed load is retried on the next request.
pub struct LazyPiperSynthesizer {
    voices_dir: PathBuf,
    voice_id: String,
    loaded: RwLock<Option<Arc<PiperSynthesizer>>>,
}

impl LazyPiperSynthesizer {
    pub fn new(voices_dir: impl Into<PathBuf>, voice_id: impl Into<String>) -> Self {
        Self {
            voices_dir: voices_dir.into(),
            voice_id: voice_id.into(),
            loaded: RwLock::new(None),
        }
    }

    /// Loads the voice now so startup can report a missing model early.
    pub fn preload(&self) -> Result<(), SynthesisError> {
        self.get().map(|_| ())
    }

    fn get(&self) -> Result<Arc<PiperSynthesizer>, SynthesisError> {
        {
            let loaded = self.loaded.read().map_err(|_| poisoned())?;
            if let Some(synthesizer) = loaded.as_ref() {
                return Ok(Arc::clone(synthesizer));
            }
        }

        let synthesizer = Arc::new(PiperSynthesizer::load(&self.voices_dir, &self.voice_id)?);

        let mut loaded = self.loaded.write().map_err(|_| poisoned())?;
        Ok(Arc::clone(loaded.get_or_insert(synthesizer)))
    }
}

fn poisoned() -> SynthesisError {
    inference("Piper voice cache lock poisoned".to_string())
}

impl Synthesizer for LazyPiperSynthesizer {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        self.get()?.synthesize(text)
    }
}

impl Synthesizer for PiperSynthesizer {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let phonemes = phonemize(text, self.voice.espeak_voice())?;
        let ids = phonemes_to_ids(&phonemes, self.voice.phoneme_ids());
        let samples = self.engine.synthesize(&ids)?;
        samples_to_wav(&samples, self.voice.sample_rate())
    }
}

/// Convert text to IPA phonemes with espeak-ng. Text goes over stdin so it is never parsed as flags.
pub fn phonemize(text: &str, voice: &str) -> Result<String, SynthesisError> {
    if text.is_empty() {
        return Ok(String::new());
    }

    let mut command = Command::new("espeak-ng");
    command.args(["--ipa", "-q", "-v", voice, "--stdin"]);
    pipe_through(command, text)
}

/// Runs `command` with `text` on stdin and returns its trimmed stdout.
///
/// Stdin is fed from its own thread while `wait_with_output` drains stdout and
/// stderr, so a child that writes while it reads cannot fill a pipe and stall.
fn pipe_through(mut command: Command, text: &str) -> Result<String, SynthesisError> {
    let program = command.get_program().to_string_lossy().into_owned();

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            SynthesisError::Phonemizer(format!("Failed to run {} (is it installed?): {}", program, e))
        })?;

    let feeder = child.stdin.take().map(|mut stdin| {
        let text = text.to_owned();
        thread::spawn(move || stdin.write_all(text.as_bytes()))
    });

    let output = child
        .wait_with_output()
        .map_err(|e| SynthesisError::Phonemizer(format!("{} did not finish: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SynthesisError::Phonemizer(format!("{} failed: {}", program, stderr)));
    }

    if let Some(feeder) = feeder {
        match feeder.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(SynthesisError::Phonemizer(format!("Failed to feed {}: {}", program, e)))
            }
            Err(_) => {
                return Err(SynthesisError::Phonemizer(format!("{} stdin writer panicked", program)))
            }
        }
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Map phonemes to model ids: BOS, each phoneme followed by padding, EOS.
pub fn phonemes_to_ids(phonemes: &str, id_map: &HashMap<String, Vec<i64>>) -> Vec<i64> {
    let mut ids = Vec::new();
    let pad = id_map.get("_");

    match id_map.get("^") {
        Some(bos) => ids.extend(bos),
        None => ids.push(0),
    }

    let mut buf = [0u8; 4];
    for ch in phonemes.chars() {
        if let Some(mapped) = id_map.get(ch.encode_utf8(&mut buf) as &str) {
            ids.extend(mapped);
        }
        if let Some(pad) = pad {
            ids.extend(pad);
        }
    }

    match id_map.get("$") {
        Some(eos) => ids.extend(eos),
        None => ids.push(0),
    }

    ids
}

/// Encode f32 samples as 16-bit mono WAV.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, SynthesisError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let encoding = |e: hound::Error| SynthesisError::Encoding(e.to_string());

    let mut buffer = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec).map_err(encoding)?;

        for sample in samples {
            // 2x gain, clamped to the i16 range
            let scaled = (sample * 2.0 * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(scaled).map_err(encoding)?;
        }

        writer.finalize().map_err(encoding)?;
    }

    Ok(buffer)
}

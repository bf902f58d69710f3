//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::cache::{EngineHandle, EngineLoader};
use crate::config::ConfigId;
use crate::transcode::{Mp3Encoder, TranscodeError};
use crate::{Capability, EngineError, GenerationCall, GenerationResult, SpeechEngine};

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub capability: Capability,
    pub text: String,
    pub language: String,
    pub speed: f32,
    pub system_prompt: Option<String>,
    pub speaker: Option<String>,
    pub instruct: Option<String>,
    pub ref_audio: Option<PathBuf>,
    /// Contents of the reference file as seen during the call.
    pub ref_audio_bytes: Option<Vec<u8>>,
    pub ref_text: Option<String>,
}

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    Panic,
}

/// Engine with a configurable capability set that records every call.
pub(crate) struct FakeEngine {
    name: String,
    capabilities: Vec<Capability>,
    chunks: Vec<Vec<f32>>,
    sample_rate: u32,
    transcript: Option<String>,
    behavior: Behavior,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeEngine {
    pub fn new(capabilities: &[Capability]) -> Self {
        Self {
            name: "fake".to_string(),
            capabilities: capabilities.to_vec(),
            chunks: vec![vec![0.1; 240], vec![-0.1; 480]],
            sample_rate: 24000,
            transcript: None,
            behavior: Behavior::Succeed,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn custom_voice() -> Self {
        Self::new(&[Capability::CustomVoice])
    }

    pub fn cloning() -> Self {
        Self::new(&[Capability::VoiceClone])
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        self.chunks = chunks;
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_transcript(mut self, transcript: &str) -> Self {
        self.transcript = Some(transcript.to_string());
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.behavior = Behavior::Fail(message.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub fn into_handle(self) -> EngineHandle {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl SpeechEngine for FakeEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn generate(&self, call: &GenerationCall<'_>) -> Result<GenerationResult, EngineError> {
        assert!(
            self.supports(call.capability()),
            "{} called without support",
            call.capability()
        );

        let params = call.params();
        let mut recorded = RecordedCall {
            capability: call.capability(),
            text: params.text.to_string(),
            language: params.language.to_string(),
            speed: params.speed,
            system_prompt: params.system_prompt.map(str::to_string),
            speaker: None,
            instruct: None,
            ref_audio: None,
            ref_audio_bytes: None,
            ref_text: None,
        };
        match call {
            GenerationCall::CustomVoice { speaker, .. } => {
                recorded.speaker = Some(speaker.to_string());
            }
            GenerationCall::VoiceDesign { instruct, .. } => {
                recorded.instruct = Some(instruct.to_string());
            }
            GenerationCall::VoiceClone {
                ref_audio,
                ref_text,
                ..
            } => {
                recorded.ref_audio = ref_audio.map(|p| p.to_path_buf());
                recorded.ref_audio_bytes = ref_audio.and_then(|p| std::fs::read(p).ok());
                recorded.ref_text = Some(ref_text.to_string());
            }
        }
        self.calls.lock().unwrap().push(recorded);

        match &self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail(message) => return Err(message.clone().into()),
            Behavior::Panic => panic!("fake engine panicked"),
        }

        let mut result = GenerationResult::new(self.chunks.clone(), self.sample_rate);
        result.transcript = self.transcript.clone();
        Ok(result)
    }
}

type LoadFn = dyn Fn(&ConfigId) -> Result<EngineHandle, EngineError> + Send + Sync;

/// Loader that counts loads per configuration.
pub(crate) struct CountingLoader {
    load: Box<LoadFn>,
    loads: Mutex<HashMap<ConfigId, usize>>,
}

impl CountingLoader {
    pub fn new<F>(load: F) -> Self
    where
        F: Fn(&ConfigId) -> Result<EngineHandle, EngineError> + Send + Sync + 'static,
    {
        Self {
            load: Box::new(load),
            loads: Mutex::new(HashMap::new()),
        }
    }

    /// Serve a fixed engine per model id; unknown models fail to load.
    pub fn by_model(engines: Vec<(&str, Arc<FakeEngine>)>) -> Self {
        let engines: HashMap<String, Arc<FakeEngine>> = engines
            .into_iter()
            .map(|(model, engine)| (model.to_string(), engine))
            .collect();
        Self::new(move |config| match engines.get(&config.model) {
            Some(engine) => Ok(Arc::clone(engine) as EngineHandle),
            None => Err(format!("no weights for {}", config.model).into()),
        })
    }

    pub fn loads_of(&self, config: &ConfigId) -> usize {
        self.loads.lock().unwrap().get(config).copied().unwrap_or(0)
    }

    pub fn loads_of_model(&self, model: &str) -> usize {
        self.loads
            .lock()
            .unwrap()
            .iter()
            .filter(|(config, _)| config.model == model)
            .map(|(_, count)| count)
            .sum()
    }

    pub fn total_loads(&self) -> usize {
        self.loads.lock().unwrap().values().sum()
    }
}

impl EngineLoader for CountingLoader {
    fn load(&self, config: &ConfigId) -> Result<EngineHandle, EngineError> {
        *self.loads.lock().unwrap().entry(config.clone()).or_default() += 1;
        (self.load)(config)
    }
}

/// Encoder that wraps its input in an ID3-tagged blob instead of running ffmpeg.
#[derive(Default)]
pub(crate) struct FakeEncoder {
    inputs: Mutex<Vec<(Vec<u8>, u32)>>,
}

impl FakeEncoder {
    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn last_input(&self) -> Option<(Vec<u8>, u32)> {
        self.inputs.lock().unwrap().last().cloned()
    }
}

impl Mp3Encoder for FakeEncoder {
    fn encode(&self, wav: &[u8], bitrate_kbps: u32) -> Result<Vec<u8>, TranscodeError> {
        self.inputs
            .lock()
            .unwrap()
            .push((wav.to_vec(), bitrate_kbps));
        let mut out = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
        out.extend_from_slice(&(wav.len() as u32).to_le_bytes());
        Ok(out)
    }
}

//! # tts-handler
//!
//! A Rust library that serves text-to-speech requests from a warm process:
//! engines are loaded once and reused, generation falls back across the
//! capabilities an engine exposes, and the raw samples are delivered as a
//! base64 MP3 payload.
//!
//! ## Features
//!
//! - **Model cache**: one engine load per configuration, shared by every request
//! - **Capability fallback**: custom voice, voice design and voice clone probed in order
//! - **Voice cloning**: reference audio staged in a request-scoped temp file
//! - **MP3 delivery**: WAV intermediate re-encoded at 128 kb/s
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tts_handler::{engines::tone::ToneLoader, HandlerConfig, RequestHandler};
//!
//! let config = HandlerConfig::from_env()?;
//! let handler = RequestHandler::new(config, Arc::new(ToneLoader::default()));
//!
//! let response = handler.handle(serde_json::json!({"input": {"text": "Hello"}}));
//! println!("{}", response.to_json());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod config;
pub mod engines;
pub mod error;
pub mod handler;
pub mod request;
pub mod strategy;
pub mod temp;
pub mod transcode;
pub mod voices;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::path::Path;

pub use cache::{EngineHandle, EngineLoader, ModelCache};
pub use config::{ConfigId, EngineRole, HandlerConfig, HandlerConfigBuilder, Precision};
pub use error::{ConfigError, HandlerError};
pub use handler::RequestHandler;
pub use request::{AudioPayload, Request, Response};
pub use strategy::{GenerationMode, InferenceStrategySelector};
pub use transcode::{AudioTranscoder, FfmpegEncoder, Mp3Encoder, TranscodeError};

/// Error type returned by engine implementations.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

/// The output of a single generation call.
///
/// Holds the raw f32 chunks in the order the engine produced them. Every
/// chunk shares `sample_rate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResult {
    /// Raw audio chunks as f32 samples
    pub chunks: Vec<Vec<f32>>,
    /// Sample rate shared by every chunk
    pub sample_rate: u32,
    /// Text produced alongside the audio by conversational engines
    pub transcript: Option<String>,
}

impl GenerationResult {
    pub fn new(chunks: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            chunks,
            sample_rate,
            transcript: None,
        }
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    /// Total number of samples across all chunks.
    pub fn sample_count(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count() as f64 / self.sample_rate as f64
    }
}

/// A generation signature an engine may or may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Pre-trained speaker selected by name.
    CustomVoice,
    /// Voice described by a natural-language instruction.
    VoiceDesign,
    /// Voice imitated from reference audio.
    VoiceClone,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CustomVoice => "custom_voice",
            Capability::VoiceDesign => "voice_design",
            Capability::VoiceClone => "voice_clone",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slowest accepted speech speed multiplier.
pub const MIN_SPEED: f32 = 0.25;

/// Fastest accepted speech speed multiplier.
pub const MAX_SPEED: f32 = 4.0;

/// Parameters shared by every generation capability.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechParams<'a> {
    pub text: &'a str,
    pub language: &'a str,
    /// Speech speed multiplier in `MIN_SPEED..=MAX_SPEED`, 1.0 is natural pace.
    pub speed: f32,
    pub system_prompt: Option<&'a str>,
}

/// One concrete call into an engine, tagged by capability.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationCall<'a> {
    CustomVoice {
        params: SpeechParams<'a>,
        speaker: &'a str,
    },
    VoiceDesign {
        params: SpeechParams<'a>,
        instruct: &'a str,
    },
    VoiceClone {
        params: SpeechParams<'a>,
        /// `None` when the engine is asked to clone without a reference.
        ref_audio: Option<&'a Path>,
        ref_text: &'a str,
    },
}

impl GenerationCall<'_> {
    pub fn capability(&self) -> Capability {
        match self {
            GenerationCall::CustomVoice { .. } => Capability::CustomVoice,
            GenerationCall::VoiceDesign { .. } => Capability::VoiceDesign,
            GenerationCall::VoiceClone { .. } => Capability::VoiceClone,
        }
    }

    pub fn params(&self) -> &SpeechParams<'_> {
        match self {
            GenerationCall::CustomVoice { params, .. }
            | GenerationCall::VoiceDesign { params, .. }
            | GenerationCall::VoiceClone { params, .. } => params,
        }
    }
}

/// Common interface for loaded text-to-speech engines.
///
/// An engine advertises the generation signatures it implements through
/// [`SpeechEngine::supports`]; callers only invoke [`SpeechEngine::generate`]
/// with calls whose capability is supported. Engines are shared across
/// requests behind an `Arc`, so implementations keep any mutable inference
/// state behind their own synchronization.
pub trait SpeechEngine: Send + Sync {
    /// Human-readable engine name used in logs and error messages.
    fn name(&self) -> &str;

    /// Whether this engine implements the given generation signature.
    fn supports(&self, capability: Capability) -> bool;

    /// Run one generation call.
    fn generate(&self, call: &GenerationCall<'_>) -> Result<GenerationResult, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_sums_all_chunks() {
        let result = GenerationResult::new(vec![vec![0.0; 3], vec![0.0; 5], vec![]], 24000);
        assert_eq!(result.sample_count(), 8);
    }

    #[test]
    fn duration_uses_shared_sample_rate() {
        let result = GenerationResult::new(vec![vec![0.0; 12000], vec![0.0; 12000]], 24000);
        assert!((result.duration_secs() - 1.0).abs() < f64::EPSILON);
        assert_eq!(GenerationResult::new(vec![vec![0.0; 10]], 0).duration_secs(), 0.0);
    }

    #[test]
    fn call_reports_its_capability() {
        let params = SpeechParams {
            text: "hi",
            language: "English",
            speed: 1.0,
            system_prompt: None,
        };
        let call = GenerationCall::VoiceDesign {
            params: params.clone(),
            instruct: "calm",
        };
        assert_eq!(call.capability(), Capability::VoiceDesign);
        assert_eq!(call.params(), &params);
    }
}

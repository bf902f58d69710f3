//! Deterministic tone engine.
//!
//! Renders each sentence of the input as a short sine tone whose pitch is
//! derived from the voice (speaker, instruction or reference audio) and whose
//! length follows the sentence length and speed. It exercises the full
//! request path without model weights.
//!
//! # Capabilities by model id
//!
//! [`ToneLoader`] mirrors the common model family split:
//!
//! | Model id contains | Capability |
//! |---|---|
//! | `Base` | voice clone |
//! | `VoiceDesign` | voice design |
//! | anything else | custom voice |
//!
//! # Example
//!
//! ```rust
//! use tts_handler::engines::tone::ToneEngineBuilder;
//! use tts_handler::{GenerationCall, SpeechEngine, SpeechParams};
//!
//! let engine = ToneEngineBuilder::default().build().unwrap();
//! let params = SpeechParams { text: "Hello. World!", language: "English", speed: 1.0, system_prompt: None };
//! let result = engine.generate(&GenerationCall::CustomVoice { params, speaker: "Ryan" }).unwrap();
//! assert_eq!(result.chunks.len(), 2);
//! ```

use std::collections::HashSet;
use std::f32::consts::TAU;

use derive_builder::Builder;

use crate::cache::{EngineHandle, EngineLoader};
use crate::config::ConfigId;
use crate::{
    Capability, EngineError, GenerationCall, GenerationResult, SpeechEngine, MAX_SPEED, MIN_SPEED,
};

/// Output sample rate of the tone engine.
pub const SAMPLE_RATE: u32 = 24000;

/// Tone length per character at speed 1.0.
const SAMPLES_PER_CHAR: usize = 1200; // 50ms @ 24kHz

/// Fade applied to both ends of each chunk to avoid clicks.
const FADE_SAMPLES: usize = 240; // 10ms @ 24kHz

const AMPLITUDE: f32 = 0.3;

#[derive(Debug, Clone, Builder)]
#[builder(setter(into), default)]
pub struct ToneEngine {
    name: String,
    capabilities: HashSet<Capability>,
    sample_rate: u32,
    /// Lowest pitch in Hz; voices map into a one-octave band above it.
    base_pitch_hz: f32,
}

impl Default for ToneEngine {
    fn default() -> Self {
        Self {
            name: "tone".to_string(),
            capabilities: HashSet::from([Capability::CustomVoice, Capability::VoiceDesign]),
            sample_rate: SAMPLE_RATE,
            base_pitch_hz: 110.0,
        }
    }
}

impl ToneEngine {
    pub fn with_capabilities(name: impl Into<String>, capabilities: &[Capability]) -> Self {
        Self {
            name: name.into(),
            capabilities: capabilities.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn pitch_for(&self, seed: u64) -> f32 {
        // One octave band: seed picks a semitone.
        let semitone = (seed % 12) as f32;
        self.base_pitch_hz * 2f32.powf(semitone / 12.0)
    }

    fn render(&self, text: &str, speed: f32, pitch: f32) -> Vec<Vec<f32>> {
        split_sentences(text)
            .iter()
            .map(|sentence| {
                let chars = sentence.chars().filter(|c| !c.is_whitespace()).count().max(1);
                let len = ((chars * SAMPLES_PER_CHAR) as f32 / speed).round() as usize;
                tone(len.max(1), pitch, self.sample_rate)
            })
            .collect()
    }
}

impl SpeechEngine for ToneEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn generate(&self, call: &GenerationCall<'_>) -> Result<GenerationResult, EngineError> {
        if !self.supports(call.capability()) {
            return Err(format!("{} does not implement {}", self.name, call.capability()).into());
        }

        let seed = match call {
            GenerationCall::CustomVoice { speaker, .. } => fnv1a(speaker.as_bytes()),
            GenerationCall::VoiceDesign { instruct, .. } => fnv1a(instruct.as_bytes()),
            GenerationCall::VoiceClone {
                ref_audio: Some(path),
                ..
            } => fnv1a(&std::fs::read(path)?),
            GenerationCall::VoiceClone { ref_audio: None, .. } => 0,
        };

        let params = call.params();
        let speed = if params.speed.is_finite() {
            params.speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
        let chunks = self.render(params.text, speed, self.pitch_for(seed));
        log::debug!(
            "Tone engine rendered {} chunk(s) for {}",
            chunks.len(),
            call.capability()
        );

        Ok(GenerationResult::new(chunks, self.sample_rate))
    }
}

/// Builds tone engines, choosing capabilities from the model id.
#[derive(Debug, Clone, Default)]
pub struct ToneLoader;

impl EngineLoader for ToneLoader {
    fn load(&self, config: &ConfigId) -> Result<EngineHandle, EngineError> {
        let capability = if config.model.contains("Base") {
            Capability::VoiceClone
        } else if config.model.contains("VoiceDesign") {
            Capability::VoiceDesign
        } else {
            Capability::CustomVoice
        };
        log::info!("Tone engine for {config} serves {capability}");
        Ok(std::sync::Arc::new(ToneEngine::with_capabilities(
            format!("tone:{}", config.model),
            &[capability],
        )))
    }
}

/// Split text into sentences at terminal punctuation and line breaks.
///
/// A period between two digits stays inside the sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        if is_sentence_end(ch) && !is_decimal_point(text, idx, ch) {
            if !matches!(ch, '\n' | '\r') {
                current.push(ch);
            }
            flush_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(ch);
    }

    flush_sentence(&mut sentences, &mut current);
    sentences
}

fn flush_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

fn is_sentence_end(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '。' | '！' | '？' | '\n' | '\r')
}

fn is_decimal_point(text: &str, idx: usize, ch: char) -> bool {
    if ch != '.' {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch.len_utf8()..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

fn tone(len: usize, pitch: f32, sample_rate: u32) -> Vec<f32> {
    let fade = FADE_SAMPLES.min(len / 2);
    (0..len)
        .map(|i| {
            let envelope = if i < fade {
                i as f32 / fade as f32
            } else if i >= len - fade {
                (len - i) as f32 / fade as f32
            } else {
                1.0
            };
            (i as f32 * pitch * TAU / sample_rate as f32).sin() * AMPLITUDE * envelope
        })
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

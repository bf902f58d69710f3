//! Generation pathway selection.
//!
//! Engines across model releases expose different generation signatures.
//! Each [`GenerationMode`] owns an ordered dispatch table of
//! [`Capability`] descriptors; the selector walks the table, skips every
//! capability the engine does not advertise, and executes the first one it
//! does. Errors from that call are final and never trigger a later entry.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::EngineRole;
use crate::error::HandlerError;
use crate::temp::with_temp_resource;
use crate::{Capability, GenerationCall, GenerationResult, SpeechEngine, SpeechParams};

const STANDARD_CHAIN: &[Capability] = &[
    Capability::CustomVoice,
    Capability::VoiceDesign,
    Capability::VoiceClone,
];

const DESIGNED_CHAIN: &[Capability] = &[
    Capability::VoiceDesign,
    Capability::CustomVoice,
    Capability::VoiceClone,
];

const CLONE_CHAIN: &[Capability] = &[Capability::VoiceClone];

/// How a request is voiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Pre-trained speaker.
    Standard,
    /// Voice described by the request's instruction.
    Designed,
    /// Voice imitated from the request's reference audio.
    Clone,
}

impl GenerationMode {
    /// Reference audio wins over an instruction; neither means standard.
    pub fn resolve(has_ref_audio: bool, has_instruct: bool) -> Self {
        if has_ref_audio {
            GenerationMode::Clone
        } else if has_instruct {
            GenerationMode::Designed
        } else {
            GenerationMode::Standard
        }
    }

    pub fn role(&self) -> EngineRole {
        match self {
            GenerationMode::Standard => EngineRole::Standard,
            GenerationMode::Designed => EngineRole::Design,
            GenerationMode::Clone => EngineRole::Clone,
        }
    }

    /// Capabilities to try, in order.
    pub fn chain(&self) -> &'static [Capability] {
        match self {
            GenerationMode::Standard => STANDARD_CHAIN,
            GenerationMode::Designed => DESIGNED_CHAIN,
            GenerationMode::Clone => CLONE_CHAIN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Standard => "standard",
            GenerationMode::Designed => "designed",
            GenerationMode::Clone => "clone",
        }
    }
}

/// Normalized request parameters handed to the selector.
#[derive(Debug, Clone)]
pub struct StrategyInput<'a> {
    pub text: &'a str,
    pub language: &'a str,
    /// Native speaker id, already resolved through the voice table.
    pub speaker: &'a str,
    pub speed: f32,
    pub system_prompt: Option<&'a str>,
    pub instruct: Option<&'a str>,
    /// Decoded reference audio, present only in clone mode.
    pub ref_audio: Option<&'a [u8]>,
    pub ref_text: &'a str,
}

/// Instruction used when voice design stands in for a missing speaker.
pub fn default_instruction(language: &str) -> String {
    format!("A natural {language} speaking voice, clear and pleasant.")
}

/// Chooses and runs the generation capability for a mode.
#[derive(Debug, Clone, Default)]
pub struct InferenceStrategySelector {
    temp_dir: Option<PathBuf>,
}

impl InferenceStrategySelector {
    pub fn new(temp_dir: Option<PathBuf>) -> Self {
        Self { temp_dir }
    }

    /// Run generation for `mode` on `engine`.
    ///
    /// In clone mode the reference audio is staged in a temp file that
    /// exists only for the duration of the engine call, and only once the
    /// engine is known to support cloning.
    pub fn run(
        &self,
        engine: &dyn SpeechEngine,
        mode: GenerationMode,
        input: &StrategyInput<'_>,
    ) -> Result<GenerationResult, HandlerError> {
        if mode == GenerationMode::Clone && input.ref_audio.is_none() {
            return Err(HandlerError::validation(
                "ref_audio is required for voice cloning",
            ));
        }

        let capability = self.select(engine, mode)?;
        match (mode, input.ref_audio) {
            (GenerationMode::Clone, Some(bytes)) => {
                with_temp_resource(bytes, self.temp_dir.as_deref(), |path| {
                    self.execute(engine, mode, capability, input, Some(path))
                })
            }
            _ => self.execute(engine, mode, capability, input, None),
        }
    }

    /// First capability of the mode's chain that `engine` advertises.
    fn select(
        &self,
        engine: &dyn SpeechEngine,
        mode: GenerationMode,
    ) -> Result<Capability, HandlerError> {
        let chain = mode.chain();
        let Some(capability) = chain.iter().copied().find(|c| engine.supports(*c)) else {
            let tried: Vec<&str> = chain.iter().map(Capability::as_str).collect();
            return Err(HandlerError::CapabilityMismatch {
                engine: engine.name().to_string(),
                tried: tried.join(", "),
            });
        };

        for skipped in chain.iter().take_while(|c| **c != capability) {
            log::debug!("Engine '{}' lacks {skipped}, falling back", engine.name());
        }
        Ok(capability)
    }

    fn execute(
        &self,
        engine: &dyn SpeechEngine,
        mode: GenerationMode,
        capability: Capability,
        input: &StrategyInput<'_>,
        ref_audio: Option<&Path>,
    ) -> Result<GenerationResult, HandlerError> {
        let instruction = match input.instruct {
            Some(instruct) => Cow::Borrowed(instruct),
            None => Cow::Owned(default_instruction(input.language)),
        };
        let params = SpeechParams {
            text: input.text,
            language: input.language,
            speed: input.speed,
            system_prompt: input.system_prompt,
        };
        let call = match capability {
            Capability::CustomVoice => GenerationCall::CustomVoice {
                params,
                speaker: input.speaker,
            },
            Capability::VoiceDesign => GenerationCall::VoiceDesign {
                params,
                instruct: &instruction,
            },
            Capability::VoiceClone => GenerationCall::VoiceClone {
                params,
                ref_audio,
                ref_text: if ref_audio.is_some() { input.ref_text } else { "" },
            },
        };

        log::info!(
            "Generating {} chars with '{}' via {capability} ({} mode)",
            input.text.chars().count(),
            engine.name(),
            mode.as_str()
        );
        let start = Instant::now();
        let result = engine.generate(&call).map_err(HandlerError::Inference)?;

        if result.chunks.is_empty() {
            return Err(HandlerError::EmptyGeneration);
        }
        if result.sample_rate == 0 {
            return Err(HandlerError::Inference(
                format!("engine '{}' reported a zero sample rate", engine.name()).into(),
            ));
        }

        log::info!(
            "Generated {:.2}s of audio in {} chunk(s) in {:.2?}",
            result.duration_secs(),
            result.chunks.len(),
            start.elapsed()
        );
        Ok(result)
    }
}

//! Request orchestration.
//!
//! A request moves through `Validating → Resolving → Generating → Encoding →
//! Responding`; any failure lands in `Failed`. Whatever happens inside, the
//! handler returns a structured [`Response`]: errors and engine panics are
//! converted at this boundary and never escape it.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{EngineLoader, ModelCache};
use crate::config::{EngineRole, HandlerConfig};
use crate::error::HandlerError;
use crate::request::{AudioPayload, Request, Response};
use crate::strategy::{GenerationMode, InferenceStrategySelector, StrategyInput};
use crate::transcode::AudioTranscoder;
use crate::{MAX_SPEED, MIN_SPEED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Validating,
    Resolving,
    Generating,
    Encoding,
    Responding,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Resolving => "resolving",
            Stage::Generating => "generating",
            Stage::Encoding => "encoding",
            Stage::Responding => "responding",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    log::debug!("Request {stage} -> {next}");
    *stage = next;
}

/// Serves synthesis requests against a process-lifetime engine cache.
pub struct RequestHandler {
    config: HandlerConfig,
    cache: ModelCache,
    selector: InferenceStrategySelector,
    transcoder: AudioTranscoder,
}

impl RequestHandler {
    /// Create a handler that encodes MP3 with the configured `ffmpeg`.
    pub fn new(config: HandlerConfig, loader: Arc<dyn EngineLoader>) -> Self {
        let transcoder = AudioTranscoder::ffmpeg(config.ffmpeg_path.clone());
        Self::with_transcoder(config, loader, transcoder)
    }

    pub fn with_transcoder(
        config: HandlerConfig,
        loader: Arc<dyn EngineLoader>,
        transcoder: AudioTranscoder,
    ) -> Self {
        let selector = InferenceStrategySelector::new(config.temp_dir.clone());
        Self {
            config,
            cache: ModelCache::new(loader),
            selector,
            transcoder,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Load the engines for `roles` before the first request arrives.
    pub fn preload(&self, roles: &[EngineRole]) -> Result<(), HandlerError> {
        for role in roles {
            self.cache.preload(&self.config.config_id(*role))?;
        }
        Ok(())
    }

    /// Handle a job envelope (`{"input": {...}}`) or a bare request object.
    pub fn handle(&self, input: serde_json::Value) -> Response {
        match Request::from_value(input) {
            Ok(request) => self.handle_request(&request),
            Err(err) => {
                log::warn!("Rejected request: {err}");
                Response::from_error(&err)
            }
        }
    }

    pub fn handle_request(&self, request: &Request) -> Response {
        let start = Instant::now();
        let mut stage = Stage::Validating;

        let outcome = catch_unwind(AssertUnwindSafe(|| self.process(request, &mut stage)));

        match outcome {
            Ok(Ok(payload)) => {
                advance(&mut stage, Stage::Responding);
                log::info!(
                    "Request completed in {:.2?} ({:.2}s of audio)",
                    start.elapsed(),
                    payload.duration_secs
                );
                Response::Audio(payload)
            }
            Ok(Err(err)) => {
                let failed_at = stage;
                advance(&mut stage, Stage::Failed);
                match &err {
                    HandlerError::Validation(_) => log::warn!("Rejected request: {err}"),
                    _ => log::error!(
                        "Request failed while {failed_at} ({}): {err:?}",
                        err.kind()
                    ),
                }
                Response::from_error(&err)
            }
            Err(panic) => {
                let failed_at = stage;
                advance(&mut stage, Stage::Failed);
                let message = panic_message(panic.as_ref());
                log::error!("Engine panicked while {failed_at}: {message}");
                Response::error(format!("Internal error: {message}"))
            }
        }
    }

    fn process(&self, request: &Request, stage: &mut Stage) -> Result<AudioPayload, HandlerError> {
        let text = request
            .trimmed_text()
            .ok_or_else(|| HandlerError::validation("text is required"))?;
        let speed = match request.speed {
            None => 1.0,
            Some(speed) if (MIN_SPEED..=MAX_SPEED).contains(&speed) => speed,
            Some(speed) => {
                return Err(HandlerError::validation(format!(
                    "speed must be between {MIN_SPEED} and {MAX_SPEED}, got {speed}"
                )))
            }
        };
        let ref_audio = request.decode_ref_audio()?;

        advance(stage, Stage::Resolving);
        let instruct = request.trimmed_instruct();
        let mode = GenerationMode::resolve(ref_audio.is_some(), instruct.is_some());
        let speaker = self
            .config
            .voices
            .resolve(request.voice_label(), &self.config.default_speaker);
        let language = request
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.config.default_language.as_str());
        let config_id = self.config.config_id(mode.role());
        log::debug!(
            "Resolved {} mode, speaker '{speaker}', language '{language}', engine {config_id}",
            mode.as_str()
        );

        advance(stage, Stage::Generating);
        let engine = self.cache.get(&config_id)?;
        let input = StrategyInput {
            text,
            language,
            speaker,
            speed,
            system_prompt: request.system_prompt.as_deref(),
            instruct,
            ref_audio: ref_audio.as_deref(),
            ref_text: request.ref_text.as_deref().map(str::trim).unwrap_or(""),
        };
        let result = self.selector.run(engine.as_ref(), mode, &input)?;

        advance(stage, Stage::Encoding);
        let mp3 = self.transcoder.encode(&result.chunks, result.sample_rate)?;
        let duration_secs = result.duration_secs();

        Ok(AudioPayload::from_mp3(&mp3, duration_secs, result.transcript))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

use crate::config::ConfigId;
use crate::transcode::TranscodeError;
use crate::EngineError;

/// Everything that can go wrong while serving one request.
///
/// Each variant ends up as the `{"error": ...}` response shape; the
/// [`Display`](std::fmt::Display) text is the message clients see.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("{0}")]
    Validation(String),
    #[error("engine '{engine}' supports none of the attempted capabilities: {tried}")]
    CapabilityMismatch { engine: String, tried: String },
    #[error("No audio generated")]
    EmptyGeneration,
    #[error("Failed to load engine {config}: {source}")]
    EngineLoad {
        config: ConfigId,
        #[source]
        source: EngineError,
    },
    #[error("{0}")]
    Inference(#[source] EngineError),
    #[error("Audio encoding failed: {0}")]
    Transcode(TranscodeError),
    #[error("Failed to stage reference audio: {0}")]
    TempResource(#[source] std::io::Error),
}

impl HandlerError {
    pub fn validation(message: impl Into<String>) -> Self {
        HandlerError::Validation(message.into())
    }

    /// Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Validation(_) => "validation",
            HandlerError::CapabilityMismatch { .. } => "capability_mismatch",
            HandlerError::EmptyGeneration => "empty_generation",
            HandlerError::EngineLoad { .. } => "engine_load",
            HandlerError::Inference(_) => "inference",
            HandlerError::Transcode(_) => "transcode",
            HandlerError::TempResource(_) => "temp_resource",
        }
    }
}

impl From<TranscodeError> for HandlerError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::EmptyInput => HandlerError::EmptyGeneration,
            other => HandlerError::Transcode(other),
        }
    }
}

/// Invalid process configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Unknown precision '{0}'. Expected one of: bfloat16, float16, float32")]
    UnknownPrecision(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transcode_input_maps_to_empty_generation() {
        let err: HandlerError = TranscodeError::EmptyInput.into();
        assert!(matches!(err, HandlerError::EmptyGeneration));
        assert_eq!(err.to_string(), "No audio generated");
    }

    #[test]
    fn other_transcode_errors_stay_transcode() {
        let err: HandlerError = TranscodeError::EncoderNotFound("ffmpeg".into()).into();
        assert_eq!(err.kind(), "transcode");
    }

    #[test]
    fn inference_message_is_passed_through() {
        let err = HandlerError::Inference("CUDA out of memory".into());
        assert_eq!(err.to_string(), "CUDA out of memory");
    }
}

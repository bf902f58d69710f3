//! Process configuration.
//!
//! Configuration is read once at process start, usually from the
//! environment, and stays immutable for the lifetime of the warm process.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `MODEL_ID` | standard engine model | `Qwen/Qwen3-TTS-12Hz-0.6B-CustomVoice` |
//! | `CLONE_MODEL_ID` | clone engine model | `Qwen/Qwen3-TTS-12Hz-0.6B-Base` |
//! | `DESIGN_MODEL_ID` | designed-voice engine model | `Qwen/Qwen3-TTS-12Hz-1.7B-VoiceDesign` |
//! | `DEVICE` | device label | `cuda:0` |
//! | `DTYPE` | `bfloat16`, `float16` or `float32` | `bfloat16` |
//! | `DEFAULT_SPEAKER` | fallback speaker | `Vivian` |
//! | `DEFAULT_LANGUAGE` | fallback language | `Japanese` |
//! | `FFMPEG_PATH` | MP3 encoder binary | `ffmpeg` |
//! | `TTS_TEMP_DIR` | reference audio directory | system temp dir |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use derive_builder::Builder;

use crate::error::ConfigError;
use crate::voices::VoiceTable;

pub const DEFAULT_STANDARD_MODEL: &str = "Qwen/Qwen3-TTS-12Hz-0.6B-CustomVoice";
pub const DEFAULT_CLONE_MODEL: &str = "Qwen/Qwen3-TTS-12Hz-0.6B-Base";
pub const DEFAULT_DESIGN_MODEL: &str = "Qwen/Qwen3-TTS-12Hz-1.7B-VoiceDesign";
pub const DEFAULT_DEVICE: &str = "cuda:0";
pub const DEFAULT_SPEAKER: &str = "Vivian";
pub const DEFAULT_LANGUAGE: &str = "Japanese";

/// Numeric precision an engine is loaded with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Precision {
    #[default]
    BFloat16,
    Float16,
    Float32,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::BFloat16 => "bfloat16",
            Precision::Float16 => "float16",
            Precision::Float32 => "float32",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bfloat16" | "bf16" => Ok(Precision::BFloat16),
            "float16" | "fp16" | "half" => Ok(Precision::Float16),
            "float32" | "fp32" | "float" => Ok(Precision::Float32),
            _ => Err(ConfigError::UnknownPrecision(s.to_string())),
        }
    }
}

/// Identifies one engine load: model, device and precision.
///
/// Two requests that resolve to equal ids share the same loaded engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigId {
    pub model: String,
    pub device: String,
    pub precision: Precision,
}

impl ConfigId {
    pub fn new(model: impl Into<String>, device: impl Into<String>, precision: Precision) -> Self {
        Self {
            model: model.into(),
            device: device.into(),
            precision,
        }
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.model, self.device, self.precision)
    }
}

/// Which engine configuration a request is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineRole {
    Standard,
    Clone,
    Design,
}

/// Configuration for a [`RequestHandler`](crate::RequestHandler).
///
/// ```
/// use tts_handler::HandlerConfigBuilder;
///
/// let config = HandlerConfigBuilder::default()
///     .standard_model("models/custom-voice")
///     .device("cpu")
///     .build()
///     .unwrap();
/// assert_eq!(config.default_language, "Japanese");
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), default)]
pub struct HandlerConfig {
    /// Model id or path for the standard (pre-trained speaker) engine.
    pub standard_model: String,
    /// Model id or path for the voice-cloning engine.
    pub clone_model: String,
    /// Model id or path for the designed-voice engine.
    pub design_model: String,
    pub device: String,
    pub precision: Precision,
    /// Native speaker used when the requested label is unknown or absent.
    pub default_speaker: String,
    pub default_language: String,
    /// Binary used to encode MP3.
    pub ffmpeg_path: PathBuf,
    /// Directory for staged reference audio. `None` uses the system default.
    #[builder(setter(into, strip_option))]
    pub temp_dir: Option<PathBuf>,
    pub voices: VoiceTable,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            standard_model: DEFAULT_STANDARD_MODEL.to_string(),
            clone_model: DEFAULT_CLONE_MODEL.to_string(),
            design_model: DEFAULT_DESIGN_MODEL.to_string(),
            device: DEFAULT_DEVICE.to_string(),
            precision: Precision::default(),
            default_speaker: DEFAULT_SPEAKER.to_string(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            temp_dir: None,
            voices: VoiceTable::default(),
        }
    }
}

impl HandlerConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(v) = var("MODEL_ID") {
            config.standard_model = v;
        }
        if let Some(v) = var("CLONE_MODEL_ID") {
            config.clone_model = v;
        }
        if let Some(v) = var("DESIGN_MODEL_ID") {
            config.design_model = v;
        }
        if let Some(v) = var("DEVICE") {
            config.device = v;
        }
        if let Some(v) = var("DTYPE") {
            config.precision = v.parse()?;
        }
        if let Some(v) = var("DEFAULT_SPEAKER") {
            config.default_speaker = v;
        }
        if let Some(v) = var("DEFAULT_LANGUAGE") {
            config.default_language = v;
        }
        if let Some(v) = var("FFMPEG_PATH") {
            config.ffmpeg_path = PathBuf::from(v);
        }
        if let Some(v) = var("TTS_TEMP_DIR") {
            config.temp_dir = Some(PathBuf::from(v));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no request could be served with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("standard model", &self.standard_model),
            ("clone model", &self.clone_model),
            ("design model", &self.design_model),
            ("device", &self.device),
            ("default speaker", &self.default_speaker),
            ("default language", &self.default_language),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// The engine configuration that serves the given role.
    pub fn config_id(&self, role: EngineRole) -> ConfigId {
        let model = match role {
            EngineRole::Standard => &self.standard_model,
            EngineRole::Clone => &self.clone_model,
            EngineRole::Design => &self.design_model,
        };
        ConfigId::new(model.as_str(), self.device.as_str(), self.precision)
    }
}

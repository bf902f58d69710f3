//! Wire types for the request/response boundary.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

/// Format tag of every successful payload.
pub const AUDIO_FORMAT: &str = "mp3";

/// A synthesis request as delivered by the hosting runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    pub text: Option<String>,
    pub voice: Option<String>,
    /// Same as `voice`; `voice` wins when both are given.
    pub speaker: Option<String>,
    pub language: Option<String>,
    pub speed: Option<f32>,
    pub system_prompt: Option<String>,
    /// Natural-language voice description for designed voices.
    pub instruct: Option<String>,
    /// Base64-encoded reference audio; presence selects voice cloning.
    pub ref_audio: Option<String>,
    pub ref_text: Option<String>,
}

impl Request {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Parse either a job envelope (`{"input": {...}}`) or a bare request.
    pub fn from_value(value: serde_json::Value) -> Result<Self, HandlerError> {
        let inner = match value {
            serde_json::Value::Object(mut map) if map.contains_key("input") => map
                .remove("input")
                .unwrap_or(serde_json::Value::Null),
            other => other,
        };
        if !inner.is_object() {
            return Err(HandlerError::validation("input must be a JSON object"));
        }
        serde_json::from_value(inner)
            .map_err(|e| HandlerError::validation(format!("invalid request: {e}")))
    }

    /// The trimmed text, or `None` when it is absent or blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
    }

    /// The requested voice label from `voice` or `speaker`.
    pub fn voice_label(&self) -> Option<&str> {
        non_blank(self.voice.as_deref()).or_else(|| non_blank(self.speaker.as_deref()))
    }

    pub fn trimmed_instruct(&self) -> Option<&str> {
        non_blank(self.instruct.as_deref())
    }

    /// Decode the reference audio. Blank input counts as absent.
    pub fn decode_ref_audio(&self) -> Result<Option<Vec<u8>>, HandlerError> {
        let Some(encoded) = non_blank(self.ref_audio.as_deref()) else {
            return Ok(None);
        };
        let encoded = strip_data_url(encoded);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| HandlerError::validation(format!("ref_audio is not valid base64: {e}")))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(bytes))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accept `data:audio/wav;base64,...` as well as raw base64.
fn strip_data_url(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        if let Some((_, payload)) = encoded.split_once(',') {
            return payload;
        }
    }
    encoded
}

/// A successful synthesis payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPayload {
    pub audio_base64: String,
    pub format: String,
    pub duration_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,
}

impl AudioPayload {
    pub fn from_mp3(mp3: &[u8], duration_secs: f64, text_response: Option<String>) -> Self {
        Self {
            audio_base64: base64::engine::general_purpose::STANDARD.encode(mp3),
            format: AUDIO_FORMAT.to_string(),
            duration_secs,
            text_response,
        }
    }

    pub fn decode_audio(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.audio_base64)
    }
}

/// Either an audio payload or an error message, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Audio(AudioPayload),
    Error { error: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    /// Convert any handler failure into the public error shape.
    pub fn from_error(err: &HandlerError) -> Self {
        Response::error(err.to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    pub fn audio(&self) -> Option<&AudioPayload> {
        match self {
            Response::Audio(payload) => Some(payload),
            Response::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Response::Error { error } => Some(error.as_str()),
            Response::Audio(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("failed to serialize response: {e}") })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_job_envelope_and_bare_request() {
        let wrapped = Request::from_value(json!({"id": "job-1", "input": {"text": "Hi"}})).unwrap();
        let bare = Request::from_value(json!({"text": "Hi"})).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(bare.trimmed_text(), Some("Hi"));
    }

    #[test]
    fn speaker_stands_in_for_voice() {
        let request = Request::from_value(json!({"text": "Hi", "speaker": "Ryan"})).unwrap();
        assert_eq!(request.voice_label(), Some("Ryan"));

        let both =
            Request::from_value(json!({"text": "Hi", "voice": "Aiden", "speaker": "Ryan"})).unwrap();
        assert_eq!(both.voice_label(), Some("Aiden"));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let request = Request::from_value(json!({"text": "Hi", "stream": true})).unwrap();
        assert_eq!(request, Request::new("Hi"));
    }

    #[test]
    fn wrong_field_types_are_validation_errors() {
        let err = Request::from_value(json!({"text": 42})).unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
        let err = Request::from_value(json!({"input": "Hello"})).unwrap_err();
        assert_eq!(err.to_string(), "input must be a JSON object");
    }

    #[test]
    fn blank_text_is_absent() {
        let request = Request::new(" \n\t ");
        assert_eq!(request.trimmed_text(), None);
    }

    #[test]
    fn ref_audio_decodes_raw_and_data_url() {
        let mut request = Request::new("Hi");
        request.ref_audio = Some("UklGRg==".to_string());
        assert_eq!(request.decode_ref_audio().unwrap(), Some(b"RIFF".to_vec()));

        request.ref_audio = Some("data:audio/wav;base64,UklGRg==".to_string());
        assert_eq!(request.decode_ref_audio().unwrap(), Some(b"RIFF".to_vec()));

        request.ref_audio = Some("   ".to_string());
        assert_eq!(request.decode_ref_audio().unwrap(), None);

        request.ref_audio = Some("not base64!".to_string());
        assert!(matches!(
            request.decode_ref_audio(),
            Err(HandlerError::Validation(_))
        ));
    }

    #[test]
    fn responses_serialize_to_flat_shapes() {
        let ok = Response::Audio(AudioPayload::from_mp3(b"ID3", 1.5, None));
        assert_eq!(
            ok.to_json(),
            json!({"audio_base64": "SUQz", "format": "mp3", "duration_secs": 1.5})
        );

        let err = Response::from_error(&HandlerError::EmptyGeneration);
        assert_eq!(err.to_json(), json!({"error": "No audio generated"}));
        assert!(err.audio().is_none());
    }

    #[test]
    fn text_response_is_included_when_present() {
        let ok = Response::Audio(AudioPayload::from_mp3(b"ID3", 0.5, Some("Sure!".into())));
        assert_eq!(ok.to_json()["text_response"], json!("Sure!"));
    }
}

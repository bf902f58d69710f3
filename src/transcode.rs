//! Conversion of raw engine output into an MP3 payload.
//!
//! Chunks are concatenated in production order, written to an in-memory
//! 32-bit float WAV, and re-encoded to MP3 at a fixed bitrate. The WAV step
//! is deterministic; the MP3 bytes depend on the encoder build.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// MP3 bitrate in kb/s.
pub const MP3_BITRATE_KBPS: u32 = 128;

#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    #[error("No audio samples to encode")]
    EmptyInput,
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    #[error("WAV serialization failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MP3 encoder '{0}' not found. Install ffmpeg or set FFMPEG_PATH")]
    EncoderNotFound(String),
    #[error("MP3 encoder failed: {0}")]
    EncoderFailed(String),
}

/// Container formats recognised by [`detect_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Wav,
    Mp3,
}

impl ContainerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerFormat::Wav => "wav",
            ContainerFormat::Mp3 => "mp3",
        }
    }
}

/// Detect the container format from the leading bytes of a payload.
pub fn detect_format(data: &[u8]) -> Option<ContainerFormat> {
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
        return Some(ContainerFormat::Wav);
    }
    if data.len() >= 3 && &data[0..3] == b"ID3" {
        return Some(ContainerFormat::Mp3);
    }
    // MPEG audio frame sync: 11 set bits, layer bits not reserved.
    if data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0 && data[1] & 0x06 != 0 {
        return Some(ContainerFormat::Mp3);
    }
    None
}

/// Re-encodes a WAV byte stream to MP3.
pub trait Mp3Encoder: Send + Sync {
    fn encode(&self, wav: &[u8], bitrate_kbps: u32) -> Result<Vec<u8>, TranscodeError>;
}

impl<T: Mp3Encoder + ?Sized> Mp3Encoder for std::sync::Arc<T> {
    fn encode(&self, wav: &[u8], bitrate_kbps: u32) -> Result<Vec<u8>, TranscodeError> {
        (**self).encode(wav, bitrate_kbps)
    }
}

/// Encodes through an `ffmpeg` subprocess, piping WAV in and MP3 out.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    bin_path: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegEncoder {
    pub fn new(bin_path: impl Into<PathBuf>) -> Self {
        Self {
            bin_path: bin_path.into(),
        }
    }

    /// Whether the configured binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.bin_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Mp3Encoder for FfmpegEncoder {
    fn encode(&self, wav: &[u8], bitrate_kbps: u32) -> Result<Vec<u8>, TranscodeError> {
        let bitrate = format!("{bitrate_kbps}k");
        let mut child = Command::new(&self.bin_path)
            .args(["-hide_banner", "-loglevel", "error", "-f", "wav", "-i", "pipe:0"])
            .args(["-vn", "-codec:a", "libmp3lame", "-b:a", bitrate.as_str()])
            .args(["-f", "mp3", "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::EncoderNotFound(self.bin_path.display().to_string())
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        // ffmpeg streams output while reading input, so stdin is fed from a
        // separate thread to keep both pipes draining.
        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || -> std::io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(wav)?;
                }
                Ok(())
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (output, written)
        });
        let (output, written) = output;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::EncoderFailed(format!(
                "{} exited with code {:?}: {}",
                self.bin_path.display(),
                output.status.code(),
                stderr.trim()
            )));
        }
        // A broken pipe only matters if ffmpeg did not succeed.
        if let Err(e) = written {
            log::debug!("ffmpeg closed stdin early: {e}");
        }
        if output.stdout.is_empty() {
            return Err(TranscodeError::EncoderFailed(
                "encoder produced no output".to_string(),
            ));
        }

        Ok(output.stdout)
    }
}

/// Turns engine chunks into a compressed delivery payload.
pub struct AudioTranscoder {
    encoder: Box<dyn Mp3Encoder>,
    bitrate_kbps: u32,
}

impl AudioTranscoder {
    pub fn new(encoder: Box<dyn Mp3Encoder>) -> Self {
        Self {
            encoder,
            bitrate_kbps: MP3_BITRATE_KBPS,
        }
    }

    pub fn ffmpeg(bin_path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FfmpegEncoder::new(bin_path)))
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    /// Concatenate `chunks` and encode them as MP3.
    pub fn encode(&self, chunks: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>, TranscodeError> {
        let wav = encode_wav(chunks, sample_rate)?;
        let mp3 = self.encoder.encode(&wav, self.bitrate_kbps)?;
        log::debug!(
            "Encoded {} bytes of WAV into {} bytes of MP3 at {} kb/s",
            wav.len(),
            mp3.len(),
            self.bitrate_kbps
        );
        Ok(mp3)
    }
}

/// Serialize concatenated chunks to a mono 32-bit float WAV.
pub fn encode_wav(chunks: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>, TranscodeError> {
    let total: usize = chunks.iter().map(Vec::len).sum();
    if total == 0 {
        return Err(TranscodeError::EmptyInput);
    }
    if sample_rate == 0 {
        return Err(TranscodeError::InvalidSampleRate(sample_rate));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut buf = Cursor::new(Vec::with_capacity(44 + total * 4));
    {
        let mut writer = hound::WavWriter::new(&mut buf, spec)?;
        for &sample in chunks.iter().flatten() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(buf.into_inner())
}

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::HandlerError;

const PREFIX: &str = "ref-audio-";
const SUFFIX: &str = ".wav";

/// A transient file holding reference audio for a single request.
///
/// The file is removed by [`TempResource::release`] or, on any other exit
/// path including unwinding, when the value is dropped.
#[derive(Debug)]
pub struct TempResource {
    file: NamedTempFile,
}

impl TempResource {
    /// Create a new temp file pre-populated with `bytes`.
    ///
    /// `dir` selects the parent directory; `None` uses the system default.
    pub fn acquire(bytes: &[u8], dir: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX).suffix(SUFFIX);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;
        log::debug!(
            "Staged {} bytes of reference audio at {}",
            bytes.len(),
            file.path().display()
        );
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the file, reporting removal failures.
    pub fn release(self) -> std::io::Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        log::debug!("Removed reference audio {}", path.display());
        Ok(())
    }
}

/// Run `f` with `bytes` staged in a temp file, removing the file afterwards.
///
/// Removal happens whether `f` succeeds, fails, or panics. A failed removal
/// after `f` returns is logged and does not change the result.
pub fn with_temp_resource<T, F>(bytes: &[u8], dir: Option<&Path>, f: F) -> Result<T, HandlerError>
where
    F: FnOnce(&Path) -> Result<T, HandlerError>,
{
    let resource = TempResource::acquire(bytes, dir).map_err(HandlerError::TempResource)?;
    let result = f(resource.path());
    let path: PathBuf = resource.path().to_path_buf();
    if let Err(e) = resource.release() {
        log::warn!("Failed to remove reference audio {}: {e}", path.display());
    }
    result
}

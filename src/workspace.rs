//! Per-request scratch storage
//!
//! A [`RequestWorkspace`] owns a private temporary directory for one request's
//! upload and intermediate MIDI files. The directory is removed when the workspace
//! is dropped, on success and error paths alike, so concurrent requests never
//! share or wipe each other's files.

use crate::error::{HumError, Result as HumErrorResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug)]
pub struct RequestWorkspace {
    dir: TempDir,
}

impl RequestWorkspace {
    /// Create a workspace under the system temp directory
    pub fn new() -> HumErrorResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("hum2midi-")
            .tempdir()
            .map_err(|e| HumError::ProcessingPipelineError(format!("Cannot create workspace: {}", e)))?;
        log::debug!("Created request workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Create a workspace under `base`
    pub fn new_in<P: AsRef<Path>>(base: P) -> HumErrorResult<Self> {
        std::fs::create_dir_all(base.as_ref())?;
        let dir = tempfile::Builder::new()
            .prefix("hum2midi-")
            .tempdir_in(base)
            .map_err(|e| HumError::ProcessingPipelineError(format!("Cannot create workspace: {}", e)))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copy an uploaded file into the workspace, keeping its file name
    pub fn stage_upload(&self, source: &Path) -> HumErrorResult<PathBuf> {
        let name = source.file_name().ok_or_else(|| {
            HumError::InputValidationError(format!("Upload has no file name: {}", source.display()))
        })?;
        let staged = self.dir.path().join(name);
        std::fs::copy(source, &staged)?;
        Ok(staged)
    }

    /// Remove the workspace now, reporting any failure
    pub fn close(self) -> HumErrorResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        log::debug!("Removed request workspace {}", path.display());
        Ok(())
    }
}

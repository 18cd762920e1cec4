use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;
use walkdir::WalkDir;

use super::job::JobId;
use crate::error::StorageError;
use crate::processor::DocumentFormat;
use crate::sanitize::redact_path;

/// Files owned by the job lifecycle: staged uploads under the data
/// directory and result artifacts under the outputs directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    data_dir: PathBuf,
    outputs_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<D: AsRef<Path>, O: AsRef<Path>>(data_dir: D, outputs_dir: O) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            outputs_dir: outputs_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    /// Writes an upload to `<data>/<job_id>.pdf`.
    pub fn stage_upload(&self, job_id: JobId, content: &[u8]) -> Result<StagedFile, StorageError> {
        self.stage(&format!("{}.pdf", job_id), content)
    }

    /// Writes a synchronous upload to `<data>/sync_<uuid>.pdf`.
    pub fn stage_sync_upload(&self, content: &[u8]) -> Result<StagedFile, StorageError> {
        self.stage(&format!("sync_{}.pdf", Uuid::new_v4()), content)
    }

    fn stage(&self, filename: &str, content: &[u8]) -> Result<StagedFile, StorageError> {
        ensure_directory(&self.data_dir)?;
        // Armed before the write so a partial file is cleaned up too.
        let mut staged = StagedFile::new(self.data_dir.join(filename));
        write_file(&staged.path, content)?;
        staged.path = std::fs::canonicalize(&staged.path).map_err(|e| {
            StorageError::Canonicalize {
                path: staged.path.clone(),
                source: e,
            }
        })?;
        Ok(staged)
    }

    /// Persists the analysis text as `<outputs>/<job_id>.txt`, byte for byte.
    pub fn write_result(&self, job_id: JobId, text: &str) -> Result<PathBuf, StorageError> {
        ensure_directory(&self.outputs_dir)?;
        let path = self.result_path(job_id);
        write_file(&path, text.as_bytes())?;
        Ok(path)
    }

    pub fn result_path(&self, job_id: JobId) -> PathBuf {
        self.outputs_dir.join(format!("{}.txt", job_id))
    }

    /// Best-effort removal of a staged upload.
    pub fn remove_staged(&self, path: &Path) {
        remove_best_effort(path, "staged upload");
    }

    /// Best-effort removal of a result artifact whose job did not end `done`.
    pub fn remove_result(&self, job_id: JobId) {
        remove_best_effort(&self.result_path(job_id), "result artifact");
    }

    /// First PDF directly inside the data directory, by file name.
    ///
    /// A missing data directory simply has no documents.
    pub fn first_document(&self) -> Result<Option<PathBuf>, StorageError> {
        if !self.data_dir.is_dir() {
            return Ok(None);
        }

        let walker = WalkDir::new(&self.data_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| StorageError::ReadDirectory {
                path: self.data_dir.clone(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_pdf = entry
                .file_name()
                .to_str()
                .and_then(DocumentFormat::from_filename)
                .is_some();
            if is_pdf {
                return Ok(Some(entry.into_path()));
            }
        }
        Ok(None)
    }
}

/// A staged upload that is deleted when dropped, unless [`StagedFile::keep`]
/// hands ownership of the file to someone else (a queued task).
#[derive(Debug)]
#[must_use]
pub struct StagedFile {
    path: PathBuf,
    armed: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarms the guard and returns the path.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.armed {
            remove_best_effort(&self.path, "staged upload");
        }
    }
}

fn remove_best_effort(path: &Path, what: &str) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {} {}", what, redact_path(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {} {}: {}", what, redact_path(path), e),
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(content)?;
        file.sync_all()
    };
    write().map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("data directory missing or not writable: {0}")]
    DataDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the directory exists and is a directory; create it if missing.
pub fn ensure_data_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::DataDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::DataDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::DataDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes whole files under one directory: temp file, fsync, rename. Readers
/// see either the previous content or the new one, never a torn record.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_data_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// Removes `filename`; a file that is already gone is not an error.
    pub fn remove(&self, filename: &str) -> Result<(), PersistError> {
        match fs::remove_file(self.dir.join(filename)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

use crate::db::StorageError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File storage for uploaded templates and generated letters.
///
/// Paths handed around the application are relative to `root` and use `/`
/// separators, so they can be stored in the database and turned into URLs
/// under `base_url` without knowing where the media directory lives.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub relative_path: String,
    pub url: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    pub fn url_for(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }

    /// Writes `bytes` to `relative`, replacing any previous file.
    ///
    /// The data goes to a temporary file in the destination directory first
    /// and is renamed into place, so readers never observe a partial file.
    pub fn save(&self, relative: &str, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let target = self.absolute(relative);
        let parent = target.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|err| err.error)?;

        Ok(StoredFile {
            relative_path: relative.to_string(),
            url: self.url_for(relative),
        })
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        Ok(fs::read(self.absolute(relative))?)
    }

    /// Deletes a stored file. A file that is already gone is not an error.
    pub fn remove(&self, relative: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.absolute(relative)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

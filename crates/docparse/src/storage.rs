//! Upload storage: original file bytes kept on disk under the configured
//! storage directory, keyed by file id.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

pub struct UploadStorage {
    directory: PathBuf,
}

impl UploadStorage {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes uploaded bytes to `<directory>/<file_id>`. Creation uses
    /// O_CREAT | O_EXCL so two ingests can never silently share a path.
    pub fn store(&self, file_id: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        self.ensure_directory()?;

        let path = self.directory.join(file_id);
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::FileExists(path.clone())
                } else {
                    StorageError::WriteFile {
                        path: path.clone(),
                        source: e,
                    }
                }
            })?;

        file.write_all(content).map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }

    /// Reads stored bytes back for processing.
    pub fn read(&self, file_id: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.directory.join(file_id);
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }

    /// Removes the stored bytes for a file. Missing files are fine, the
    /// record may already have been cleaned up.
    pub fn remove(&self, file_id: &str) -> Result<(), StorageError> {
        let path = self.directory.join(file_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::RemoveFile { path, source: e }),
        }
    }

    fn ensure_directory(&self) -> Result<(), StorageError> {
        if !self.directory.exists() {
            std::fs::create_dir_all(&self.directory).map_err(|e| {
                StorageError::CreateDirectory {
                    path: self.directory.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let storage = UploadStorage::new(temp_dir.path());

        let path = storage.store("file-1", b"Hello, World!").unwrap();
        assert!(path.exists());
        assert_eq!(storage.read("file-1").unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_store_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage = UploadStorage::new(temp_dir.path().join("nested/uploads"));

        let path = storage.store("file-2", b"content").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_store_duplicate_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = UploadStorage::new(temp_dir.path());

        storage.store("file-3", b"first").unwrap();
        let result = storage.store("file-3", b"second");
        assert!(matches!(result, Err(StorageError::FileExists(_))));
        // Original bytes untouched.
        assert_eq!(storage.read("file-3").unwrap(), b"first");
    }

    #[test]
    fn test_read_missing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = UploadStorage::new(temp_dir.path());

        assert!(matches!(
            storage.read("missing"),
            Err(StorageError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let storage = UploadStorage::new(temp_dir.path());

        storage.store("file-4", b"bytes").unwrap();
        storage.remove("file-4").unwrap();
        storage.remove("file-4").unwrap();
        assert!(storage.read("file-4").is_err());
    }

    #[test]
    fn test_store_empty_content() {
        let temp_dir = TempDir::new().unwrap();
        let storage = UploadStorage::new(temp_dir.path());

        let path = storage.store("file-5", &[]).unwrap();
        assert!(path.exists());
        assert!(storage.read("file-5").unwrap().is_empty());
    }
}

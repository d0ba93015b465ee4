//! Firmware blob storage.
//!
//! The platform only needs a read-only, name-keyed byte provider. Whatever
//! installed the files (package scripts, DKMS, a test) is not our concern.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact not found: {0}")]
    NotFound(String),
    #[error("IO error reading {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read-only provider of firmware blobs keyed by artifact name.
pub trait FirmwareStore {
    fn contains(&self, name: &str) -> bool;

    fn load(&self, name: &str) -> Result<Vec<u8>, StoreError>;
}

/// Firmware files in a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl FirmwareStore for DirectoryStore {
    fn contains(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    fn load(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_of(name);
        debug!(path = %path.display(), "Reading firmware file");
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(name.to_string())
            } else {
                StoreError::Io {
                    name: name.to_string(),
                    source: e,
                }
            }
        })
    }
}

/// In-memory store, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, data: Vec<u8>) {
        self.files.insert(name.to_string(), data);
    }

    pub fn with(mut self, name: &str, data: &[u8]) -> Self {
        self.insert(name, data.to_vec());
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.files.remove(name)
    }
}

impl FirmwareStore for MemoryStore {
    fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn load(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

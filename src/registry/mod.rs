//! Persistent, URL-keyed registry of synchronized artifacts.
//!
//! The registry is a single JSON object mapping each URL to its
//! [`ArtifactRecord`]. It is read once at the start of a cycle and rewritten
//! atomically (sibling temp file + rename) after every completed transfer and
//! at the end of the cycle. Entries are always written in the order defined
//! by [`ordering::compare`].
//!
//! A missing registry is an empty one. An unreadable or corrupt registry is
//! also treated as empty, with a warning, so a damaged file never blocks a
//! cycle.

mod change;
mod lock;
pub mod ordering;
mod seed;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::artifact::ArtifactRecord;

pub use change::{
    ChangeAssessment, ChangeKind, assess, expected_path, file_sha256, header_changes,
    safe_component, storage_path,
};
pub use lock::RunLock;
pub use seed::{SeedSummary, seed_from_history};

/// Errors raised while persisting or locking the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize registry: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("registry {path} is locked by another run")]
    Locked { path: PathBuf },
}

impl RegistryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// In-memory view of the registry file.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    entries: HashMap<String, ArtifactRecord>,
}

impl Registry {
    /// Creates an empty registry bound to `path` without touching the disk.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
        }
    }

    /// Loads the registry at `path`.
    ///
    /// Categories are re-derived on load so entries written by older
    /// detection rules pick up the current ones.
    #[must_use]
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut registry = Self::empty(path);

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                info!("no registry found - starting fresh");
                return registry;
            }
            Err(error) => {
                warn!(error = %error, "registry unreadable - starting from an empty registry");
                return registry;
            }
        };
        if raw.trim().is_empty() {
            info!("registry file is empty - starting fresh");
            return registry;
        }

        let parsed: HashMap<String, ArtifactRecord> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(error = %error, "registry corrupt - starting from an empty registry");
                return registry;
            }
        };

        for (url, mut record) in parsed {
            if record.url != url {
                debug!(key = %url, url = %record.url, "registry key and record URL differ; using key");
                record.url.clone_from(&url);
            }
            record.refresh_category();
            registry.entries.insert(url, record);
        }

        info!(
            files = registry.len(),
            downloaded = registry.downloaded_count(),
            "registry loaded"
        );
        registry
    }

    /// Writes the registry atomically, entries in deterministic order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when serialization or any file operation
    /// fails; the previous file is left untouched in that case.
    pub fn save(&self) -> Result<(), RegistryError> {
        let ordered = self.sorted();
        let json = serde_json::to_string_pretty(&OrderedEntries(&ordered))
            .map_err(|source| RegistryError::Serialize { source })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
        }

        let temp = self.temp_path();
        std::fs::write(&temp, json.as_bytes()).map_err(|e| RegistryError::io(&temp, e))?;
        if let Err(error) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(RegistryError::io(&self.path, error));
        }

        debug!(path = %self.path.display(), files = ordered.len(), "registry saved");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<&ArtifactRecord> {
        self.entries.get(url)
    }

    /// Inserts or replaces the entry for the record's URL.
    pub fn register(&mut self, record: ArtifactRecord) {
        self.entries.insert(record.url.clone(), record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn downloaded_count(&self) -> usize {
        self.entries.values().filter(|r| r.downloaded).count()
    }

    /// All entries in deterministic order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&ArtifactRecord> {
        let mut records: Vec<&ArtifactRecord> = self.entries.values().collect();
        records.sort_by(|a, b| ordering::compare(a, b));
        records
    }
}

/// Serializes records as a URL-keyed object in slice order.
struct OrderedEntries<'a>(&'a [&'a ArtifactRecord]);

impl Serialize for OrderedEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for record in self.0 {
            map.serialize_entry(&record.url, record)?;
        }
        map.end()
    }
}

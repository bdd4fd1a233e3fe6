//! Resolved settings for one synchronizer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::PairingRule;
use crate::download::{CONNECT_TIMEOUT, DOWNLOAD_DELAY, READ_TIMEOUT};

/// Catalog page mirrored when no other URL is configured.
pub const DEFAULT_CATALOG_URL: &str = "https://ec.europa.eu/digital-building-blocks/sites/spaces/DIGITAL/pages/467108974/Registry+of+supporting+artefacts+to+implement+EN16931";

/// Storage root used when no other path is configured.
pub const DEFAULT_BASE_PATH: &str = "downloaded-files";

/// Export root used when no other path is configured.
pub const DEFAULT_REPORTS_PATH: &str = "reports";

const REGISTRY_FILE_NAME: &str = "downloaded-files.json";
const HISTORY_FILE_NAME: &str = "downloaded-files.csv";

/// Everything a [`Synchronizer`](super::Synchronizer) needs to run a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub catalog_url: String,
    /// Root of the mirrored files (`<base>/<category>/<filename>`).
    pub base_path: PathBuf,
    pub registry_path: PathBuf,
    /// Root of the per-cycle CSV exports.
    pub reports_path: PathBuf,
    /// Cumulative download history, kept beside the registry.
    pub history_path: PathBuf,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Pause between consecutive full fetches.
    pub download_delay: Duration,
    pub write_latest: bool,
    pub verify_hash: bool,
    pub pairing_rule: PairingRule,
}

impl SyncSettings {
    /// Settings with every default, storing under `base_path`.
    ///
    /// The registry and history land next to the storage root.
    #[must_use]
    pub fn new(catalog_url: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        let registry_path = default_registry_path(&base_path);
        Self {
            catalog_url: catalog_url.into(),
            history_path: history_path_for(&registry_path),
            registry_path,
            base_path,
            reports_path: PathBuf::from(DEFAULT_REPORTS_PATH),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            download_delay: DOWNLOAD_DELAY,
            write_latest: true,
            verify_hash: false,
            pairing_rule: PairingRule::default(),
        }
    }

    /// Moves the registry, and the history beside it, to `registry_path`.
    #[must_use]
    pub fn with_registry_path(mut self, registry_path: impl Into<PathBuf>) -> Self {
        self.registry_path = registry_path.into();
        self.history_path = history_path_for(&self.registry_path);
        self
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_URL, DEFAULT_BASE_PATH)
    }
}

/// `<parent of base>/downloaded-files.json`.
#[must_use]
pub fn default_registry_path(base_path: &Path) -> PathBuf {
    base_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(REGISTRY_FILE_NAME)
}

/// `downloaded-files.csv` in the registry's directory.
#[must_use]
pub fn history_path_for(registry_path: &Path) -> PathBuf {
    registry_path.with_file_name(HISTORY_FILE_NAME)
}

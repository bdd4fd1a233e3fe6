//! JSON file configuration merged over defaults and CLI overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use codelist_sync_core::PairingRule;
use codelist_sync_core::sync::{
    DEFAULT_BASE_PATH, DEFAULT_CATALOG_URL, DEFAULT_REPORTS_PATH, SyncSettings,
    default_registry_path,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::cli::Args;

/// Seconds between scheduled cycles when the file does not say otherwise.
pub(crate) const DEFAULT_CHECK_INTERVAL_SECS: u64 = 86_400;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_READ_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_DOWNLOAD_DELAY_SECS: u64 = 1;

/// On-disk configuration; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) registry_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) download_base_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) check_interval_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) connect_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) read_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) download_delay_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) registry_file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) csv_output_base_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) write_latest_copy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) auto_confirm_downloads: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) verify_hash_on_unchanged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) strict_propagation: Option<bool>,
}

impl FileConfig {
    /// The file written when none exists yet.
    pub(crate) fn with_defaults() -> Self {
        Self {
            registry_url: Some(DEFAULT_CATALOG_URL.to_string()),
            download_base_path: Some(PathBuf::from(DEFAULT_BASE_PATH)),
            check_interval_seconds: Some(DEFAULT_CHECK_INTERVAL_SECS),
            connect_timeout_ms: Some(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout_ms: Some(DEFAULT_READ_TIMEOUT_MS),
            download_delay_seconds: Some(DEFAULT_DOWNLOAD_DELAY_SECS),
            registry_file_path: None,
            csv_output_base_path: Some(PathBuf::from(DEFAULT_REPORTS_PATH)),
            write_latest_copy: Some(true),
            auto_confirm_downloads: Some(false),
            verify_hash_on_unchanged: Some(false),
            strict_propagation: Some(false),
        }
    }

    /// Rejects values no cycle could run with.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(url) = self.registry_url.as_deref() {
            if url.trim().is_empty() {
                bail!("Invalid config value for `registryUrl`: must not be empty");
            }
            Url::parse(url)
                .with_context(|| format!("Invalid config value for `registryUrl`: '{url}'"))?;
        }
        validate_positive("checkIntervalSeconds", self.check_interval_seconds)?;
        validate_positive("connectTimeoutMs", self.connect_timeout_ms)?;
        validate_positive("readTimeoutMs", self.read_timeout_ms)?;
        if let Some(path) = &self.download_base_path
            && path.as_os_str().is_empty()
        {
            bail!("Invalid config value for `downloadBasePath`: must not be empty");
        }
        Ok(())
    }
}

fn validate_positive(field: &str, value: Option<u64>) -> Result<()> {
    if value == Some(0) {
        bail!("Invalid config value for `{field}`: 0. Expected a value greater than 0");
    }
    Ok(())
}

/// Fully resolved configuration for the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppConfig {
    pub(crate) settings: SyncSettings,
    pub(crate) check_interval: Duration,
    pub(crate) auto_confirm: bool,
}

impl AppConfig {
    /// Merges `file` over the defaults, then applies CLI overrides.
    pub(crate) fn resolve(file: &FileConfig, args: &Args) -> Self {
        let base_path = args
            .download_dir
            .clone()
            .or_else(|| file.download_base_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_PATH));
        let registry_path = args
            .registry
            .clone()
            .or_else(|| file.registry_file_path.clone())
            .unwrap_or_else(|| default_registry_path(&base_path));

        let mut settings = SyncSettings::new(
            file.registry_url
                .clone()
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            base_path,
        )
        .with_registry_path(registry_path);
        settings.reports_path = file
            .csv_output_base_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_PATH));
        settings.connect_timeout =
            Duration::from_millis(file.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS));
        settings.read_timeout =
            Duration::from_millis(file.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS));
        settings.download_delay =
            Duration::from_secs(file.download_delay_seconds.unwrap_or(DEFAULT_DOWNLOAD_DELAY_SECS));
        settings.write_latest = file.write_latest_copy.unwrap_or(true);
        settings.verify_hash = file.verify_hash_on_unchanged.unwrap_or(false);
        settings.pairing_rule = if file.strict_propagation.unwrap_or(false) {
            PairingRule::Strict
        } else {
            PairingRule::Tolerant
        };

        Self {
            settings,
            check_interval: Duration::from_secs(
                file.check_interval_seconds
                    .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS),
            ),
            auto_confirm: args.yes || file.auto_confirm_downloads.unwrap_or(false),
        }
    }
}

/// Loads `path`, falling back to defaults when it is missing or unreadable.
///
/// A missing file is created with the defaults (best effort).
///
/// # Errors
///
/// Returns an error when the file parses but holds invalid values.
pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            let defaults = FileConfig::with_defaults();
            match write_file_config(path, &defaults) {
                Ok(()) => info!(path = %path.display(), "no configuration found - wrote defaults"),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "could not write default configuration");
                }
            }
            return Ok(defaults);
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "configuration unreadable - using defaults");
            return Ok(FileConfig::default());
        }
    };

    let config: FileConfig = match serde_json::from_str(&raw) {
        Ok(config) => config,
        Err(error) => {
            warn!(path = %path.display(), error = %error, "configuration malformed - using defaults");
            return Ok(FileConfig::default());
        }
    };
    config
        .validate()
        .with_context(|| format!("Invalid configuration file '{}'", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn write_file_config(path: &Path, config: &FileConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    fs::write(path, json).with_context(|| format!("Failed to write '{}'", path.display()))
}

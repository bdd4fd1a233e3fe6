//! Codelist Sync Core Library
//!
//! This library incrementally mirrors the EN 16931 code list catalog into
//! local storage, attaching release metadata (effective date, publishing
//! date, version, latest-release flag) that the catalog only states in prose.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`artifact`] - The URL-keyed artifact record, categories and date formats
//! - [`catalog`] - Link classification and release metadata resolution
//! - [`registry`] - Persistent registry, change detection and run lock
//! - [`export`] - CSV inventory, change, download and history tables
//! - [`download`] - HTTP transport with streaming, hashing and pacing
//! - [`sync`] - The synchronizer driving one complete cycle

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod artifact;
pub mod catalog;
pub mod download;
pub mod export;
pub mod registry;
pub mod sync;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use artifact::{ArtifactRecord, Category};
pub use catalog::{CatalogScan, EnrichmentSummary, PairingRule, enrich_records, scan_catalog};
pub use download::{DownloadError, HttpClient, ProbeResult, RateLimiter};
pub use export::{DownloadOutcome, DownloadStatus, ExportError, ReportWriter};
pub use registry::{ChangeAssessment, ChangeKind, Registry, RegistryError, RunLock, assess};
pub use sync::{
    AutoApprove, DeclineAll, PlannedTransfer, SyncError, SyncReport, SyncSettings, Synchronizer,
    TransferApproval,
};

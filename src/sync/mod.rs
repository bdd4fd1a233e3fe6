//! One synchronization cycle, end to end.
//!
//! # Overview
//!
//! [`Synchronizer::run_cycle`] runs the stages in a fixed order:
//!
//! 1. take the run lock and load (or seed) the registry
//! 2. fetch and scan the catalog document
//! 3. probe every downloadable link with HEAD; failures skip the link
//! 4. resolve release metadata ([`enrich_records`])
//! 5. classify each artifact against the registry and export the inventory
//!    and change tables
//! 6. ask the [`TransferApproval`] seam, then fetch the planned artifacts
//!    one after another with a pause in between
//! 7. export the outcomes, append them to the cumulative history and
//!    persist the registry
//!
//! A cycle with nothing to transfer is a successful no-op. Only a catalog
//! fetch failure or a registry persistence failure ends a cycle with an
//! error; everything else is logged and reported per artifact.
//!
//! [`enrich_records`]: crate::catalog::enrich_records

mod approval;
mod settings;

use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::artifact::ArtifactRecord;
use crate::catalog::{enrich_records, scan_catalog};
use crate::download::{DownloadError, HttpClient, ProbeResult, RateLimiter};
use crate::export::{DownloadOutcome, DownloadStatus, ReportWriter, append_history};
use crate::registry::{ChangeKind, Registry, RegistryError, RunLock, assess, seed_from_history};

pub use approval::{AutoApprove, DeclineAll, PlannedTransfer, TransferApproval};
pub use settings::{
    DEFAULT_BASE_PATH, DEFAULT_CATALOG_URL, DEFAULT_REPORTS_PATH, SyncSettings,
    default_registry_path, history_path_for,
};

/// Conditions that end a cycle early.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] DownloadError),

    #[error("invalid catalog URL: {url}")]
    InvalidCatalogUrl { url: String },

    #[error("failed to fetch catalog {url}: {source}")]
    Catalog {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Downloadable links found in the catalog.
    pub discovered: usize,
    /// Links skipped because their HEAD probe failed.
    pub probe_failures: usize,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    /// Registry entries rebuilt from the download history.
    pub seeded: usize,
    /// Whether the transfer plan was approved. `false` when nothing was planned.
    pub approved: bool,
    pub transferred: usize,
    pub failed: usize,
}

impl SyncReport {
    /// Artifacts classified NEW or CHANGED.
    #[must_use]
    pub fn planned(&self) -> usize {
        self.new + self.changed
    }
}

/// Runs synchronization cycles with fixed settings.
pub struct Synchronizer {
    settings: SyncSettings,
    client: HttpClient,
    approval: Arc<dyn TransferApproval>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Synchronizer {
    /// Builds a synchronizer and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Client`] if the HTTP client cannot be built.
    pub fn new(
        settings: SyncSettings,
        approval: Arc<dyn TransferApproval>,
    ) -> Result<Self, SyncError> {
        let client = HttpClient::with_timeouts(settings.connect_timeout, settings.read_timeout)
            .map_err(SyncError::Client)?;
        Ok(Self {
            settings,
            client,
            approval,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Runs one complete cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the registry is locked by another run, the
    /// catalog cannot be fetched, or the registry cannot be written. Probe
    /// and transfer failures are reported per artifact instead.
    #[instrument(skip(self), fields(catalog = %self.settings.catalog_url))]
    pub async fn run_cycle(&self) -> Result<SyncReport, SyncError> {
        let settings = &self.settings;
        let started = Local::now();
        let mut report = SyncReport::default();

        let _lock = RunLock::acquire(&settings.registry_path)?;
        let mut registry = Registry::load(&settings.registry_path);
        let seeded = seed_from_history(&mut registry, &settings.history_path, &settings.base_path);
        if seeded.seeded > 0 {
            registry.save()?;
            report.seeded = seeded.seeded;
        }

        let base_url = Url::parse(&settings.catalog_url).map_err(|_| SyncError::InvalidCatalogUrl {
            url: settings.catalog_url.clone(),
        })?;
        let html = self
            .client
            .fetch_document(&settings.catalog_url)
            .await
            .map_err(|source| SyncError::Catalog {
                url: settings.catalog_url.clone(),
                source,
            })?;
        let scan = scan_catalog(&html, &base_url);
        report.discovered = scan.links.len();

        let mut records = Vec::with_capacity(scan.links.len());
        for link in &scan.links {
            match self.client.probe(link).await {
                Ok(probe) => records.push(probed_record(link, probe)),
                Err(error) => {
                    warn!(url = %link, reason = %error.short_reason(), "probe failed - skipping artifact");
                    report.probe_failures += 1;
                }
            }
        }

        let enrichment = enrich_records(&mut records, &scan, settings.pairing_rule);
        debug!(?enrichment, "metadata enrichment complete");

        let reports = ReportWriter::new(&settings.reports_path, settings.write_latest, started);
        if let Err(error) = reports.write_inventory(&records) {
            error!(error = %error, "failed to write inventory export");
        }

        let mut plan: Vec<PlannedTransfer> = Vec::new();
        for record in records {
            let assessment = assess(
                &record,
                registry.get(&record.url),
                &settings.base_path,
                settings.verify_hash,
            );
            match assessment.kind {
                ChangeKind::New => report.new += 1,
                ChangeKind::Changed => report.changed += 1,
                ChangeKind::Unchanged => {
                    report.unchanged += 1;
                    if let Some(stored) = registry.get(&record.url) {
                        let refreshed = retain_transfer_state(record, stored);
                        registry.register(refreshed);
                    }
                    continue;
                }
            }
            plan.push((record, assessment));
        }

        if let Err(error) = reports.write_changes(&plan) {
            error!(error = %error, "failed to write change export");
        }

        info!(
            discovered = report.discovered,
            new = report.new,
            changed = report.changed,
            unchanged = report.unchanged,
            probe_failures = report.probe_failures,
            "classification complete"
        );

        if plan.is_empty() {
            info!("everything is up to date - nothing to transfer");
            registry.save()?;
            return Ok(report);
        }

        for (record, assessment) in &plan {
            info!(
                filename = %record.decoded_filename(),
                category = %record.category.as_str(),
                change = %assessment.kind,
                reasons = %assessment.reason_text(),
                "planned transfer"
            );
        }
        report.approved = self.approval.approve(&plan).await;
        if !report.approved {
            info!(planned = plan.len(), "transfers declined - registry left as is");
            registry.save()?;
            return Ok(report);
        }

        let outcomes = self.transfer(plan, &mut registry, &mut report).await?;

        match reports.write_downloads(&outcomes) {
            Ok(rows) => {
                if let Err(error) = append_history(&settings.history_path, &rows) {
                    error!(error = %error, path = %settings.history_path.display(), "failed to update download history");
                }
            }
            Err(error) => error!(error = %error, "failed to write download export"),
        }

        registry.save()?;
        info!(
            transferred = report.transferred,
            failed = report.failed,
            files = registry.len(),
            "cycle complete"
        );
        Ok(report)
    }

    /// Fetches every planned artifact in order, saving the registry after
    /// each success.
    async fn transfer(
        &self,
        plan: Vec<PlannedTransfer>,
        registry: &mut Registry,
        report: &mut SyncReport,
    ) -> Result<Vec<DownloadOutcome>, SyncError> {
        let limiter = RateLimiter::new(self.settings.download_delay);
        let mut outcomes = Vec::with_capacity(plan.len());

        for (mut record, assessment) in plan {
            limiter.acquire(&record.url).await;
            let result = self
                .client
                .fetch_to_path(&record.url, &assessment.local_path)
                .await;
            limiter.record_completion(&record.url);

            match result {
                Ok(fetched) => {
                    record.downloaded = true;
                    record.download_time = Some(Local::now().naive_local());
                    record.content_hash = Some(fetched.sha256);
                    record.actual_size = fetched.size;
                    record.local_path = Some(fetched.path);
                    registry.register(record.clone());
                    registry.save()?;
                    report.transferred += 1;
                    outcomes.push(DownloadOutcome {
                        record,
                        status: DownloadStatus::Succeeded,
                    });
                }
                Err(error) => {
                    warn!(
                        url = %record.url,
                        change = %assessment.kind,
                        error = %error,
                        "transfer failed - will retry next cycle"
                    );
                    report.failed += 1;
                    outcomes.push(DownloadOutcome {
                        record,
                        status: DownloadStatus::Failed(error.short_reason()),
                    });
                }
            }
        }

        Ok(outcomes)
    }
}

fn probed_record(url: &str, probe: ProbeResult) -> ArtifactRecord {
    let mut record = ArtifactRecord::new(url);
    record.content_length = probe.content_length;
    record.content_type = probe.content_type;
    record.last_modified = probe.last_modified;
    record.etag = probe.etag;
    record
}

/// Fresh catalog view of an unchanged artifact, keeping the stored transfer
/// state and any release metadata the fresh scan no longer resolves.
///
/// Transport headers the fresh probe did not report keep their stored value,
/// so a later real change to them is still detected.
fn retain_transfer_state(mut fresh: ArtifactRecord, stored: &ArtifactRecord) -> ArtifactRecord {
    if fresh.content_length == 0 {
        fresh.content_length = stored.content_length;
    }
    if fresh.etag.is_none() {
        fresh.etag.clone_from(&stored.etag);
    }
    if fresh.last_modified.is_none() {
        fresh.last_modified = stored.last_modified;
    }
    if fresh.content_type.is_none() {
        fresh.content_type.clone_from(&stored.content_type);
    }

    fresh.downloaded = stored.downloaded;
    fresh.download_time = stored.download_time;
    fresh.content_hash.clone_from(&stored.content_hash);
    fresh.actual_size = stored.actual_size;
    fresh.local_path.clone_from(&stored.local_path);

    if fresh.effective_date.is_none() {
        fresh.effective_date = stored.effective_date;
    }
    if fresh.publishing_date.is_none() {
        fresh.publishing_date = stored.publishing_date;
    }
    if !fresh.has_version() {
        fresh.version.clone_from(&stored.version);
    }
    fresh
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::header_changes;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    const URL: &str = "https://ec.europa.eu/download/attachments/1/eas-codes.xlsx";

    #[test]
    fn test_retain_transfer_state_keeps_download_fields() {
        let mut stored = ArtifactRecord::new(URL);
        stored.downloaded = true;
        stored.content_hash = Some("abc".to_string());
        stored.actual_size = 100;
        stored.local_path = Some(PathBuf::from("/data/EAS code list/eas-codes.xlsx"));
        stored.version = Some("14".to_string());
        stored.effective_date = NaiveDate::from_ymd_opt(2025, 5, 1);

        let mut fresh = ArtifactRecord::new(URL);
        fresh.version = Some("15".to_string());
        fresh.content_length = 100;

        let merged = retain_transfer_state(fresh, &stored);
        assert!(merged.downloaded);
        assert_eq!(merged.content_hash.as_deref(), Some("abc"));
        assert_eq!(merged.actual_size, 100);
        assert_eq!(merged.version.as_deref(), Some("15"));
        assert_eq!(merged.effective_date, NaiveDate::from_ymd_opt(2025, 5, 1));
    }

    #[test]
    fn test_retain_transfer_state_keeps_headers_missing_from_probe() {
        let mut stored = ArtifactRecord::new(URL);
        stored.downloaded = true;
        stored.content_length = 100;
        stored.etag = Some("\"a\"".to_string());
        stored.last_modified = NaiveDate::from_ymd_opt(2025, 10, 23)
            .and_then(|d| d.and_hms_opt(13, 29, 29));

        let headerless = probed_record(URL, ProbeResult::default());
        let merged = retain_transfer_state(headerless, &stored);
        assert_eq!(merged.content_length, 100);
        assert_eq!(merged.etag.as_deref(), Some("\"a\""));
        assert_eq!(merged.last_modified, stored.last_modified);

        let mut next = ArtifactRecord::new(URL);
        next.content_length = 100;
        next.etag = Some("\"b\"".to_string());
        assert_eq!(header_changes(&next, &merged).len(), 1);
    }

    #[test]
    fn test_retain_transfer_state_takes_reported_headers() {
        let mut stored = ArtifactRecord::new(URL);
        stored.content_length = 100;
        stored.etag = Some("\"a\"".to_string());

        let mut fresh = ArtifactRecord::new(URL);
        fresh.content_length = 120;
        fresh.etag = Some("\"c\"".to_string());
        let merged = retain_transfer_state(fresh, &stored);
        assert_eq!(merged.content_length, 120);
        assert_eq!(merged.etag.as_deref(), Some("\"c\""));
    }

    #[test]
    fn test_probed_record_copies_headers() {
        let record = probed_record(
            URL,
            ProbeResult {
                content_length: 150,
                content_type: Some("application/octet-stream".to_string()),
                last_modified: None,
                etag: Some("\"v1\"".to_string()),
            },
        );
        assert_eq!(record.content_length, 150);
        assert_eq!(record.etag.as_deref(), Some("\"v1\""));
        assert_eq!(record.decoded_filename(), "eas-codes.xlsx");
    }

    #[test]
    fn test_report_planned_counts_new_and_changed() {
        let report = SyncReport {
            new: 2,
            changed: 1,
            unchanged: 5,
            ..SyncReport::default()
        };
        assert_eq!(report.planned(), 3);
    }
}

//! Per-host pacing of full fetches.
//!
//! This module provides the [`RateLimiter`] struct which enforces a minimum
//! pause between two transfers from the same host. The first transfer to a
//! host proceeds immediately, so no pause follows the last transfer of a
//! cycle.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use codelist_sync_core::download::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(Duration::from_secs(1));
//!
//! // First transfer proceeds immediately
//! limiter.acquire("https://ec.europa.eu/download/attachments/1/a.xlsx").await;
//! limiter.record_completion("https://ec.europa.eu/download/attachments/1/a.xlsx");
//!
//! // Second transfer to the same host waits one second after the first ended
//! limiter.acquire("https://ec.europa.eu/download/attachments/1/b.zip").await;
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::CUMULATIVE_DELAY_WARNING_THRESHOLD;

/// Per-host pacing for transfer requests.
///
/// `RateLimiter` is `Send + Sync`; transfers are sequential today but the
/// limiter stays correct if they are ever issued from several tasks.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum pause between transfers from the same host; zero disables
    /// pacing (`downloadDelaySeconds = 0`).
    default_delay: Duration,

    /// Per-host state. The `Arc` lets `acquire` release the shard lock before
    /// awaiting on the inner mutex.
    domains: DashMap<String, Arc<DomainState>>,
}

#[derive(Debug)]
struct DomainState {
    /// `None` until the first request to this host.
    last_request: Mutex<Option<Instant>>,

    /// Total pause applied to this host, in milliseconds.
    cumulative_delay_ms: AtomicU64,
}

impl DomainState {
    fn new() -> Self {
        Self {
            last_request: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}

impl RateLimiter {
    /// Creates a limiter with the given pause; a zero pause disables pacing.
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = default_delay.as_millis()))]
    pub fn new(default_delay: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            default_delay,
            domains: DashMap::new(),
        }
    }

    fn state_for(&self, domain: &str) -> Arc<DomainState> {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(DomainState::new()))
            .clone()
    }

    /// Waits until a transfer to the URL's host may start.
    #[instrument(skip(self), fields(domain))]
    pub async fn acquire(&self, url: &str) {
        if self.default_delay.is_zero() {
            return;
        }

        let domain = extract_domain(url);
        tracing::Span::current().record("domain", &domain);

        let state = self.state_for(&domain);
        let mut last_request_guard = state.last_request.lock().await;

        if let Some(last_request) = *last_request_guard {
            let elapsed = last_request.elapsed();
            if elapsed < self.default_delay {
                let delay = self.default_delay.saturating_sub(elapsed);
                let cumulative = state.add_cumulative_delay(delay);

                debug!(
                    domain = %domain,
                    delay_ms = delay.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "pausing before next transfer"
                );
                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        domain = %domain,
                        cumulative_delay_secs = cumulative.as_secs(),
                        "long cumulative pause - consider lowering downloadDelaySeconds"
                    );
                }

                tokio::time::sleep(delay).await;
            }
        } else {
            debug!(domain = %domain, "first transfer from host - no pause");
        }

        *last_request_guard = Some(Instant::now());
    }

    /// Restarts the pause window when a transfer has finished.
    ///
    /// Without this the pause counts from the start of the previous transfer.
    pub fn record_completion(&self, url: &str) {
        if self.default_delay.is_zero() {
            return;
        }
        let state = self.state_for(&extract_domain(url));
        if let Ok(mut guard) = state.last_request.try_lock() {
            *guard = Some(Instant::now());
        }
    }
}

/// Extracts the lower-cased host from a URL, `"unknown"` when it has none.
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

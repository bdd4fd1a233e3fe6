//! HTTP transport for a synchronization cycle.
//!
//! # Features
//!
//! - Catalog document fetch (GET, text body)
//! - Metadata probe (HEAD, status 200 only)
//! - Streaming full fetch with SHA-256 computed from the stored byte stream
//! - Per-host pacing between transfers
//! - Structured error types with full context

mod client;
mod constants;
mod error;
pub mod rate_limiter;

pub use client::{FetchedFile, HttpClient, ProbeResult, parse_last_modified, probe_from_headers};
pub use constants::{CONNECT_TIMEOUT, DOWNLOAD_DELAY, READ_TIMEOUT};
pub use error::DownloadError;
pub use rate_limiter::{RateLimiter, extract_domain};

// Per project convention there are no module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.

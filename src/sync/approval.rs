//! Confirmation seam between planning and transferring.

use async_trait::async_trait;

use crate::artifact::ArtifactRecord;
use crate::registry::ChangeAssessment;

/// One artifact scheduled for a full fetch, with its change classification.
pub type PlannedTransfer = (ArtifactRecord, ChangeAssessment);

/// Decides whether a planned batch of transfers may start.
///
/// Rust 2024 native async traits are not object-safe, so `async_trait` is
/// required for `Arc<dyn TransferApproval>`.
#[async_trait]
pub trait TransferApproval: Send + Sync {
    /// Returns `true` to start every transfer in `plan`, `false` to skip them
    /// all for this cycle.
    async fn approve(&self, plan: &[PlannedTransfer]) -> bool;
}

/// Approves every plan without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl TransferApproval for AutoApprove {
    async fn approve(&self, _plan: &[PlannedTransfer]) -> bool {
        true
    }
}

/// Declines every plan; the cycle still writes its inventory and changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineAll;

#[async_trait]
impl TransferApproval for DeclineAll {
    async fn approve(&self, _plan: &[PlannedTransfer]) -> bool {
        false
    }
}
